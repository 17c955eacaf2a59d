//! Constraint validation of parameter sets
//!
//! Store failures propagate; nothing here reads an unreachable store as
//! "valid".

use std::collections::BTreeSet;
use std::sync::Arc;

use taxon_graph::{ConstraintGraph, ParameterConstraints};
use taxon_types::{ClassId, ParameterCode};
use tracing::debug;

use crate::errors::{ClassifyError, Result};

/// Deduplicated, sorted view of a parameter list. A service's parameters are
/// a set; repeated codes count once.
pub fn parameter_set(codes: &[ParameterCode]) -> Vec<ParameterCode> {
    codes
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Clone)]
pub struct ConstraintValidator {
    graph: Arc<dyn ConstraintGraph>,
}

impl ConstraintValidator {
    pub fn new(graph: Arc<dyn ConstraintGraph>) -> Self {
        Self { graph }
    }

    /// Every code that takes part in a contradiction with another member of
    /// the set, whichever side declared it. Empty means consistent.
    pub async fn validate_service_parameters(
        &self,
        codes: &[ParameterCode],
    ) -> Result<Vec<ParameterCode>> {
        let set = parameter_set(codes);
        let contradictions = self.graph.contradicting_parameters(&set).await?;
        debug!(
            parameters = set.len(),
            contradictions = contradictions.len(),
            "validated parameter set"
        );
        Ok(contradictions)
    }

    /// [`Self::validate_service_parameters`] as a guard.
    pub async fn ensure_consistent(&self, codes: &[ParameterCode]) -> Result<()> {
        let contradictions = self.validate_service_parameters(codes).await?;
        if contradictions.is_empty() {
            Ok(())
        } else {
            Err(ClassifyError::Contradiction {
                codes: contradictions,
            })
        }
    }

    /// True iff the class allows every parameter of the set. The class may
    /// allow more; an empty set is trivially covered.
    pub async fn validate_class_compatibility(
        &self,
        codes: &[ParameterCode],
        class_id: ClassId,
    ) -> Result<bool> {
        let set = parameter_set(codes);
        if set.is_empty() {
            return Ok(true);
        }
        let matching = self.graph.allowed_parameter_count(class_id, &set).await?;
        debug!(%class_id, matching, required = set.len(), "checked class coverage");
        Ok(matching == set.len())
    }

    /// [`Self::validate_class_compatibility`] as a guard.
    pub async fn ensure_compatible(&self, codes: &[ParameterCode], class_id: ClassId) -> Result<()> {
        if self.validate_class_compatibility(codes, class_id).await? {
            Ok(())
        } else {
            Err(ClassifyError::IncompatibleClass { class_id })
        }
    }

    pub async fn parameter_constraints(&self, code: &ParameterCode) -> Result<ParameterConstraints> {
        Ok(self.graph.parameter_constraints(code).await?)
    }

    pub async fn class_constraints(&self, class_id: ClassId) -> Result<Vec<ParameterCode>> {
        Ok(self.graph.class_constraints(class_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use taxon_graph::MemoryGraph;
    use taxon_types::{Class, Parameter};

    fn codes(raw: &[&str]) -> Vec<ParameterCode> {
        raw.iter().map(|c| ParameterCode::from(*c)).collect()
    }

    async fn validator() -> ConstraintValidator {
        let graph = MemoryGraph::new();
        graph
            .add_parameter(&Parameter::new("voice_mob").with_contradictions(["fix_ctv"]))
            .await
            .unwrap();
        graph
            .add_class(&Class::new(3311).with_allowed_parameters(["fix_ctv", "voice_fix", "sms"]))
            .await
            .unwrap();
        ConstraintValidator::new(Arc::new(graph))
    }

    #[tokio::test]
    async fn consistent_set_yields_no_codes() {
        let v = validator().await;
        assert!(
            v.validate_service_parameters(&codes(&["fix_ctv", "voice_fix"]))
                .await
                .unwrap()
                .is_empty()
        );
        assert!(v.ensure_consistent(&codes(&["voice_mob"])).await.is_ok());
    }

    #[tokio::test]
    async fn contradiction_reports_both_endpoints() {
        let v = validator().await;
        let err = v
            .ensure_consistent(&codes(&["fix_ctv", "voice_mob", "sms"]))
            .await
            .unwrap_err();
        match err {
            ClassifyError::Contradiction { codes: found } => {
                assert_eq!(found, codes(&["fix_ctv", "voice_mob"]));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn compatibility_is_coverage_not_equality() {
        let v = validator().await;
        // class allows a strict superset
        assert!(
            v.validate_class_compatibility(&codes(&["fix_ctv", "voice_fix"]), ClassId(3311))
                .await
                .unwrap()
        );
        // duplicates count once
        assert!(
            v.validate_class_compatibility(&codes(&["sms", "sms"]), ClassId(3311))
                .await
                .unwrap()
        );
        assert!(
            !v.validate_class_compatibility(&codes(&["fix_ctv", "geo"]), ClassId(3311))
                .await
                .unwrap()
        );
        assert!(v.validate_class_compatibility(&[], ClassId(1)).await.unwrap());

        let err = v
            .ensure_compatible(&codes(&["geo"]), ClassId(3311))
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::IncompatibleClass { class_id } if class_id == ClassId(3311)));
    }
}
