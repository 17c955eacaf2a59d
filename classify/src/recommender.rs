//! Class recommendation for a service
//!
//! The graph pre-filters and pre-aggregates candidates; the final business
//! ranking is applied here so the rule can change without touching stored
//! queries.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use taxon_graph::ConstraintGraph;
use taxon_types::{RankedClass, Service};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::repository::ClassRepository;
use crate::validator::parameter_set;

#[derive(Clone)]
pub struct ClassificationRecommender {
    graph: Arc<dyn ConstraintGraph>,
    classes: Arc<dyn ClassRepository>,
}

impl ClassificationRecommender {
    pub fn new(graph: Arc<dyn ConstraintGraph>, classes: Arc<dyn ClassRepository>) -> Self {
        Self { graph, classes }
    }

    /// Ranked candidate classes for `service`.
    ///
    /// Order: similar-service count desc, then matching-parameter count desc,
    /// then class id asc. Graph classes without a repository row are skipped.
    pub async fn proposed_classes(&self, service: &Service) -> Result<Vec<RankedClass>> {
        let pool = parameter_set(&service.parameters);
        let candidates = self.graph.candidate_classes(service.id, &pool).await?;

        let mut seen = HashSet::new();
        let mut ranked = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !seen.insert(candidate.class_id) {
                continue;
            }
            let Some(record) = self.classes.get(candidate.class_id).await? else {
                warn!(
                    service_id = %service.id,
                    class_id = %candidate.class_id,
                    "graph references a class missing from the repository, skipped"
                );
                continue;
            };
            ranked.push(RankedClass {
                class_id: candidate.class_id,
                title: record.title,
                similar_parameters: candidate.matching_parameters,
                similar_services: candidate.similar_services.len(),
            });
        }

        ranked.sort_by_key(|c| (Reverse(c.similar_services), Reverse(c.similar_parameters), c.class_id));
        debug!(service_id = %service.id, candidates = ranked.len(), "ranked proposed classes");
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use taxon_graph::ParameterConstraints;
    use taxon_types::{
        Class, ClassId, ClassRecord, Parameter, ParameterCode, ProposedClass, ServiceId,
    };

    /// Graph stub returning a fixed candidate list in store order.
    struct FixedCandidates(Vec<ProposedClass>);

    #[async_trait]
    impl ConstraintGraph for FixedCandidates {
        async fn add_parameter(&self, _: &Parameter) -> taxon_graph::Result<()> {
            Ok(())
        }
        async fn update_parameter(&self, _: &Parameter) -> taxon_graph::Result<()> {
            Ok(())
        }
        async fn delete_parameter(&self, _: &ParameterCode) -> taxon_graph::Result<()> {
            Ok(())
        }
        async fn parameter_constraints(
            &self,
            _: &ParameterCode,
        ) -> taxon_graph::Result<ParameterConstraints> {
            Ok(ParameterConstraints::default())
        }
        async fn add_class(&self, _: &Class) -> taxon_graph::Result<()> {
            Ok(())
        }
        async fn update_class(&self, _: &Class) -> taxon_graph::Result<()> {
            Ok(())
        }
        async fn delete_class(&self, _: ClassId) -> taxon_graph::Result<()> {
            Ok(())
        }
        async fn class_constraints(&self, _: ClassId) -> taxon_graph::Result<Vec<ParameterCode>> {
            Ok(Vec::new())
        }
        async fn add_service(&self, _: &Service) -> taxon_graph::Result<()> {
            Ok(())
        }
        async fn contradicting_parameters(
            &self,
            _: &[ParameterCode],
        ) -> taxon_graph::Result<Vec<ParameterCode>> {
            Ok(Vec::new())
        }
        async fn allowed_parameter_count(
            &self,
            _: ClassId,
            _: &[ParameterCode],
        ) -> taxon_graph::Result<usize> {
            Ok(0)
        }
        async fn candidate_classes(
            &self,
            _: ServiceId,
            _: &[ParameterCode],
        ) -> taxon_graph::Result<Vec<ProposedClass>> {
            Ok(self.0.clone())
        }
    }

    fn proposed(class: u64, matching: usize, similar: &[u64]) -> ProposedClass {
        ProposedClass {
            class_id: ClassId(class),
            matching_parameters: matching,
            similar_services: similar.iter().map(|id| ServiceId(*id)).collect(),
        }
    }

    fn service() -> Service {
        Service {
            id: ServiceId(99),
            title: "bundle".to_string(),
            parameters: vec!["a".into(), "b".into()],
            class_id: None,
            created_at: chrono::Utc::now(),
            approved_at: None,
        }
    }

    async fn classes(ids: &[u64]) -> Arc<InMemoryRepository> {
        let repo = Arc::new(InMemoryRepository::new());
        for id in ids {
            ClassRepository::create(
                repo.as_ref(),
                ClassRecord {
                    id: ClassId(*id),
                    title: format!("class {id}"),
                },
            )
            .await
            .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn precedent_services_outrank_overlap() {
        let graph = FixedCandidates(vec![
            proposed(2, 2, &[]),
            proposed(1, 1, &[4, 5, 6]),
            proposed(3, 2, &[]),
        ]);
        let recommender = ClassificationRecommender::new(Arc::new(graph), classes(&[1, 2, 3]).await);
        let ranked = recommender.proposed_classes(&service()).await.unwrap();
        let order: Vec<u64> = ranked.iter().map(|c| c.class_id.0).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(ranked[0].similar_services, 3);
        assert_eq!(ranked[0].title, "class 1");
    }

    #[tokio::test]
    async fn stale_graph_classes_are_skipped() {
        let graph = FixedCandidates(vec![proposed(7, 2, &[1]), proposed(8, 1, &[])]);
        let recommender = ClassificationRecommender::new(Arc::new(graph), classes(&[8]).await);
        let ranked = recommender.proposed_classes(&service()).await.unwrap();
        assert_eq!(
            ranked,
            vec![RankedClass {
                class_id: ClassId(8),
                title: "class 8".to_string(),
                similar_parameters: 1,
                similar_services: 0,
            }]
        );
    }
}
