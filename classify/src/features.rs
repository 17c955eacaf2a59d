//! Versioned feature schema for the predictor
//!
//! The predictor is trained on a fixed, ordered parameter vocabulary. The
//! schema pins that vocabulary so the one-hot payload never drifts silently
//! from what the repository knows about.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};
use taxon_types::ParameterCode;
use tracing::{debug, warn};

use crate::errors::{ClassifyError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    version: u32,
    codes: Vec<ParameterCode>,
}

/// One-hot encoding of a parameter set over a [`FeatureSchema`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector(Map<String, Value>);

impl FeatureVector {
    pub fn get(&self, code: &str) -> Option<u8> {
        self.0
            .get(code)
            .and_then(Value::as_u64)
            .and_then(|v| u8::try_from(v).ok())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Codes set to 1.
    pub fn active(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, v)| v.as_u64() == Some(1))
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

impl FeatureSchema {
    pub fn new<'a>(version: u32, codes: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            version,
            codes: codes.into_iter().map(ParameterCode::from).collect(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn codes(&self) -> &[ParameterCode] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Check the schema against the codes the parameter repository knows.
    ///
    /// Schema codes missing from the repository are an error; repository
    /// codes the schema does not cover only produce a warning.
    pub fn validate_against(&self, known: &[ParameterCode]) -> Result<()> {
        let known: BTreeSet<&ParameterCode> = known.iter().collect();
        let schema: BTreeSet<&ParameterCode> = self.codes.iter().collect();

        let unknown: Vec<&str> = self
            .codes
            .iter()
            .filter(|code| !known.contains(code))
            .map(ParameterCode::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(ClassifyError::config(format!(
                "feature schema v{} lists codes unknown to the parameter repository: {}",
                self.version,
                unknown.join(", ")
            )));
        }

        let uncovered: Vec<&str> = known
            .iter()
            .filter(|code| !schema.contains(*code))
            .map(|code| code.as_str())
            .collect();
        if !uncovered.is_empty() {
            warn!(
                version = self.version,
                uncovered = %uncovered.join(", "),
                "parameters outside the feature schema are invisible to the predictor"
            );
        }
        Ok(())
    }

    /// One-hot encode `params`: every schema code maps to 0 or 1.
    pub fn encode(&self, params: &[ParameterCode]) -> FeatureVector {
        let present: BTreeSet<&ParameterCode> = params.iter().collect();
        for code in present.iter().filter(|code| !self.codes.contains(code)) {
            debug!(code = %code, version = self.version, "parameter not in feature schema, ignored");
        }

        let map = self
            .codes
            .iter()
            .map(|code| {
                let bit = u8::from(present.contains(code));
                (code.to_string(), Value::from(bit))
            })
            .collect();
        FeatureVector(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use taxon_types::vocabulary::{BUILTIN_PARAMETERS, BUILTIN_SCHEMA_VERSION};

    fn builtin() -> FeatureSchema {
        FeatureSchema::new(BUILTIN_SCHEMA_VERSION, BUILTIN_PARAMETERS.iter().copied())
    }

    #[test]
    fn encode_covers_full_vocabulary() {
        let vector = builtin().encode(&["fix_ctv".into(), "voice_fix".into()]);
        assert_eq!(vector.len(), 40);
        assert_eq!(vector.get("fix_ctv"), Some(1));
        assert_eq!(vector.get("sms"), Some(0));
        assert_eq!(vector.get("equipment rent"), Some(0));

        let mut active = vector.active();
        active.sort_unstable();
        assert_eq!(active, vec!["fix_ctv", "voice_fix"]);
    }

    #[test]
    fn codes_outside_schema_are_ignored() {
        let schema = FeatureSchema::new(1, ["sms", "mms"]);
        let vector = schema.encode(&["sms".into(), "pigeon_post".into()]);
        assert_eq!(vector.len(), 2);
        assert_eq!(vector.get("pigeon_post"), None);
        assert_eq!(
            serde_json::to_value(&vector).unwrap(),
            serde_json::json!({"sms": 1, "mms": 0})
        );
    }

    #[test]
    fn unknown_schema_codes_fail_validation() {
        let schema = FeatureSchema::new(3, ["sms", "fax"]);
        let err = schema
            .validate_against(&["sms".into(), "mms".into()])
            .unwrap_err();
        assert!(err.to_string().contains("fax"));

        let ok = FeatureSchema::new(3, ["sms"]);
        assert!(ok.validate_against(&["sms".into(), "mms".into()]).is_ok());
    }
}
