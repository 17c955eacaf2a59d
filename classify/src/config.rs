//! Configuration loading
//!
//! Loads configuration from `~/.config/taxon/taxon.toml` (or `TAXON_CONFIG`
//! env). A missing file yields the defaults; a malformed one is an error.

use crate::errors::{ClassifyError, Result};
use crate::features::FeatureSchema;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use taxon_graph::GraphEndpoint;
use taxon_types::vocabulary::{BUILTIN_PARAMETERS, BUILTIN_SCHEMA_VERSION};

/// Root configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TaxonConfig {
    /// Constraint graph store
    #[serde(default)]
    pub graph: GraphConfig,

    /// External class predictor
    #[serde(default)]
    pub predictor: PredictorConfig,

    /// Feature schema sent to the predictor
    #[serde(default)]
    pub vocabulary: VocabularyConfig,

    /// Background classification
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GraphConfig {
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,

    /// Namespace IRI for every node name
    #[serde(default = "default_graph_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub login: String,

    #[serde(default)]
    pub password: String,

    /// Generous by default; updates can be batch-sized
    #[serde(default = "default_graph_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_graph_base_url() -> String {
    "http://localhost:3030/taxon".to_string()
}

fn default_graph_prefix() -> String {
    "http://example.org/taxon#".to_string()
}

fn default_graph_timeout_secs() -> u64 {
    300
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_graph_base_url(),
            prefix: default_graph_prefix(),
            login: String::new(),
            password: String::new(),
            timeout_secs: default_graph_timeout_secs(),
        }
    }
}

impl GraphConfig {
    pub fn endpoint(&self) -> GraphEndpoint {
        GraphEndpoint::new(&self.base_url, &self.prefix)
            .with_credentials(&self.login, &self.password)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PredictorConfig {
    #[serde(default = "default_predictor_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub url: String,

    /// Bearer token
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_predictor_timeout_secs")]
    pub timeout_secs: u64,

    /// Response field carrying the predicted class id
    #[serde(default = "default_class_id_field")]
    pub class_id_field: String,
}

fn default_predictor_enabled() -> bool {
    true
}

fn default_predictor_timeout_secs() -> u64 {
    10
}

fn default_class_id_field() -> String {
    "group_id".to_string()
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            enabled: default_predictor_enabled(),
            url: String::new(),
            token: String::new(),
            timeout_secs: default_predictor_timeout_secs(),
            class_id_field: default_class_id_field(),
        }
    }
}

impl PredictorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VocabularyConfig {
    #[serde(default = "default_vocabulary_version")]
    pub version: u32,

    /// Ordered parameter codes; order fixes the feature layout
    #[serde(default = "default_vocabulary_parameters")]
    pub parameters: Vec<String>,
}

fn default_vocabulary_version() -> u32 {
    BUILTIN_SCHEMA_VERSION
}

fn default_vocabulary_parameters() -> Vec<String> {
    BUILTIN_PARAMETERS.iter().map(|code| code.to_string()).collect()
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            version: default_vocabulary_version(),
            parameters: default_vocabulary_parameters(),
        }
    }
}

impl VocabularyConfig {
    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::new(self.version, self.parameters.iter().map(String::as_str))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_concurrent_classifications")]
    pub max_concurrent_classifications: usize,

    /// Submit the predictor step after every create
    #[serde(default = "default_auto_classify")]
    pub auto_classify: bool,
}

fn default_max_concurrent_classifications() -> usize {
    4
}

fn default_auto_classify() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_classifications: default_max_concurrent_classifications(),
            auto_classify: default_auto_classify(),
        }
    }
}

impl TaxonConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "TAXON_CONFIG";

    pub const ENV_GRAPH_PASSWORD: &'static str = "TAXON_GRAPH_PASSWORD";

    pub const ENV_PREDICTOR_TOKEN: &'static str = "TAXON_PREDICTOR_TOKEN";

    pub const DEFAULT_CONFIG_FILENAME: &'static str = "taxon.toml";

    /// Load configuration from file
    ///
    /// Resolution order:
    /// 1. `TAXON_CONFIG` environment variable
    /// 2. `~/.config/taxon/taxon.toml`
    ///
    /// Secrets are then overridden from the environment.
    pub fn load() -> Result<Self> {
        let path = Self::resolve_config_path();

        let mut cfg = if path.exists() {
            Self::load_from_path(&path)?
        } else {
            tracing::info!(path = %path.display(), "config not found, using defaults");
            Self::default()
        };
        cfg.apply_env(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an explicit path; unlike [`Self::load`], a missing file is an error.
    pub fn load_explicit(path: &Path) -> Result<Self> {
        let mut cfg = Self::load_from_path(path)?;
        cfg.apply_env(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClassifyError::config_with_source(
                format!("failed to read config at {}", path.display()),
                e,
            )
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: TaxonConfig = toml::from_str(contents)
            .map_err(|e| ClassifyError::config_with_source("failed to parse config", e))?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Override secrets from the given lookup (normally the process env).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(password) = lookup(Self::ENV_GRAPH_PASSWORD) {
            self.graph.password = password;
        }
        if let Some(token) = lookup(Self::ENV_PREDICTOR_TOKEN) {
            self.predictor.token = token;
        }
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .map(|h| {
                h.join(".config")
                    .join("taxon")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    pub fn validate(&self) -> Result<()> {
        if self.graph.base_url.trim().is_empty() {
            return Err(ClassifyError::config("graph.base_url must not be empty"));
        }
        if self.graph.prefix.trim().is_empty() {
            return Err(ClassifyError::config("graph.prefix must not be empty"));
        }
        if self.graph.timeout_secs == 0 {
            return Err(ClassifyError::config("graph.timeout_secs must be positive"));
        }
        if self.predictor.timeout_secs == 0 {
            return Err(ClassifyError::config("predictor.timeout_secs must be positive"));
        }
        if self.orchestrator.max_concurrent_classifications == 0 {
            return Err(ClassifyError::config(
                "orchestrator.max_concurrent_classifications must be positive",
            ));
        }
        if self.vocabulary.parameters.is_empty() {
            return Err(ClassifyError::config("vocabulary.parameters must not be empty"));
        }
        let mut seen = HashSet::new();
        for code in &self.vocabulary.parameters {
            if !seen.insert(code.as_str()) {
                return Err(ClassifyError::config(format!(
                    "vocabulary.parameters lists {code} more than once"
                )));
            }
        }

        if self.predictor.enabled && self.predictor.url.trim().is_empty() {
            tracing::warn!("predictor enabled but url is empty; classification will fail at runtime");
        }
        if self.predictor.enabled && self.predictor.token.is_empty() {
            tracing::warn!("predictor enabled but no bearer token configured");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let cfg = TaxonConfig::default();
        assert_eq!(cfg.graph.timeout_secs, 300);
        assert_eq!(cfg.predictor.timeout_secs, 10);
        assert_eq!(cfg.predictor.class_id_field, "group_id");
        assert_eq!(cfg.vocabulary.parameters.len(), 40);
        assert_eq!(cfg.orchestrator.max_concurrent_classifications, 4);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            [graph]
            base_url = "http://jena:3030/services"
            login = "admin"

            [predictor]
            url = "http://ml:8000/predict"
            class_id_field = "class_id"

            [vocabulary]
            version = 2
            parameters = ["sms", "mms", "geo"]
        "#;

        let cfg = TaxonConfig::parse(toml).expect("should parse");
        assert_eq!(cfg.graph.base_url, "http://jena:3030/services");
        assert_eq!(cfg.graph.prefix, "http://example.org/taxon#");
        assert_eq!(cfg.predictor.class_id_field, "class_id");
        assert_eq!(cfg.vocabulary.schema().version(), 2);
        assert_eq!(cfg.vocabulary.schema().len(), 3);
        assert!(cfg.orchestrator.auto_classify);
    }

    #[test]
    fn test_rejects_duplicate_vocabulary() {
        let toml = r#"
            [vocabulary]
            parameters = ["sms", "sms"]
        "#;
        let err = TaxonConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_rejects_zero_concurrency_and_timeouts() {
        assert!(TaxonConfig::parse("[orchestrator]\nmax_concurrent_classifications = 0").is_err());
        assert!(TaxonConfig::parse("[graph]\ntimeout_secs = 0").is_err());
        assert!(TaxonConfig::parse("[predictor]\ntimeout_secs = 0").is_err());
        assert!(TaxonConfig::parse("[graph]\nprefix = \"\"").is_err());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[graph\nbase_url = 1").unwrap();
        assert!(TaxonConfig::load_from_path(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides_secrets() {
        let mut cfg = TaxonConfig::default();
        cfg.apply_env(|key| match key {
            TaxonConfig::ENV_GRAPH_PASSWORD => Some("s3cret".to_string()),
            TaxonConfig::ENV_PREDICTOR_TOKEN => Some("tok".to_string()),
            _ => None,
        });
        assert_eq!(cfg.graph.password, "s3cret");
        assert_eq!(cfg.predictor.token, "tok");
        assert_eq!(cfg.graph.endpoint().password, "s3cret");
    }
}
