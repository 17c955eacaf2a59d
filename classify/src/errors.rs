//! Classification error types
//!
//! Synchronous operations surface every failure to the caller. The
//! background classification path converts failures into an outcome and a
//! log line instead; see `orchestrator`.

use taxon_graph::{GraphError, GraphErrorKind};
use taxon_types::{ClassId, ParameterCode, ServiceId};
use thiserror::Error;

/// Error category for structured logging and behavior mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Contradictory parameter set, incompatible class, unknown code
    Validation,
    /// Referenced service, class or parameter does not exist
    NotFound,
    /// State does not permit the operation (approved, in use, duplicate)
    Conflict,
    /// Graph store or predictor unreachable or answered non-2xx
    Upstream,
    /// Graph store or predictor answered with an unexpected shape
    Decode,
    /// Entity repository failure
    Repository,
    /// `taxon.toml` or env misconfigured
    Config,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Upstream => "UPSTREAM_UNAVAILABLE",
            Self::Decode => "DECODE_ERROR",
            Self::Repository => "REPOSITORY_ERROR",
            Self::Config => "CONFIG_ERROR",
        }
    }

    /// Whether retrying the same request later could succeed
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Upstream)
    }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("contradictory parameters: {}", join_codes(codes))]
    Contradiction { codes: Vec<ParameterCode> },

    #[error("class {class_id} does not allow every parameter of the service")]
    IncompatibleClass { class_id: ClassId },

    #[error("unknown parameter {code}")]
    UnknownParameter { code: ParameterCode },

    #[error("service {service_id} not found")]
    ServiceNotFound { service_id: ServiceId },

    #[error("class {class_id} not found")]
    ClassNotFound { class_id: ClassId },

    #[error("parameter {code} not found")]
    ParameterNotFound { code: ParameterCode },

    #[error("service {service_id} is already approved")]
    AlreadyApproved { service_id: ServiceId },

    #[error("service {service_id} has no class to approve")]
    ClassRequired { service_id: ServiceId },

    #[error("class {class_id} is used in services")]
    ClassInUse { class_id: ClassId },

    #[error("parameter {code} is used in services")]
    ParameterInUse { code: ParameterCode },

    #[error("class {class_id} already exists")]
    DuplicateClass { class_id: ClassId },

    #[error("parameter {code} already exists")]
    DuplicateParameter { code: ParameterCode },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("predictor error: {message}")]
    Predictor {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("repository error: {message}")]
    Repository { message: String },

    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

fn join_codes(codes: &[ParameterCode]) -> String {
    codes
        .iter()
        .map(ParameterCode::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ClassifyError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Contradiction { .. }
            | Self::IncompatibleClass { .. }
            | Self::UnknownParameter { .. } => ErrorCategory::Validation,
            Self::ServiceNotFound { .. }
            | Self::ClassNotFound { .. }
            | Self::ParameterNotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyApproved { .. }
            | Self::ClassRequired { .. }
            | Self::ClassInUse { .. }
            | Self::ParameterInUse { .. }
            | Self::DuplicateClass { .. }
            | Self::DuplicateParameter { .. } => ErrorCategory::Conflict,
            Self::Graph(err) => match err.kind() {
                GraphErrorKind::Upstream => ErrorCategory::Upstream,
                GraphErrorKind::Decode => ErrorCategory::Decode,
                GraphErrorKind::Config => ErrorCategory::Config,
            },
            Self::Predictor { .. } => ErrorCategory::Upstream,
            Self::Repository { .. } => ErrorCategory::Repository,
            Self::Config { .. } => ErrorCategory::Config,
        }
    }

    pub fn predictor(message: impl Into<String>) -> Self {
        Self::Predictor {
            message: message.into(),
            source: None,
        }
    }

    pub fn predictor_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Predictor {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for classification operations
pub type Result<T> = std::result::Result<T, ClassifyError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn contradiction_lists_offending_codes() {
        let err = ClassifyError::Contradiction {
            codes: vec!["fix_ctv".into(), "voice_mob".into()],
        };
        assert_eq!(err.to_string(), "contradictory parameters: fix_ctv, voice_mob");
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn graph_errors_follow_inner_kind() {
        let status = ClassifyError::from(GraphError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        });
        assert_eq!(status.category(), ErrorCategory::Upstream);
        assert!(status.category().is_transient());

        let decode = ClassifyError::from(GraphError::Decode {
            message: "not json".to_string(),
            body: String::new(),
        });
        assert_eq!(decode.category().as_str(), "DECODE_ERROR");
        assert!(!decode.category().is_transient());
    }

    #[test]
    fn in_use_message_matches_catalog_wording() {
        let err = ClassifyError::ClassInUse {
            class_id: ClassId(3311),
        };
        assert_eq!(err.to_string(), "class 3311 is used in services");
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }
}
