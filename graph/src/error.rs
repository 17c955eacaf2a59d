//! Graph gateway error types
//!
//! Every failure is reported to the caller; this layer never substitutes a
//! neutral result for a failed round trip.

use thiserror::Error;

/// Coarse classification of a gateway failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphErrorKind {
    /// Store unreachable, timed out, or answered with a non-2xx status
    Upstream,
    /// Store answered but the body is not the expected tabular shape
    Decode,
    /// Client could not be constructed from the supplied endpoint
    Config,
}

impl GraphErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upstream => "GRAPH_UPSTREAM",
            Self::Decode => "GRAPH_DECODE",
            Self::Config => "GRAPH_CONFIG",
        }
    }
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph store request failed: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("graph store returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("graph store response could not be decoded: {message}")]
    Decode { message: String, body: String },

    #[error("graph client configuration invalid: {0}")]
    Config(String),
}

impl GraphError {
    pub fn kind(&self) -> GraphErrorKind {
        match self {
            Self::Transport { .. } | Self::Status { .. } => GraphErrorKind::Upstream,
            Self::Decode { .. } => GraphErrorKind::Decode,
            Self::Config(_) => GraphErrorKind::Config,
        }
    }

    pub(crate) fn transport(message: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(source),
        }
    }

    pub(crate) fn decode(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            body: body.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_decode_map_to_distinct_kinds() {
        let status = GraphError::Status {
            status: 503,
            body: "busy".to_string(),
        };
        assert_eq!(status.kind(), GraphErrorKind::Upstream);
        assert!(status.to_string().contains("busy"));

        let decode = GraphError::decode("missing results", "<html/>");
        assert_eq!(decode.kind(), GraphErrorKind::Decode);
        assert_eq!(decode.kind().as_str(), "GRAPH_DECODE");
    }
}
