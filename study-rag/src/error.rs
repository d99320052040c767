//! Error types for the `study-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur anywhere in the study pipeline.
#[derive(Debug, Error)]
pub enum StudyError {
    /// Caller-supplied data violates a precondition. Never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Retrieval found nothing to ground the request in.
    #[error("Insufficient context: {0}")]
    InsufficientContext(String),

    /// Model output could not be decoded into the required structure.
    #[error("Generation format error: {message}")]
    GenerationFormat {
        /// A description of the failure.
        message: String,
        /// The raw model output that failed to parse.
        raw_output: String,
    },

    /// An external gateway did not answer within the configured bound.
    #[error("Gateway timeout ({gateway}) after {timeout:?}")]
    GatewayTimeout {
        /// The gateway that timed out (`embedding` or `completion`).
        gateway: String,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during text completion.
    #[error("Completion error ({provider}): {message}")]
    Completion {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector index backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl StudyError {
    /// Whether the error came from an external gateway and may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::GatewayTimeout { .. } | Self::Embedding { .. } | Self::Completion { .. }
        )
    }

    /// Whether the caller should be told to add more documents.
    pub fn is_insufficient_context(&self) -> bool {
        matches!(self, Self::InsufficientContext(_))
    }
}

/// A convenience result type for study pipeline operations.
pub type Result<T> = std::result::Result<T, StudyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_are_transient() {
        let timeout = StudyError::GatewayTimeout {
            gateway: "completion".into(),
            timeout: Duration::from_secs(3),
        };
        assert!(timeout.is_transient());
        assert!(!StudyError::InvalidInput("x".into()).is_transient());
        assert!(StudyError::InsufficientContext("none".into()).is_insufficient_context());
    }

    #[test]
    fn display_includes_provider() {
        let err = StudyError::Embedding { provider: "Ollama".into(), message: "down".into() };
        assert_eq!(err.to_string(), "Embedding error (Ollama): down");
    }
}
