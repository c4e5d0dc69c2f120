//! Failure taxonomy of one stage invocation

use thiserror::Error;

use crate::core::ConfigError;
use crate::data::objects::StorageError;
use crate::data::traces::TraceError;
use crate::domain::linking::BridgeError;
use crate::domain::transforms::TransformError;
use crate::utils::retry::AttemptError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The recorded trace cannot be interpreted. Never retried.
    #[error("Malformed trace: {0}")]
    MalformedTrace(#[source] TraceError),

    #[error("Trace store failure: {0}")]
    TraceStore(#[source] TraceError),

    /// Raised only in strict linking mode
    #[error("No parent span for stage {stage}: {reason}")]
    LinkNotFound { stage: String, reason: String },

    #[error(transparent)]
    InvalidCarrier(#[from] BridgeError),

    #[error("{operation} failed: {source}")]
    TransientIo {
        operation: &'static str,
        #[source]
        source: AttemptError<StorageError>,
    },

    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl From<TraceError> for PipelineError {
    fn from(err: TraceError) -> Self {
        match err {
            TraceError::Malformed { .. } => PipelineError::MalformedTrace(err),
            other => PipelineError::TraceStore(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_errors_are_classified() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let malformed: PipelineError = TraceError::Malformed {
            segment_id: "s".to_string(),
            source,
        }
        .into();
        assert!(matches!(malformed, PipelineError::MalformedTrace(_)));

        let missing: PipelineError = TraceError::NotFound {
            trace_id: "t".to_string(),
        }
        .into();
        assert!(matches!(missing, PipelineError::TraceStore(_)));
    }

    #[test]
    fn test_transient_io_display() {
        let err = PipelineError::TransientIo {
            operation: "read",
            source: AttemptError::Exhausted {
                attempts: 3,
                source: StorageError::Backend("throttled".to_string()),
            },
        };
        assert_eq!(
            err.to_string(),
            "read failed: failed after 3 attempts: Storage backend error: throttled"
        );
    }
}
