//! Trace store and segment document errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    /// A segment document could not be parsed. Never retried.
    #[error("Malformed segment document {segment_id}: {source}")]
    Malformed {
        segment_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Trace store returned a segment without {field}")]
    MissingField { field: &'static str },

    #[error("Trace not found: {trace_id}")]
    NotFound { trace_id: String },

    #[error("Trace store error: {0}")]
    Fetch(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = TraceError::Malformed {
            segment_id: "seg-1".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("Malformed segment document seg-1:"));
    }

    #[test]
    fn test_not_found_display() {
        let err = TraceError::NotFound {
            trace_id: "1-abc-def".to_string(),
        };
        assert_eq!(err.to_string(), "Trace not found: 1-abc-def");
    }
}
