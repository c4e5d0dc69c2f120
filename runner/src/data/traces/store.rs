//! Trace store trait definition

use async_trait::async_trait;

use super::error::TraceError;

/// One segment as returned by the trace store: its id and the raw JSON
/// document describing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSegment {
    pub id: String,
    pub document: String,
}

impl RawSegment {
    pub fn new(id: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            document: document.into(),
        }
    }
}

/// Read access to recorded distributed traces
///
/// A failed fetch is fatal for the invocation; there is no fallback trace.
#[async_trait]
pub trait TraceStore: Send + Sync {
    /// All segments recorded so far for `trace_id`
    async fn fetch_trace(&self, trace_id: &str) -> Result<Vec<RawSegment>, TraceError>;
}
