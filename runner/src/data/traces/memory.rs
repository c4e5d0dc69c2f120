//! In-memory trace store

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::error::TraceError;
use super::store::{RawSegment, TraceStore};

#[derive(Debug, Default)]
pub struct MemoryTraceStore {
    traces: RwLock<HashMap<String, Vec<RawSegment>>>,
}

impl MemoryTraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, trace_id: impl Into<String>, segments: Vec<RawSegment>) {
        self.traces.write().insert(trace_id.into(), segments);
    }
}

#[async_trait]
impl TraceStore for MemoryTraceStore {
    async fn fetch_trace(&self, trace_id: &str) -> Result<Vec<RawSegment>, TraceError> {
        self.traces
            .read()
            .get(trace_id)
            .cloned()
            .ok_or_else(|| TraceError::NotFound {
                trace_id: trace_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_inserted_trace() {
        let store = MemoryTraceStore::new();
        store.insert("1-a-b", vec![RawSegment::new("seg-1", "{}")]);
        let segments = store.fetch_trace("1-a-b").await.unwrap();
        assert_eq!(segments, vec![RawSegment::new("seg-1", "{}")]);
    }

    #[tokio::test]
    async fn test_fetch_unknown_trace() {
        let store = MemoryTraceStore::new();
        assert!(matches!(
            store.fetch_trace("1-x-y").await,
            Err(TraceError::NotFound { .. })
        ));
    }
}
