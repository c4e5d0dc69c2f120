//! Parent span resolution for a stage invocation
//!
//! The orchestrator records each stage as a named subsegment of its own
//! segment. That subsegment holds the outbound SDK call that started the
//! stage, and the request id of that call identifies the segment the stage
//! service created when it accepted the request. That segment is the parent.

use std::fmt;

use super::graph::SegmentGraph;
use crate::core::constants::ORCHESTRATOR_ORIGIN;

/// Lookup where a link chain can break
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStep {
    OrchestratorSegment,
    StageSubsegment,
    SdkCall,
    ServingSegment,
}

impl fmt::Display for LinkStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkStep::OrchestratorSegment => "orchestrator segment",
            LinkStep::StageSubsegment => "stage subsegment",
            LinkStep::SdkCall => "SDK call subsegment",
            LinkStep::ServingSegment => "serving segment",
        };
        f.write_str(s)
    }
}

/// Outcome of one link attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// `ambiguous` is set when the orchestrator recorded the stage name more
    /// than once and the first occurrence was used.
    Resolved { segment_id: String, ambiguous: bool },
    Missing(LinkStep),
}

impl Link {
    pub fn segment_id(&self) -> Option<&str> {
        match self {
            Link::Resolved { segment_id, .. } => Some(segment_id),
            Link::Missing(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TraceLinker {
    orchestrator_origin: String,
}

impl Default for TraceLinker {
    fn default() -> Self {
        Self::new(ORCHESTRATOR_ORIGIN)
    }
}

impl TraceLinker {
    pub fn new(orchestrator_origin: impl Into<String>) -> Self {
        Self {
            orchestrator_origin: orchestrator_origin.into(),
        }
    }

    /// Run the four lookups in order, stopping at the first that finds nothing.
    pub fn link(&self, graph: &SegmentGraph, stage_name: &str) -> Link {
        let Some(orchestrator) = graph.find_by_origin(&self.orchestrator_origin) else {
            tracing::info!(origin = %self.orchestrator_origin, "Orchestrator segment not found");
            return Link::Missing(LinkStep::OrchestratorSegment);
        };
        tracing::debug!(segment_id = %orchestrator.id, "Found orchestrator segment");

        let mut matches = orchestrator.subsegments_named(stage_name);
        let Some(stage) = matches.next() else {
            tracing::info!(stage = stage_name, "Stage subsegment not found");
            return Link::Missing(LinkStep::StageSubsegment);
        };
        let ambiguous = matches.next().is_some();
        if ambiguous {
            tracing::warn!(
                stage = stage_name,
                "Stage name recorded more than once in orchestrator segment; stage names must be unique per trace"
            );
        }
        tracing::debug!(stage = stage_name, "Found stage subsegment");

        let Some(request_id) = stage.sdk_request_id() else {
            tracing::info!(stage = stage_name, "SDK call request id not found");
            return Link::Missing(LinkStep::SdkCall);
        };
        tracing::debug!(request_id, "Found SDK call request id");

        let Some(serving) = graph.find_by_request_id(request_id) else {
            tracing::info!(request_id, "Serving segment not found for request id");
            return Link::Missing(LinkStep::ServingSegment);
        };
        tracing::debug!(segment_id = %serving.id, "Found serving segment");

        Link::Resolved {
            segment_id: serving.id.clone(),
            ambiguous,
        }
    }

    /// Parent segment id for `stage_name`, or `None` if any link is missing
    pub fn resolve(&self, graph: &SegmentGraph, stage_name: &str) -> Option<String> {
        match self.link(graph, stage_name) {
            Link::Resolved { segment_id, .. } => Some(segment_id),
            Link::Missing(_) => None,
        }
    }
}
