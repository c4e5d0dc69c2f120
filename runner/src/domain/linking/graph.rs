//! Parsed view of one recorded trace
//!
//! Segment documents arrive as JSON strings from the trace store. They are
//! parsed once, up front, so lookups only ever see structured data.

use serde::Deserialize;

use crate::data::traces::{RawSegment, TraceError};

/// Service call metadata attached to a segment or subsegment
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AwsMetadata {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
}

/// A nested unit of work inside a segment document
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Subsegment {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subsegments: Vec<Subsegment>,
    #[serde(default)]
    pub aws: Option<AwsMetadata>,
}

impl Subsegment {
    /// Request id of the first nested subsegment that records an SDK call
    pub fn sdk_request_id(&self) -> Option<&str> {
        self.subsegments
            .iter()
            .find_map(|sub| sub.aws.as_ref()?.request_id.as_deref())
    }
}

/// The top level of a segment document
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SegmentDocument {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub subsegments: Vec<Subsegment>,
    #[serde(default)]
    pub aws: Option<AwsMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub id: String,
    pub document: SegmentDocument,
}

impl Segment {
    pub fn origin(&self) -> Option<&str> {
        self.document.origin.as_deref()
    }

    /// Request id this segment served, if it was created for an SDK call
    pub fn request_id(&self) -> Option<&str> {
        self.document.aws.as_ref()?.request_id.as_deref()
    }

    /// Direct child subsegments with exactly this name, in document order
    pub fn subsegments_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Subsegment> {
        self.document
            .subsegments
            .iter()
            .filter(move |sub| sub.name == name)
    }
}

/// Read-only snapshot of a trace, built fresh for each invocation
#[derive(Debug, Clone, Default)]
pub struct SegmentGraph {
    segments: Vec<Segment>,
}

impl SegmentGraph {
    /// Parse every segment document. The first document that fails to parse
    /// aborts construction.
    pub fn from_segments(raw: Vec<RawSegment>) -> Result<Self, TraceError> {
        let segments = raw
            .into_iter()
            .map(|segment| -> Result<Segment, TraceError> {
                let document = serde_json::from_str(&segment.document).map_err(|source| {
                    TraceError::Malformed {
                        segment_id: segment.id.clone(),
                        source,
                    }
                })?;
                Ok(Segment {
                    id: segment.id,
                    document,
                })
            })
            .collect::<Result<Vec<_>, TraceError>>()?;

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// First segment whose origin is exactly `origin`
    pub fn find_by_origin(&self, origin: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.origin() == Some(origin))
    }

    /// First segment that served the request `request_id`
    pub fn find_by_request_id(&self, request_id: &str) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| s.request_id() == Some(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_nested_subsegments() {
        let doc = r#"{
            "name": "pipeline",
            "origin": "AWS::StepFunctions::StateMachine",
            "subsegments": [
                {"name": "clean-job", "subsegments": [
                    {"name": "Glue", "aws": {"request_id": "req-1", "operation": "StartJobRun"}}
                ]}
            ]
        }"#;
        let graph = SegmentGraph::from_segments(vec![RawSegment::new("seg-1", doc)]).unwrap();
        assert_eq!(graph.len(), 1);

        let segment = &graph.segments()[0];
        assert_eq!(segment.origin(), Some("AWS::StepFunctions::StateMachine"));
        let stage = segment.subsegments_named("clean-job").next().unwrap();
        assert_eq!(stage.sdk_request_id(), Some("req-1"));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let doc = r#"{"id": "x", "start_time": 1.5, "aws": {"request_id": "r", "region": "us-east-1"}}"#;
        let graph = SegmentGraph::from_segments(vec![RawSegment::new("seg-1", doc)]).unwrap();
        assert_eq!(graph.segments()[0].request_id(), Some("r"));
    }

    #[test]
    fn test_malformed_document_is_fatal() {
        let raw = vec![
            RawSegment::new("ok", "{}"),
            RawSegment::new("bad", "{\"origin\": "),
        ];
        match SegmentGraph::from_segments(raw) {
            Err(TraceError::Malformed { segment_id, .. }) => assert_eq!(segment_id, "bad"),
            other => panic!("expected malformed error, got {other:?}"),
        }
    }

    #[test]
    fn test_origin_match_is_exact() {
        let raw = vec![RawSegment::new(
            "seg-1",
            r#"{"origin": "aws::stepfunctions::statemachine"}"#,
        )];
        let graph = SegmentGraph::from_segments(raw).unwrap();
        assert!(graph.find_by_origin("AWS::StepFunctions::StateMachine").is_none());
    }

    #[test]
    fn test_sdk_request_id_skips_subsegments_without_request_id() {
        let sub: Subsegment = serde_json::from_str(
            r#"{"name": "stage", "subsegments": [
                {"name": "Overhead"},
                {"name": "Partial", "aws": {"operation": "StartJobRun"}},
                {"name": "Glue", "aws": {"request_id": "req-9"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(sub.sdk_request_id(), Some("req-9"));
    }
}
