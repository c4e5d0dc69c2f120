//! One stage invocation: link, read, transform, write
//!
//! The parent link is settled before any span is opened. Everything after it
//! runs under a single `Stage Execution` server span.

use std::sync::Arc;

use opentelemetry::trace::SpanKind;
use opentelemetry::{Context, KeyValue};
use serde::Serialize;

use super::error::PipelineError;
use super::instrument::{Instrumentation, Stage};
use super::resilient::ResilientIo;
use crate::core::constants::{
    SPAN_DATA_PROCESSING, SPAN_READ_SOURCE, SPAN_STAGE_EXECUTION, SPAN_WRITE_DESTINATION,
};
use crate::core::{ConfigError, LinkingMode, StageParams};
use crate::data::objects::{ObjectLocation, ObjectStore};
use crate::data::traces::TraceStore;
use crate::domain::linking::{
    Link, SegmentGraph, TraceLinker, build_carrier, check_field_value, extract_context,
};
use crate::domain::transforms::{Table, Transform};

/// Summary of a successful invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage_name: String,
    pub parent_id: Option<String>,
    pub linked: bool,
    pub rows_read: usize,
    pub rows_written: usize,
    pub bytes_written: usize,
}

pub struct StagePipeline {
    traces: Arc<dyn TraceStore>,
    objects: Arc<dyn ObjectStore>,
    instrument: Instrumentation,
    io: ResilientIo,
    linker: TraceLinker,
    linking_mode: LinkingMode,
}

impl StagePipeline {
    pub fn new(
        traces: Arc<dyn TraceStore>,
        objects: Arc<dyn ObjectStore>,
        instrument: Instrumentation,
        io: ResilientIo,
    ) -> Self {
        Self {
            traces,
            objects,
            instrument,
            io,
            linker: TraceLinker::default(),
            linking_mode: LinkingMode::default(),
        }
    }

    pub fn with_linking_mode(mut self, linking_mode: LinkingMode) -> Self {
        self.linking_mode = linking_mode;
        self
    }

    pub fn with_linker(mut self, linker: TraceLinker) -> Self {
        self.linker = linker;
        self
    }

    pub async fn run(
        &self,
        params: &StageParams,
        transform: &dyn Transform,
    ) -> Result<StageReport, PipelineError> {
        let source = parse_location("source", &params.source)?;
        let destination = parse_location("destination", &params.destination)?;
        check_field_value("Root", &params.root_trace_id)?;

        let parent_id = self.resolve_parent(params).await?;
        let carrier = build_carrier(&params.root_trace_id, parent_id.as_deref())?;
        let parent_cx = extract_context(&carrier)?.otel_context()?;
        tracing::info!(
            stage = %params.stage_name,
            carrier = %carrier.value,
            "Parent context established"
        );

        let stage = Stage::new(SPAN_STAGE_EXECUTION)
            .with_kind(SpanKind::Server)
            .with_attribute("stage.name", params.stage_name.clone())
            .with_attribute("stage.transform", transform.name());

        let (rows_read, rows_written, bytes_written) = self
            .instrument
            .run(stage, Some(&parent_cx), |cx| async move {
                let data = self.read_source(&cx, &source).await?;
                let (rows_read, table) = self.process(&cx, &data, transform)?;
                let encoded = table.to_json_lines()?;
                self.write_destination(&cx, &destination, &encoded).await?;
                Ok::<_, PipelineError>((rows_read, table.len(), encoded.len()))
            })
            .await?;

        let report = StageReport {
            stage_name: params.stage_name.clone(),
            linked: parent_id.is_some(),
            parent_id,
            rows_read,
            rows_written,
            bytes_written,
        };
        tracing::info!(
            stage = %report.stage_name,
            parent_id = report.parent_id.as_deref().unwrap_or("none"),
            rows_read,
            rows_written,
            bytes_written,
            "Stage completed"
        );
        Ok(report)
    }

    /// Fetch the trace and walk it for this stage's parent segment
    async fn resolve_parent(&self, params: &StageParams) -> Result<Option<String>, PipelineError> {
        let raw = self.traces.fetch_trace(&params.root_trace_id).await?;
        let graph = SegmentGraph::from_segments(raw)?;
        tracing::debug!(
            trace_id = %params.root_trace_id,
            segments = graph.len(),
            "Trace snapshot loaded"
        );

        let stage = &params.stage_name;
        match (self.linker.link(&graph, stage), self.linking_mode) {
            (Link::Resolved { ambiguous: true, .. }, LinkingMode::Strict) => {
                Err(PipelineError::LinkNotFound {
                    stage: stage.clone(),
                    reason: "stage name recorded more than once in the orchestrator segment"
                        .to_string(),
                })
            }
            (Link::Resolved { segment_id, .. }, _) => {
                tracing::info!(stage = %stage, parent_id = %segment_id, "Resolved parent segment");
                Ok(Some(segment_id))
            }
            (Link::Missing(step), LinkingMode::Strict) => Err(PipelineError::LinkNotFound {
                stage: stage.clone(),
                reason: format!("{step} not found"),
            }),
            (Link::Missing(step), LinkingMode::BestEffort) => {
                tracing::warn!(
                    stage = %stage,
                    missing = %step,
                    "No parent segment resolved; continuing with an unparented root span"
                );
                Ok(None)
            }
        }
    }

    async fn read_source(
        &self,
        cx: &Context,
        location: &ObjectLocation,
    ) -> Result<Vec<u8>, PipelineError> {
        let stage = Stage::new(SPAN_READ_SOURCE)
            .with_attribute("object.location", location.to_string())
            .with_attribute("object.backend", self.objects.backend_name());
        self.instrument
            .run(stage, Some(cx), |cx| async move {
                self.io
                    .attempt(&cx, "read source", || self.objects.get(location))
                    .await
                    .map_err(|source| PipelineError::TransientIo {
                        operation: "read source",
                        source,
                    })
            })
            .await
    }

    /// Decode the source and apply every transform step in its own span.
    ///
    /// Returns the decoded row count alongside the transformed table.
    fn process(
        &self,
        cx: &Context,
        data: &[u8],
        transform: &dyn Transform,
    ) -> Result<(usize, Table), PipelineError> {
        let stage =
            Stage::new(SPAN_DATA_PROCESSING).with_attribute("transform.name", transform.name());
        self.instrument.run_sync(stage, Some(cx), |cx| {
            let mut table = Table::from_json_lines(data)?;
            let rows_read = table.len();
            for step in transform.steps() {
                let span = Stage::new(step.name()).with_attributes(
                    step.attributes()
                        .iter()
                        .map(|(key, value)| KeyValue::new(*key, value.clone())),
                );
                self.instrument
                    .run_sync(span, Some(cx), |_| step.apply(&mut table))?;
                tracing::debug!(step = step.name(), rows = table.len(), "Transform step applied");
            }
            Ok::<_, PipelineError>((rows_read, table))
        })
    }

    async fn write_destination(
        &self,
        cx: &Context,
        location: &ObjectLocation,
        data: &[u8],
    ) -> Result<(), PipelineError> {
        let stage = Stage::new(SPAN_WRITE_DESTINATION)
            .with_attribute("object.location", location.to_string())
            .with_attribute("object.bytes", i64::try_from(data.len()).unwrap_or(i64::MAX));
        self.instrument
            .run(stage, Some(cx), |cx| async move {
                self.io
                    .attempt(&cx, "write destination", || self.objects.put(location, data))
                    .await
                    .map_err(|source| PipelineError::TransientIo {
                        operation: "write destination",
                        source,
                    })
            })
            .await
    }
}

fn parse_location(field: &str, value: &str) -> Result<ObjectLocation, PipelineError> {
    ObjectLocation::parse(value)
        .map_err(|e| PipelineError::Configuration(ConfigError::Invalid(format!("{field}: {e}"))))
}
