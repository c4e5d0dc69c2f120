//! Scoped spans around units of stage work
//!
//! Every span opened here moves through `Open -> (Ok | Error) -> Closed` and
//! is ended exactly once, when its [`ScopedSpan`] is dropped. A future that is
//! cancelled or a closure that panics still ends its span, marked as an error.

use std::borrow::Cow;
use std::error::Error;
use std::future::Future;

use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue, Value};
use opentelemetry_sdk::trace::SdkTracer;

/// Name, kind and attributes of a span to open
#[derive(Debug, Clone)]
pub struct Stage {
    name: Cow<'static, str>,
    kind: SpanKind,
    attributes: Vec<KeyValue>,
}

impl Stage {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            kind: SpanKind::Internal,
            attributes: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_attribute(
        mut self,
        key: impl Into<opentelemetry::Key>,
        value: impl Into<Value>,
    ) -> Self {
        self.attributes.push(KeyValue::new(key, value));
        self
    }

    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = KeyValue>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanState {
    Open,
    Ok,
    Error,
    Closed,
}

/// Owns one open span inside a context
struct ScopedSpan {
    cx: Context,
    state: SpanState,
}

impl ScopedSpan {
    fn new(cx: Context) -> Self {
        Self {
            cx,
            state: SpanState::Open,
        }
    }

    fn succeed(&mut self) {
        if self.state == SpanState::Open {
            self.cx.span().set_status(Status::Ok);
            self.state = SpanState::Ok;
        }
    }

    fn fail(&mut self, err: &dyn Error) {
        if self.state == SpanState::Open {
            let span = self.cx.span();
            span.record_error(err);
            span.set_status(Status::error(err.to_string()));
            self.state = SpanState::Error;
        }
    }

    fn close(&mut self) {
        match self.state {
            SpanState::Closed => return,
            SpanState::Open => {
                let reason = if std::thread::panicking() {
                    "stage panicked"
                } else {
                    "stage abandoned before completion"
                };
                self.cx.span().set_status(Status::error(reason));
                self.state = SpanState::Error;
            }
            SpanState::Ok | SpanState::Error => {}
        }
        self.cx.span().end();
        self.state = SpanState::Closed;
    }
}

impl Drop for ScopedSpan {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens stage spans on a fixed tracer
#[derive(Debug, Clone)]
pub struct Instrumentation {
    tracer: SdkTracer,
}

impl Instrumentation {
    pub fn new(tracer: SdkTracer) -> Self {
        Self { tracer }
    }

    fn open(&self, stage: Stage, parent: Option<&Context>) -> ScopedSpan {
        let root = Context::new();
        let parent = parent.unwrap_or(&root);
        let span = self
            .tracer
            .span_builder(stage.name)
            .with_kind(stage.kind)
            .with_attributes(stage.attributes)
            .start_with_context(&self.tracer, parent);
        ScopedSpan::new(parent.with_span(span))
    }

    /// Run `work` inside a new span, child of `parent` or a new root.
    ///
    /// `work` receives the span's context so nested stages can parent under
    /// it. An error is recorded on the span and returned unchanged.
    pub async fn run<T, E, F, Fut>(
        &self,
        stage: Stage,
        parent: Option<&Context>,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error,
    {
        let mut span = self.open(stage, parent);
        let result = work(span.cx.clone()).await;
        match &result {
            Ok(_) => span.succeed(),
            Err(err) => span.fail(err),
        }
        result
    }

    /// Synchronous form of [`Instrumentation::run`] for CPU-bound work
    pub fn run_sync<T, E, F>(&self, stage: Stage, parent: Option<&Context>, work: F) -> Result<T, E>
    where
        F: FnOnce(&Context) -> Result<T, E>,
        E: Error,
    {
        let mut span = self.open(stage, parent);
        let result = work(&span.cx);
        match &result {
            Ok(_) => span.succeed(),
            Err(err) => span.fail(err),
        }
        result
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};

    use super::Instrumentation;

    /// Instrumentation exporting synchronously into memory
    pub(crate) fn in_memory() -> (Instrumentation, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (Instrumentation::new(provider.tracer("test")), exporter)
    }

    pub(crate) fn finished(exporter: &InMemorySpanExporter) -> Vec<SpanData> {
        exporter.get_finished_spans().unwrap()
    }

    pub(crate) fn span<'a>(spans: &'a [SpanData], name: &str) -> &'a SpanData {
        spans
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("span {name} not exported"))
    }

    pub(crate) fn exception_count(span: &SpanData) -> usize {
        span.events
            .events
            .iter()
            .filter(|e| e.name == "exception")
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use opentelemetry::trace::{SpanId, TraceContextExt};

    use super::testing::{exception_count, finished, in_memory, span};
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl Error for Boom {}

    #[tokio::test]
    async fn test_success_marks_ok() {
        let (instrument, exporter) = in_memory();
        let value = instrument
            .run(Stage::new("work").with_attribute("stage.name", "clean-job"), None, |_| async {
                Ok::<_, Boom>(7)
            })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let spans = finished(&exporter);
        assert_eq!(spans.len(), 1);
        let work = span(&spans, "work");
        assert_eq!(work.status, Status::Ok);
        assert_eq!(work.parent_span_id, SpanId::INVALID);
        assert!(
            work.attributes
                .iter()
                .any(|kv| kv.key.as_str() == "stage.name" && kv.value.as_str() == "clean-job")
        );
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_propagated() {
        let (instrument, exporter) = in_memory();
        let result = instrument
            .run(Stage::new("work"), None, |_| async { Err::<(), _>(Boom) })
            .await;
        assert!(matches!(result, Err(Boom)));

        let spans = finished(&exporter);
        let work = span(&spans, "work");
        assert_eq!(work.status, Status::error("boom"));
        assert_eq!(exception_count(work), 1);
    }

    #[tokio::test]
    async fn test_nested_spans_parent_under_caller() {
        let (instrument, exporter) = in_memory();
        instrument
            .run(Stage::new("outer"), None, |cx| {
                let instrument = instrument.clone();
                async move {
                    instrument
                        .run(Stage::new("inner"), Some(&cx), |_| async { Ok::<_, Boom>(()) })
                        .await
                }
            })
            .await
            .unwrap();

        let spans = finished(&exporter);
        let outer = span(&spans, "outer");
        let inner = span(&spans, "inner");
        assert_eq!(inner.parent_span_id, outer.span_context.span_id());
        assert_eq!(inner.span_context.trace_id(), outer.span_context.trace_id());
    }

    #[tokio::test]
    async fn test_inner_failure_marks_both_spans() {
        let (instrument, exporter) = in_memory();
        let result = instrument
            .run(Stage::new("outer"), None, |cx| {
                let instrument = instrument.clone();
                async move {
                    instrument
                        .run(Stage::new("inner"), Some(&cx), |_| async { Err::<(), _>(Boom) })
                        .await
                }
            })
            .await;
        assert!(result.is_err());

        let spans = finished(&exporter);
        assert_eq!(span(&spans, "inner").status, Status::error("boom"));
        assert_eq!(span(&spans, "outer").status, Status::error("boom"));
    }

    #[tokio::test]
    async fn test_remote_parent_is_used() {
        let (instrument, exporter) = in_memory();
        let carrier = crate::domain::linking::build_carrier(
            "1-5759e988-bd862e3fe1be46a994272793",
            Some("53995c3f42cd8ad8"),
        )
        .unwrap();
        let parent = crate::domain::linking::extract_context(&carrier)
            .unwrap()
            .otel_context()
            .unwrap();
        let parent_span_id = parent.span().span_context().span_id();

        instrument
            .run(Stage::new("child"), Some(&parent), |_| async { Ok::<_, Boom>(()) })
            .await
            .unwrap();

        let spans = finished(&exporter);
        let child = span(&spans, "child");
        assert_eq!(child.parent_span_id, parent_span_id);
        assert_eq!(
            child.span_context.trace_id(),
            parent.span().span_context().trace_id()
        );
    }

    #[test]
    fn test_run_sync_records_error() {
        let (instrument, exporter) = in_memory();
        let result: Result<(), Boom> = instrument.run_sync(Stage::new("step"), None, |_| Err(Boom));
        assert!(result.is_err());
        let spans = finished(&exporter);
        assert_eq!(span(&spans, "step").status, Status::error("boom"));
    }

    #[test]
    fn test_panic_still_ends_span() {
        let (instrument, exporter) = in_memory();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), Boom> =
                instrument.run_sync(Stage::new("step"), None, |_| panic!("kaboom"));
        }));
        assert!(outcome.is_err());

        let spans = finished(&exporter);
        assert_eq!(span(&spans, "step").status, Status::error("stage panicked"));
    }

    #[tokio::test]
    async fn test_dropped_future_ends_span() {
        let (instrument, exporter) = in_memory();
        let fut = instrument.run(Stage::new("abandoned"), None, |_| async {
            std::future::pending::<Result<(), Boom>>().await
        });
        let _ = tokio::time::timeout(std::time::Duration::from_millis(1), fut).await;

        let spans = finished(&exporter);
        assert_eq!(
            span(&spans, "abandoned").status,
            Status::error("stage abandoned before completion")
        );
    }
}
