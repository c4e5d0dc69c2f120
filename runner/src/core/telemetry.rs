//! Process-wide tracer provider
//!
//! The provider is built once, before the async runtime starts, and torn down
//! explicitly after the runtime has finished so every batched span is flushed.

use std::sync::atomic::{AtomicBool, Ordering};

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use thiserror::Error;

use super::config::TelemetryConfig;
use super::constants::{
    APP_NAME_LOWER, CLOUD_PROVIDER_ATTR, CLOUD_PROVIDER_VALUE, OTLP_HTTP_PORT, OTLP_TRACES_PATH,
};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Tracer provider already initialized for this process")]
    AlreadyInitialized,

    #[error("Failed to build OTLP span exporter: {0}")]
    Exporter(String),

    #[error("Failed to shut down tracer provider: {0}")]
    Shutdown(String),
}

/// Expand a collector endpoint into the OTLP/HTTP traces URL.
///
/// - `collector.local` -> `http://collector.local:4318/v1/traces`
/// - `https://otel.example.com/v1/traces` -> unchanged
pub fn collector_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}:{OTLP_HTTP_PORT}{OTLP_TRACES_PATH}")
    }
}

/// Resource describing this stage process on every exported span
pub fn resource(service_name: &str) -> Resource {
    Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attributes([KeyValue::new(CLOUD_PROVIDER_ATTR, CLOUD_PROVIDER_VALUE)])
        .build()
}

/// Owner of the process-wide tracer provider
#[derive(Debug)]
pub struct Telemetry {
    provider: SdkTracerProvider,
}

impl Telemetry {
    /// Build the OTLP exporter and tracer provider, and install it globally.
    ///
    /// Fails with [`TelemetryError::AlreadyInitialized`] on a second call.
    pub fn init(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        if INITIALIZED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TelemetryError::AlreadyInitialized);
        }

        let endpoint = collector_url(&config.collector_endpoint);
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint.clone())
            .build()
            .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

        let provider = SdkTracerProvider::builder()
            .with_resource(resource(&config.service_name))
            .with_batch_exporter(exporter)
            .build();

        opentelemetry::global::set_tracer_provider(provider.clone());

        tracing::debug!(
            endpoint = %endpoint,
            service = %config.service_name,
            "Tracer provider initialized"
        );

        Ok(Self { provider })
    }

    pub fn tracer(&self) -> SdkTracer {
        self.provider.tracer(APP_NAME_LOWER)
    }

    /// Flush pending spans and shut the exporter down
    pub fn shutdown(self) -> Result<(), TelemetryError> {
        if let Err(e) = self.provider.force_flush() {
            tracing::warn!(error = %e, "Span flush failed");
        }
        self.provider
            .shutdown()
            .map_err(|e| TelemetryError::Shutdown(e.to_string()))?;
        tracing::debug!("Tracer provider shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_url_bare_host() {
        assert_eq!(
            collector_url("collector.internal"),
            "http://collector.internal:4318/v1/traces"
        );
    }

    #[test]
    fn test_collector_url_full_url() {
        assert_eq!(
            collector_url("https://otel.example.com/v1/traces"),
            "https://otel.example.com/v1/traces"
        );
    }

    fn attribute(resource: &Resource, key: &str) -> Option<String> {
        resource
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v.to_string())
    }

    #[test]
    fn test_resource_attributes() {
        let resource = resource("clean-job");
        assert_eq!(
            attribute(&resource, CLOUD_PROVIDER_ATTR).as_deref(),
            Some(CLOUD_PROVIDER_VALUE)
        );
        assert_eq!(
            attribute(&resource, "service.name").as_deref(),
            Some("clean-job")
        );
    }

    #[test]
    fn test_init_only_once() {
        let config = TelemetryConfig {
            service_name: "test-stage".to_string(),
            collector_endpoint: "127.0.0.1".to_string(),
        };
        let telemetry = Telemetry::init(&config).unwrap();
        assert!(matches!(
            Telemetry::init(&config),
            Err(TelemetryError::AlreadyInitialized)
        ));
        let _ = telemetry.shutdown();
    }
}
