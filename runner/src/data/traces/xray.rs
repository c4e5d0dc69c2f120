//! X-Ray backed trace store

use async_trait::async_trait;
use aws_sdk_xray::Client;

use super::error::TraceError;
use super::store::{RawSegment, TraceStore};
use crate::core::{AwsConfig, AwsService};
use crate::data::aws::load_sdk_config;

#[derive(Debug, Clone)]
pub struct XrayTraceStore {
    client: Client,
}

impl XrayTraceStore {
    pub async fn new(aws: &AwsConfig) -> Self {
        let config = load_sdk_config(aws).await;
        let mut xray_config = aws_sdk_xray::config::Builder::from(&config);
        if let Some(endpoint_url) = aws.endpoint_url_for(AwsService::Xray) {
            xray_config = xray_config.endpoint_url(endpoint_url);
        }
        Self {
            client: Client::from_conf(xray_config.build()),
        }
    }
}

#[async_trait]
impl TraceStore for XrayTraceStore {
    async fn fetch_trace(&self, trace_id: &str) -> Result<Vec<RawSegment>, TraceError> {
        let mut segments = Vec::new();
        let mut found = false;
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .batch_get_traces()
                .trace_ids(trace_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| {
                    TraceError::Fetch(format!(
                        "BatchGetTraces error: {}",
                        e.into_service_error()
                    ))
                })?;

            for trace in response.traces() {
                found = true;
                for segment in trace.segments() {
                    let id = segment
                        .id()
                        .ok_or(TraceError::MissingField { field: "Id" })?;
                    let document = segment
                        .document()
                        .ok_or(TraceError::MissingField { field: "Document" })?;
                    segments.push(RawSegment::new(id, document));
                }
            }

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        if !found {
            return Err(TraceError::NotFound {
                trace_id: trace_id.to_string(),
            });
        }

        tracing::debug!(
            trace_id,
            segments = segments.len(),
            "Trace fetched from X-Ray"
        );
        Ok(segments)
    }
}
