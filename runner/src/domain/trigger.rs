//! Downstream trigger: object-created notification to orchestrator execution

use std::sync::Arc;

use opentelemetry::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::orchestrator::{Orchestrator, OrchestratorError};
use crate::domain::linking::root_from_header;
use crate::domain::stage::ResilientIo;
use crate::utils::retry::AttemptError;

#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("Invalid event: {0}")]
    InvalidEvent(#[from] serde_json::Error),

    #[error("Invalid event structure: no Records found")]
    NoRecords,

    #[error("Failed to start execution: {0}")]
    Start(#[from] AttemptError<OrchestratorError>),
}

#[derive(Debug, Deserialize)]
struct S3Event {
    #[serde(rename = "Records", default)]
    records: Vec<S3EventRecord>,
}

#[derive(Debug, Deserialize)]
struct S3EventRecord {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: String,
    #[serde(default)]
    sequencer: Option<String>,
}

/// Step Functions limit on execution names
const MAX_EXECUTION_NAME_LEN: usize = 80;
const MAX_NAME_TOKEN_LEN: usize = 40;

/// Input handed to the state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionInput {
    pub bucket_name: String,
    pub object_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Ordering token of the notification; identifies this object event
    #[serde(skip)]
    pub sequencer: Option<String>,
}

impl ExecutionInput {
    /// Build the input from the first record of an S3 notification
    pub fn from_event(event: &str, trace_header: Option<&str>) -> Result<Self, TriggerError> {
        let event: S3Event = serde_json::from_str(event)?;
        let record = event.records.into_iter().next().ok_or(TriggerError::NoRecords)?;

        let trace_id = trace_header.and_then(root_from_header);
        if trace_id.is_none() {
            tracing::warn!("No trace header found; starting execution without trace_id");
        }

        Ok(Self {
            bucket_name: record.s3.bucket.name,
            object_key: record.s3.object.key,
            trace_id,
            sequencer: record.s3.object.sequencer.filter(|s| !s.is_empty()),
        })
    }

    /// Deterministic execution name for this event, so a retried start
    /// resolves to the execution an earlier attempt may already have created.
    ///
    /// `None` when the event carries neither a sequencer nor a trace id.
    pub fn execution_name(&self) -> Option<String> {
        let token = self.sequencer.as_deref().or(self.trace_id.as_deref())?;
        let token: String = name_chars(token).take(MAX_NAME_TOKEN_LEN).collect();
        let room = MAX_EXECUTION_NAME_LEN - token.len() - 1;
        let key: String = name_chars(&self.object_key).take(room).collect();
        Some(format!("{key}-{token}"))
    }
}

/// Characters allowed in an execution name; anything else becomes `-`
fn name_chars(value: &str) -> impl Iterator<Item = char> + '_ {
    value.chars().map(|c| {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            c
        } else {
            '-'
        }
    })
}

pub struct Trigger {
    orchestrator: Arc<dyn Orchestrator>,
    state_machine_arn: String,
    io: ResilientIo,
}

impl Trigger {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        state_machine_arn: impl Into<String>,
        io: ResilientIo,
    ) -> Self {
        Self {
            orchestrator,
            state_machine_arn: state_machine_arn.into(),
            io,
        }
    }

    /// Start one execution for the notification, returning its ARN
    pub async fn fire(&self, event: &str, trace_header: Option<&str>) -> Result<String, TriggerError> {
        let input = ExecutionInput::from_event(event, trace_header)?;
        tracing::info!(
            bucket = %input.bucket_name,
            key = %input.object_key,
            trace_id = input.trace_id.as_deref().unwrap_or("none"),
            "Object created event received"
        );

        let payload = serde_json::to_string(&input)?;
        let name = input.execution_name();
        if name.is_none() {
            tracing::warn!("Event has no sequencer or trace id; retried starts are not deduplicated");
        }
        let execution_arn = self
            .io
            .attempt(&Context::new(), "start execution", || {
                self.orchestrator
                    .start_execution(&self.state_machine_arn, name.as_deref(), &payload)
            })
            .await?;

        tracing::info!(execution_arn = %execution_arn, "Execution started");
        Ok(execution_arn)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::utils::faults::ScriptedFaults;
    use crate::utils::retry::RetryPolicy;

    const EVENT: &str = r#"{
        "Records": [{
            "eventName": "ObjectCreated:Put",
            "s3": {
                "bucket": {"name": "raw-data"},
                "object": {"key": "input/listings.jsonl", "size": 10, "sequencer": "0055AED6DCD90281E5"}
            }
        }]
    }"#;

    const HEADER: &str = "Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1";

    #[derive(Default)]
    struct RecordingOrchestrator {
        calls: Mutex<Vec<(String, Option<String>, String)>>,
        failures: Mutex<u32>,
    }

    impl RecordingOrchestrator {
        fn failing(failures: u32) -> Self {
            Self {
                failures: Mutex::new(failures),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Orchestrator for RecordingOrchestrator {
        async fn start_execution(
            &self,
            state_machine_arn: &str,
            name: Option<&str>,
            input: &str,
        ) -> Result<String, OrchestratorError> {
            self.calls.lock().push((
                state_machine_arn.to_string(),
                name.map(str::to_string),
                input.to_string(),
            ));
            let mut failures = self.failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(OrchestratorError::StartExecution("request timed out".to_string()));
            }
            Ok(format!("{state_machine_arn}:exec-1"))
        }
    }

    #[test]
    fn test_input_from_event() {
        let input = ExecutionInput::from_event(EVENT, Some(HEADER)).unwrap();
        assert_eq!(
            input,
            ExecutionInput {
                bucket_name: "raw-data".to_string(),
                object_key: "input/listings.jsonl".to_string(),
                trace_id: Some("1-5759e988-bd862e3fe1be46a994272793".to_string()),
                sequencer: Some("0055AED6DCD90281E5".to_string()),
            }
        );
    }

    #[test]
    fn test_execution_name_is_deterministic() {
        let input = ExecutionInput::from_event(EVENT, Some(HEADER)).unwrap();
        assert_eq!(
            input.execution_name().as_deref(),
            Some("input-listings-jsonl-0055AED6DCD90281E5")
        );
        let again = ExecutionInput::from_event(EVENT, Some(HEADER)).unwrap();
        assert_eq!(input.execution_name(), again.execution_name());
    }

    #[test]
    fn test_execution_name_falls_back_to_trace_id() {
        let input = ExecutionInput {
            bucket_name: "raw-data".to_string(),
            object_key: "a/b.jsonl".to_string(),
            trace_id: Some("1-5759e988-bd862e3fe1be46a994272793".to_string()),
            sequencer: None,
        };
        assert_eq!(
            input.execution_name().as_deref(),
            Some("a-b-jsonl-1-5759e988-bd862e3fe1be46a994272793")
        );

        let untraced = ExecutionInput {
            trace_id: None,
            ..input
        };
        assert_eq!(untraced.execution_name(), None);
    }

    #[test]
    fn test_execution_name_fits_length_limit() {
        let input = ExecutionInput {
            bucket_name: "raw-data".to_string(),
            object_key: "deep/".repeat(40),
            trace_id: None,
            sequencer: Some("F".repeat(100)),
        };
        let name = input.execution_name().unwrap();
        assert_eq!(name.len(), MAX_EXECUTION_NAME_LEN);
        assert!(
            name.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert!(name.ends_with(&"F".repeat(MAX_NAME_TOKEN_LEN)));
    }

    #[test]
    fn test_trace_id_omitted_without_header() {
        let input = ExecutionInput::from_event(EVENT, None).unwrap();
        assert_eq!(
            serde_json::to_string(&input).unwrap(),
            r#"{"bucket_name":"raw-data","object_key":"input/listings.jsonl"}"#
        );
    }

    #[test]
    fn test_event_without_records() {
        assert!(matches!(
            ExecutionInput::from_event(r#"{"Records": []}"#, None),
            Err(TriggerError::NoRecords)
        ));
        assert!(matches!(
            ExecutionInput::from_event("{}", None),
            Err(TriggerError::NoRecords)
        ));
        assert!(matches!(
            ExecutionInput::from_event("not json", None),
            Err(TriggerError::InvalidEvent(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_starts_execution_after_injected_fault() {
        let orchestrator = Arc::new(RecordingOrchestrator::default());
        let io = ResilientIo::new(
            RetryPolicy::new(3, Duration::from_millis(10)),
            Arc::new(ScriptedFaults::failing(1)),
        );
        let trigger = Trigger::new(orchestrator.clone(), "arn:aws:states:sm", io);

        let arn = trigger.fire(EVENT, Some(HEADER)).await.unwrap();
        assert_eq!(arn, "arn:aws:states:sm:exec-1");

        let calls = orchestrator.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "arn:aws:states:sm");
        let input: serde_json::Value = serde_json::from_str(&calls[0].2).unwrap();
        assert_eq!(input["trace_id"], "1-5759e988-bd862e3fe1be46a994272793");
        assert_eq!(input["bucket_name"], "raw-data");
        assert!(input.get("sequencer").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retried_start_reuses_execution_name() {
        let orchestrator = Arc::new(RecordingOrchestrator::failing(2));
        let io = ResilientIo::new(
            RetryPolicy::new(3, Duration::from_millis(10)),
            Arc::new(ScriptedFaults::default()),
        );
        let trigger = Trigger::new(orchestrator.clone(), "arn:aws:states:sm", io);

        trigger.fire(EVENT, Some(HEADER)).await.unwrap();

        let calls = orchestrator.calls.lock();
        assert_eq!(calls.len(), 3);
        for (_, name, input) in calls.iter() {
            assert_eq!(name.as_deref(), Some("input-listings-jsonl-0055AED6DCD90281E5"));
            assert_eq!(input, &calls[0].2);
        }
    }
}
