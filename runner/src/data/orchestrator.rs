//! Workflow orchestrator client used by the downstream trigger

use async_trait::async_trait;
use aws_sdk_sfn::Client;
use thiserror::Error;

use crate::core::{AwsConfig, AwsService};
use crate::data::aws::load_sdk_config;
use crate::utils::faults::InjectedFault;
use crate::utils::retry::Retryable;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("StartExecution failed: {0}")]
    StartExecution(String),

    #[error(transparent)]
    Injected(#[from] InjectedFault),
}

impl Retryable for OrchestratorError {}

/// Starts executions of a state machine
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Start one execution with the given JSON input, returning the execution ARN.
    ///
    /// A repeated call with the same `name` and input refers to the same
    /// execution instead of starting another.
    async fn start_execution(
        &self,
        state_machine_arn: &str,
        name: Option<&str>,
        input: &str,
    ) -> Result<String, OrchestratorError>;
}

/// Step Functions backed orchestrator
#[derive(Debug, Clone)]
pub struct SfnOrchestrator {
    client: Client,
}

impl SfnOrchestrator {
    pub async fn new(aws: &AwsConfig) -> Self {
        let config = load_sdk_config(aws).await;
        let mut sfn_config = aws_sdk_sfn::config::Builder::from(&config);
        if let Some(endpoint_url) = aws.endpoint_url_for(AwsService::StepFunctions) {
            sfn_config = sfn_config.endpoint_url(endpoint_url);
        }
        Self {
            client: Client::from_conf(sfn_config.build()),
        }
    }
}

#[async_trait]
impl Orchestrator for SfnOrchestrator {
    async fn start_execution(
        &self,
        state_machine_arn: &str,
        name: Option<&str>,
        input: &str,
    ) -> Result<String, OrchestratorError> {
        let response = self
            .client
            .start_execution()
            .state_machine_arn(state_machine_arn)
            .set_name(name.map(str::to_string))
            .input(input)
            .send()
            .await
            .map_err(|e| OrchestratorError::StartExecution(e.into_service_error().to_string()))?;

        Ok(response.execution_arn().to_string())
    }
}
