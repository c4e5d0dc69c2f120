use clap::{Args, Parser, Subcommand};

use std::path::PathBuf;

use super::config::{FaultMode, LinkingMode, TransformKind};
use super::constants::{
    ENV_AMZN_TRACE_ID, ENV_AWS_ENDPOINT_URL, ENV_AWS_REGION, ENV_COLLECTOR_ENDPOINT, ENV_CONFIG,
    ENV_DESTINATION, ENV_FAULTS_FAILURE_RATE, ENV_FAULTS_MODE, ENV_LINKING_MODE,
    ENV_RETRY_BASE_DELAY_MS, ENV_RETRY_MAX_ATTEMPTS, ENV_ROOT_TRACE_ID, ENV_SERVICE_NAME,
    ENV_SFN_ENDPOINT_URL, ENV_SOURCE, ENV_STAGE_NAME, ENV_STATE_MACHINE_ARN, ENV_TRANSFORM,
    ENV_XRAY_ENDPOINT_URL,
};

#[derive(Parser)]
#[command(name = "stagelink")]
#[command(version, about = "Trace-linked batch stage runner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// AWS region for S3, X-Ray and Step Functions clients
    #[arg(long, global = true, env = ENV_AWS_REGION)]
    pub aws_region: Option<String>,

    /// Custom S3 endpoint URL (MinIO, LocalStack and other S3-compatible services)
    #[arg(long, global = true, env = ENV_AWS_ENDPOINT_URL)]
    pub aws_endpoint_url: Option<String>,

    /// Custom X-Ray endpoint URL
    #[arg(long, global = true, env = ENV_XRAY_ENDPOINT_URL)]
    pub xray_endpoint_url: Option<String>,

    /// Custom Step Functions endpoint URL
    #[arg(long, global = true, env = ENV_SFN_ENDPOINT_URL)]
    pub sfn_endpoint_url: Option<String>,

    /// Fault injection mode (off or random). Demo/test use only.
    #[arg(long, global = true, env = ENV_FAULTS_MODE, value_parser = parse_fault_mode)]
    pub faults: Option<FaultMode>,

    /// Probability of an injected transient failure per attempt
    #[arg(long, global = true, env = ENV_FAULTS_FAILURE_RATE)]
    pub faults_failure_rate: Option<f64>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Run one pipeline stage under the orchestrator's trace
    Run(RunArgs),
    /// Start the orchestrator for a newly created object
    Trigger(TriggerArgs),
}

/// Stage invocation parameters supplied by the orchestrator
#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
    /// Logical stage name (must match the orchestrator's step name)
    #[arg(long, aliases = ["job-name", "job_name"], env = ENV_STAGE_NAME)]
    pub stage_name: Option<String>,

    /// Root trace id of the orchestrator execution
    #[arg(long, aliases = ["trace-id", "trace_id"], env = ENV_ROOT_TRACE_ID)]
    pub root_trace_id: Option<String>,

    /// Telemetry collector host or full OTLP/HTTP traces URL
    #[arg(long, aliases = ["otlp-endpoint", "otlp_endpoint"], env = ENV_COLLECTOR_ENDPOINT)]
    pub collector_endpoint: Option<String>,

    /// Source object location (s3://bucket/key or a local path)
    #[arg(long, env = ENV_SOURCE)]
    pub source: Option<String>,

    /// Destination object location (s3://bucket/key or a local path)
    #[arg(long, env = ENV_DESTINATION)]
    pub destination: Option<String>,

    /// Service name reported on exported spans (defaults to the stage name)
    #[arg(long, env = ENV_SERVICE_NAME)]
    pub service_name: Option<String>,

    /// Payload transform (none, cleaning, processing)
    #[arg(long, env = ENV_TRANSFORM, value_parser = parse_transform_kind)]
    pub transform: Option<TransformKind>,

    /// Behaviour when no parent span can be resolved (strict or best-effort)
    #[arg(long, env = ENV_LINKING_MODE, value_parser = parse_linking_mode)]
    pub linking_mode: Option<LinkingMode>,

    /// Attempt budget for each guarded I/O call
    #[arg(long, env = ENV_RETRY_MAX_ATTEMPTS)]
    pub max_attempts: Option<u32>,

    /// Base delay in milliseconds for exponential backoff
    #[arg(long, env = ENV_RETRY_BASE_DELAY_MS)]
    pub base_delay_ms: Option<u64>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct TriggerArgs {
    /// Path to the object-created notification JSON (reads stdin if omitted)
    #[arg(long)]
    pub event: Option<PathBuf>,

    /// State machine to start
    #[arg(long, env = ENV_STATE_MACHINE_ARN)]
    pub state_machine_arn: Option<String>,

    /// Trace header of the current invocation
    #[arg(long, env = ENV_AMZN_TRACE_ID)]
    pub trace_header: Option<String>,

    /// Attempt budget for starting the execution
    #[arg(long, env = ENV_RETRY_MAX_ATTEMPTS)]
    pub max_attempts: Option<u32>,

    /// Base delay in milliseconds for exponential backoff
    #[arg(long, env = ENV_RETRY_BASE_DELAY_MS)]
    pub base_delay_ms: Option<u64>,
}

/// Parse linking mode from CLI/env string
fn parse_linking_mode(s: &str) -> Result<LinkingMode, String> {
    match s.to_lowercase().as_str() {
        "strict" => Ok(LinkingMode::Strict),
        "best-effort" | "best_effort" => Ok(LinkingMode::BestEffort),
        _ => Err(format!(
            "Invalid linking mode '{}'. Valid options: strict, best-effort",
            s
        )),
    }
}

/// Parse transform kind from CLI/env string
fn parse_transform_kind(s: &str) -> Result<TransformKind, String> {
    match s.to_lowercase().as_str() {
        "none" => Ok(TransformKind::None),
        "cleaning" => Ok(TransformKind::Cleaning),
        "processing" => Ok(TransformKind::Processing),
        _ => Err(format!(
            "Invalid transform '{}'. Valid options: none, cleaning, processing",
            s
        )),
    }
}

/// Parse fault injection mode from CLI/env string
fn parse_fault_mode(s: &str) -> Result<FaultMode, String> {
    match s.to_lowercase().as_str() {
        "off" | "false" | "none" => Ok(FaultMode::Off),
        "random" | "true" => Ok(FaultMode::Random),
        _ => Err(format!(
            "Invalid fault mode '{}'. Valid options: off, random",
            s
        )),
    }
}

/// Configuration derived from global CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub aws_region: Option<String>,
    pub aws_endpoint_url: Option<String>,
    pub xray_endpoint_url: Option<String>,
    pub sfn_endpoint_url: Option<String>,
    pub faults: Option<FaultMode>,
    pub faults_failure_rate: Option<f64>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Commands) {
    let cli = Cli::parse();
    let config = CliConfig {
        config: cli.config,
        aws_region: cli.aws_region,
        aws_endpoint_url: cli.aws_endpoint_url,
        xray_endpoint_url: cli.xray_endpoint_url,
        sfn_endpoint_url: cli.sfn_endpoint_url,
        faults: cli.faults,
        faults_failure_rate: cli.faults_failure_rate,
    };
    (config, cli.command)
}
