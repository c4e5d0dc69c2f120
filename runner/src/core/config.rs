use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cli::{CliConfig, RunArgs, TriggerArgs};
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_FAULTS_FAILURE_RATE, DEFAULT_FAULTS_MAX_DELAY_MS,
    DEFAULT_FAULTS_MIN_DELAY_MS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS,
};

// =============================================================================
// Errors
// =============================================================================

/// Configuration errors. All of them are fatal and reported before any work
/// (telemetry setup, trace lookup, span creation) begins.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0} is required")]
    Missing(&'static str),

    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("Config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Linking Mode Enum
// =============================================================================

/// Policy applied when the trace linker cannot resolve a parent span
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkingMode {
    /// Abort the invocation before any span is produced
    Strict,
    /// Continue under a fresh, unparented root span
    #[default]
    BestEffort,
}

impl fmt::Display for LinkingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkingMode::Strict => write!(f, "strict"),
            LinkingMode::BestEffort => write!(f, "best-effort"),
        }
    }
}

// =============================================================================
// Transform Enum
// =============================================================================

/// Payload transform executed between the read and write stages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    #[default]
    None,
    Cleaning,
    Processing,
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformKind::None => write!(f, "none"),
            TransformKind::Cleaning => write!(f, "cleaning"),
            TransformKind::Processing => write!(f, "processing"),
        }
    }
}

// =============================================================================
// Fault Mode Enum
// =============================================================================

/// Fault injection mode for guarded I/O
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultMode {
    #[default]
    Off,
    /// Random transient failures and pre-attempt delays (demo only)
    Random,
}

impl fmt::Display for FaultMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultMode::Off => write!(f, "off"),
            FaultMode::Random => write!(f, "random"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Stage invocation section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StageFileConfig {
    pub name: Option<String>,
    pub root_trace_id: Option<String>,
    pub collector_endpoint: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub service_name: Option<String>,
    pub transform: Option<TransformKind>,
    pub linking_mode: Option<LinkingMode>,
}

/// Retry section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RetryFileConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

/// Fault injection section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FaultsFileConfig {
    pub mode: Option<FaultMode>,
    pub failure_rate: Option<f64>,
    pub min_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

/// AWS client section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AwsFileConfig {
    pub region: Option<String>,
    /// S3-compatible endpoint
    pub endpoint_url: Option<String>,
    pub xray_endpoint_url: Option<String>,
    pub sfn_endpoint_url: Option<String>,
}

/// Trigger section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TriggerFileConfig {
    pub state_machine_arn: Option<String>,
}

/// Root config file structure
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FileConfig {
    pub stage: Option<StageFileConfig>,
    pub retry: Option<RetryFileConfig>,
    pub faults: Option<FaultsFileConfig>,
    pub aws: Option<AwsFileConfig>,
    pub trigger: Option<TriggerFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse(content: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(content)?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Locate and load the config file: CLI-specified path OR local directory
    pub fn discover(cli: &CliConfig) -> Result<Self, ConfigError> {
        let path = if let Some(ref path) = cli.config {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        match path {
            Some(path) => {
                let config = Self::load_from_file(&path)?;
                config.warn_unknown_fields();
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }
}

// =============================================================================
// Resolved Config Structs
// =============================================================================

/// The five parameters every stage invocation receives from the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageParams {
    pub stage_name: String,
    pub root_trace_id: String,
    pub collector_endpoint: String,
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultConfig {
    pub mode: FaultMode,
    pub failure_rate: f64,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            mode: FaultMode::Off,
            failure_rate: DEFAULT_FAULTS_FAILURE_RATE,
            min_delay: Duration::from_millis(DEFAULT_FAULTS_MIN_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_FAULTS_MAX_DELAY_MS),
        }
    }
}

/// AWS service clients built by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwsService {
    S3,
    Xray,
    StepFunctions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsConfig {
    pub region: Option<String>,
    /// S3-compatible endpoint; never applied to other services
    pub endpoint_url: Option<String>,
    pub xray_endpoint_url: Option<String>,
    pub sfn_endpoint_url: Option<String>,
}

impl AwsConfig {
    /// Endpoint override for one service client, if configured
    pub fn endpoint_url_for(&self, service: AwsService) -> Option<&str> {
        match service {
            AwsService::S3 => self.endpoint_url.as_deref(),
            AwsService::Xray => self.xray_endpoint_url.as_deref(),
            AwsService::StepFunctions => self.sfn_endpoint_url.as_deref(),
        }
    }
}

/// Tracer provider settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub collector_endpoint: String,
}

/// Fully resolved configuration for the `run` command
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub params: StageParams,
    pub service_name: String,
    pub transform: TransformKind,
    pub linking_mode: LinkingMode,
    pub retry: RetryConfig,
    pub faults: FaultConfig,
    pub aws: AwsConfig,
}

/// Fully resolved configuration for the `trigger` command
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    pub state_machine_arn: String,
    pub trace_header: Option<String>,
    pub event: Option<PathBuf>,
    pub retry: RetryConfig,
    pub faults: FaultConfig,
    pub aws: AwsConfig,
}

/// Take the first non-empty value, or report the field as missing
fn required(
    field: &'static str,
    cli: Option<String>,
    file: Option<String>,
) -> Result<String, ConfigError> {
    cli.or(file)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(field))
}

fn resolve_faults(
    cli: &CliConfig,
    file: Option<FaultsFileConfig>,
) -> Result<FaultConfig, ConfigError> {
    let file = file.unwrap_or_default();
    let defaults = FaultConfig::default();
    let faults = FaultConfig {
        mode: cli.faults.or(file.mode).unwrap_or(defaults.mode),
        failure_rate: cli
            .faults_failure_rate
            .or(file.failure_rate)
            .unwrap_or(defaults.failure_rate),
        min_delay: file
            .min_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.min_delay),
        max_delay: file
            .max_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_delay),
    };

    if !(0.0..=1.0).contains(&faults.failure_rate) {
        return Err(ConfigError::Invalid(format!(
            "faults.failure_rate must be within [0, 1], got {}",
            faults.failure_rate
        )));
    }
    if faults.min_delay > faults.max_delay {
        return Err(ConfigError::Invalid(
            "faults.min_delay_ms must not exceed faults.max_delay_ms".to_string(),
        ));
    }
    Ok(faults)
}

fn resolve_retry(
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    file: Option<RetryFileConfig>,
) -> Result<RetryConfig, ConfigError> {
    let file = file.unwrap_or_default();
    let defaults = RetryConfig::default();
    let retry = RetryConfig {
        max_attempts: max_attempts
            .or(file.max_attempts)
            .unwrap_or(defaults.max_attempts),
        base_delay: base_delay_ms
            .or(file.base_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.base_delay),
    };
    if retry.max_attempts == 0 {
        return Err(ConfigError::Invalid(
            "retry.max_attempts must be greater than 0".to_string(),
        ));
    }
    Ok(retry)
}

fn resolve_aws(cli: &CliConfig, file: Option<AwsFileConfig>) -> AwsConfig {
    let file = file.unwrap_or_default();
    AwsConfig {
        region: cli.aws_region.clone().or(file.region),
        endpoint_url: cli.aws_endpoint_url.clone().or(file.endpoint_url),
        xray_endpoint_url: cli.xray_endpoint_url.clone().or(file.xray_endpoint_url),
        sfn_endpoint_url: cli.sfn_endpoint_url.clone().or(file.sfn_endpoint_url),
    }
}

impl StageConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Local directory config OR CLI-specified config path
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig, args: &RunArgs) -> Result<Self, ConfigError> {
        tracing::debug!("Loading stage configuration");
        let file = FileConfig::discover(cli)?;
        Self::resolve(file, cli, args)
    }

    /// Layer an already-loaded file config under the CLI arguments
    pub fn resolve(file: FileConfig, cli: &CliConfig, args: &RunArgs) -> Result<Self, ConfigError> {
        let stage = file.stage.unwrap_or_default();

        let params = StageParams {
            stage_name: required("stage_name", args.stage_name.clone(), stage.name)?,
            root_trace_id: required(
                "root_trace_id",
                args.root_trace_id.clone(),
                stage.root_trace_id,
            )?,
            collector_endpoint: required(
                "collector_endpoint",
                args.collector_endpoint.clone(),
                stage.collector_endpoint,
            )?,
            source: required("source", args.source.clone(), stage.source)?,
            destination: required("destination", args.destination.clone(), stage.destination)?,
        };

        let service_name = args
            .service_name
            .clone()
            .or(stage.service_name)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| params.stage_name.clone());

        let retry = resolve_retry(args.max_attempts, args.base_delay_ms, file.retry)?;

        let config = Self {
            params,
            service_name,
            transform: args.transform.or(stage.transform).unwrap_or_default(),
            linking_mode: args.linking_mode.or(stage.linking_mode).unwrap_or_default(),
            retry,
            faults: resolve_faults(cli, file.faults)?,
            aws: resolve_aws(cli, file.aws),
        };

        tracing::debug!(
            stage = %config.params.stage_name,
            transform = %config.transform,
            linking_mode = %config.linking_mode,
            max_attempts = config.retry.max_attempts,
            faults = %config.faults.mode,
            "Stage configuration resolved"
        );
        Ok(config)
    }

    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.service_name.clone(),
            collector_endpoint: self.params.collector_endpoint.clone(),
        }
    }
}

impl TriggerConfig {
    pub fn load(cli: &CliConfig, args: &TriggerArgs) -> Result<Self, ConfigError> {
        tracing::debug!("Loading trigger configuration");
        let file = FileConfig::discover(cli)?;
        Self::resolve(file, cli, args)
    }

    pub fn resolve(
        file: FileConfig,
        cli: &CliConfig,
        args: &TriggerArgs,
    ) -> Result<Self, ConfigError> {
        let trigger = file.trigger.unwrap_or_default();
        Ok(Self {
            state_machine_arn: required(
                "state_machine_arn",
                args.state_machine_arn.clone(),
                trigger.state_machine_arn,
            )?,
            trace_header: args.trace_header.clone().filter(|h| !h.is_empty()),
            event: args.event.clone(),
            retry: resolve_retry(args.max_attempts, args.base_delay_ms, file.retry)?,
            faults: resolve_faults(cli, file.faults)?,
            aws: resolve_aws(cli, file.aws),
        })
    }
}
