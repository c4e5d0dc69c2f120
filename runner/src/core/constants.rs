// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths, identifiers and tracer names)
pub const APP_NAME_LOWER: &str = "stagelink";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "stagelink.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "STAGELINK_CONFIG";

// =============================================================================
// Environment Variables - Logging
// =============================================================================

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "STAGELINK_LOG";

/// Environment variable selecting the log formatter (`compact` or `json`)
pub const ENV_LOG_FORMAT: &str = "STAGELINK_LOG_FORMAT";

// =============================================================================
// Environment Variables - Stage Invocation
// =============================================================================

pub const ENV_STAGE_NAME: &str = "STAGELINK_STAGE_NAME";
pub const ENV_ROOT_TRACE_ID: &str = "STAGELINK_ROOT_TRACE_ID";
pub const ENV_COLLECTOR_ENDPOINT: &str = "STAGELINK_COLLECTOR_ENDPOINT";
pub const ENV_SOURCE: &str = "STAGELINK_SOURCE";
pub const ENV_DESTINATION: &str = "STAGELINK_DESTINATION";
pub const ENV_SERVICE_NAME: &str = "STAGELINK_SERVICE_NAME";
pub const ENV_TRANSFORM: &str = "STAGELINK_TRANSFORM";
pub const ENV_LINKING_MODE: &str = "STAGELINK_LINKING_MODE";

// =============================================================================
// Environment Variables - Retry & Fault Injection
// =============================================================================

pub const ENV_RETRY_MAX_ATTEMPTS: &str = "STAGELINK_RETRY_MAX_ATTEMPTS";
pub const ENV_RETRY_BASE_DELAY_MS: &str = "STAGELINK_RETRY_BASE_DELAY_MS";

/// Fault injection mode (`off` or `random`). Never enable in production.
pub const ENV_FAULTS_MODE: &str = "STAGELINK_FAULTS";
pub const ENV_FAULTS_FAILURE_RATE: &str = "STAGELINK_FAULTS_FAILURE_RATE";

// =============================================================================
// Environment Variables - AWS
// =============================================================================

pub const ENV_AWS_REGION: &str = "STAGELINK_AWS_REGION";
pub const ENV_AWS_ENDPOINT_URL: &str = "STAGELINK_AWS_ENDPOINT_URL";
pub const ENV_XRAY_ENDPOINT_URL: &str = "STAGELINK_XRAY_ENDPOINT_URL";
pub const ENV_SFN_ENDPOINT_URL: &str = "STAGELINK_SFN_ENDPOINT_URL";

/// State machine started by the `trigger` command
pub const ENV_STATE_MACHINE_ARN: &str = "STAGELINK_STATE_MACHINE_ARN";

/// Trace header injected into function-as-a-service runtimes
pub const ENV_AMZN_TRACE_ID: &str = "_X_AMZN_TRACE_ID";

// =============================================================================
// Retry Defaults
// =============================================================================

/// Default attempt budget for every guarded I/O call
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff (1s, 2s, 4s, ...)
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

// =============================================================================
// Fault Injection Defaults
// =============================================================================

pub const DEFAULT_FAULTS_FAILURE_RATE: f64 = 0.3;
pub const DEFAULT_FAULTS_MIN_DELAY_MS: u64 = 1000;
pub const DEFAULT_FAULTS_MAX_DELAY_MS: u64 = 5000;

// =============================================================================
// Telemetry
// =============================================================================

/// Port of the OTLP/HTTP receiver when the endpoint is given as a bare host
pub const OTLP_HTTP_PORT: u16 = 4318;

/// Path of the OTLP/HTTP traces receiver
pub const OTLP_TRACES_PATH: &str = "/v1/traces";

/// Resource attribute identifying the batch job runtime
pub const CLOUD_PROVIDER_ATTR: &str = "cloud.provider";
pub const CLOUD_PROVIDER_VALUE: &str = "AWS::AWSGlue";

/// Carrier key used by the X-Ray propagation format
pub const XRAY_HEADER_KEY: &str = "X-Amzn-Trace-Id";

// =============================================================================
// Trace Linking
// =============================================================================

/// Segment origin recorded by the workflow orchestrator
pub const ORCHESTRATOR_ORIGIN: &str = "AWS::StepFunctions::StateMachine";

// =============================================================================
// Span Names
// =============================================================================

pub const SPAN_STAGE_EXECUTION: &str = "Stage Execution";
pub const SPAN_READ_SOURCE: &str = "Read Source Object";
pub const SPAN_DATA_PROCESSING: &str = "Data Processing";
pub const SPAN_WRITE_DESTINATION: &str = "Write Destination Object";
