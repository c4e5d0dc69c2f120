//! Core application infrastructure

pub mod cli;
pub mod config;
pub mod constants;
pub mod telemetry;

pub use crate::app::StageApp;
pub use cli::{CliConfig, Commands, RunArgs, TriggerArgs};
pub use config::{
    AwsConfig, AwsService, ConfigError, FaultConfig, FaultMode, LinkingMode, RetryConfig,
    StageConfig, StageParams, TelemetryConfig, TransformKind, TriggerConfig,
};
pub use telemetry::{Telemetry, TelemetryError};
