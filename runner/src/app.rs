//! Application entry: logging, command dispatch, runtime and tracer lifetime

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use opentelemetry_sdk::trace::SdkTracer;

use crate::core::cli::{self, CliConfig, Commands, RunArgs, TriggerArgs};
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG, ENV_LOG_FORMAT};
use crate::core::{StageConfig, Telemetry, TriggerConfig};
use crate::data::objects::{ObjectLocation, RoutingObjectStore};
use crate::data::orchestrator::SfnOrchestrator;
use crate::data::traces::XrayTraceStore;
use crate::domain::stage::{Instrumentation, ResilientIo, StagePipeline, StageReport};
use crate::domain::transforms;
use crate::domain::trigger::Trigger;
use crate::utils::faults;
use crate::utils::retry::RetryPolicy;

pub struct StageApp;

impl StageApp {
    /// Parse the command line and run the selected command to completion
    pub fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Commands::Run(args) => Self::run_stage(&cli_config, &args),
            Commands::Trigger(args) => Self::run_trigger(&cli_config, &args),
        }
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        let json = std::env::var(ENV_LOG_FORMAT)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        // stdout carries the command result
        let builder = tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_writer(std::io::stderr)
            .with_env_filter(filter);

        if json {
            builder.json().init();
        } else {
            builder.with_ansi(true).compact().init();
        }
    }

    fn runtime() -> Result<tokio::runtime::Runtime> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to build async runtime")
    }

    /// Configuration is validated before the tracer exists, and the tracer is
    /// shut down only after the runtime has been dropped.
    fn run_stage(cli: &CliConfig, args: &RunArgs) -> Result<()> {
        let config = StageConfig::load(cli, args)?;
        let telemetry = Telemetry::init(&config.telemetry())?;

        let result = Self::runtime()?.block_on(Self::execute_stage(&config, telemetry.tracer()));

        if let Err(e) = telemetry.shutdown() {
            tracing::warn!(error = %e, "Telemetry shutdown failed");
        }

        let report = result?;
        println!("{}", serde_json::to_string(&report)?);
        Ok(())
    }

    async fn execute_stage(config: &StageConfig, tracer: SdkTracer) -> Result<StageReport> {
        let source =
            ObjectLocation::parse(&config.params.source).context("Invalid source location")?;
        let destination = ObjectLocation::parse(&config.params.destination)
            .context("Invalid destination location")?;

        let objects =
            Arc::new(RoutingObjectStore::for_locations(&config.aws, &[&source, &destination]).await);
        let traces = Arc::new(XrayTraceStore::new(&config.aws).await);
        let io = ResilientIo::new(
            RetryPolicy::from(config.retry),
            faults::from_config(&config.faults),
        );

        let pipeline = StagePipeline::new(traces, objects, Instrumentation::new(tracer), io)
            .with_linking_mode(config.linking_mode);
        let transform = transforms::from_kind(config.transform);

        tracing::info!(
            stage = %config.params.stage_name,
            transform = transform.name(),
            linking_mode = %config.linking_mode,
            "Stage starting"
        );

        let report = pipeline
            .run(&config.params, transform.as_ref())
            .await
            .with_context(|| format!("Stage {} failed", config.params.stage_name))?;
        Ok(report)
    }

    fn run_trigger(cli: &CliConfig, args: &TriggerArgs) -> Result<()> {
        let config = TriggerConfig::load(cli, args)?;

        let event = match &config.event {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read event file {}", path.display()))?,
            None => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read event from stdin")?;
                buf
            }
        };

        let execution_arn = Self::runtime()?.block_on(async {
            let orchestrator = Arc::new(SfnOrchestrator::new(&config.aws).await);
            let io = ResilientIo::new(
                RetryPolicy::from(config.retry),
                faults::from_config(&config.faults),
            );
            let trigger = Trigger::new(orchestrator, config.state_machine_arn.clone(), io);
            trigger
                .fire(&event, config.trace_header.as_deref())
                .await
                .context("Trigger failed")
        })?;

        println!("{execution_arn}");
        Ok(())
    }
}
