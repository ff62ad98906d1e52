//! Engine binary for the Cadence tick scheduler.
//!
//! Wires configuration, the budget gate, the in-memory kernel, the default
//! adapters, and the persona roster into a [`TickOrchestrator`], runs
//! `Init` plus `run.max_ticks` ticks, and writes every frame to the
//! JSON-lines frame log.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `cadence-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the budget gate, kernel, and adapters
//! 4. Register the persona roster
//! 5. Run the ticks, writing frames as they are appended
//! 6. Log the run summary

mod error;
mod frame_log;

use std::path::Path;
use std::sync::Arc;

use cadence_core::adapters::{MemoryTelemetry, StubSolver, TracingLogger};
use cadence_core::runner::log_run_end;
use cadence_core::{
    Adapters, CadenceConfig, FrameCallback, InMemoryKernel, NoOpCallback, SystemClock,
    TickOrchestrator, run_ticks,
};
use cadence_types::RunId;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::frame_log::FrameLogCallback;

const CONFIG_PATH: &str = "cadence-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration, registration, or the run fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration before logging so `logging.level` can apply.
    let config = load_config()?;

    // 2. Initialize structured logging.
    let fallback = config.logging.level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_err| EnvFilter::new(fallback)),
        )
        .with_target(true)
        .init();

    info!(
        label = config.run.label,
        seed = config.run.seed,
        max_ticks = config.run.max_ticks,
        categories = config.budget.categories.len(),
        caps = config.budget.caps.len(),
        "cadence-engine starting"
    );

    // 3. Build the gate, kernel, and adapters.
    let run_id = RunId::generate();
    let gate = config.budget_gate().map_err(EngineError::from)?;
    let adapters = Adapters::none()
        .with_logger(Arc::new(TracingLogger))
        .with_telemetry(Arc::new(MemoryTelemetry::new()))
        .with_solver(Arc::new(StubSolver::fulfilled(json!({ "status": "stub" }))));
    let mut orchestrator = TickOrchestrator::new(
        run_id,
        Arc::new(SystemClock),
        config.orchestrator_config(),
        gate,
        Box::new(InMemoryKernel::new()),
        adapters,
    );

    // 4. Register personas.
    cadence_personas::register_all(&mut orchestrator, &config).map_err(EngineError::from)?;

    // 5. Run.
    let init_payload = serde_json::to_value(&config).map_err(EngineError::from)?;
    let summary = match config.logging.frame_log_path.as_deref() {
        Some(path) => {
            let mut callback = FrameLogCallback::create(Path::new(path))?;
            let summary = run(&mut orchestrator, init_payload, &config, &mut callback).await?;
            callback.flush();
            info!(
                path,
                written = callback.written(),
                failed = callback.failed(),
                "frame log closed"
            );
            summary
        }
        None => run(&mut orchestrator, init_payload, &config, &mut NoOpCallback).await?,
    };

    // 6. Log results.
    log_run_end(&summary);
    info!(run_id = %run_id, "cadence-engine shutdown complete");

    Ok(())
}

async fn run(
    orchestrator: &mut TickOrchestrator,
    init_payload: serde_json::Value,
    config: &CadenceConfig,
    callback: &mut dyn FrameCallback,
) -> Result<cadence_core::RunSummary, EngineError> {
    let summary = run_ticks(orchestrator, init_payload, config.run.max_ticks, callback).await?;
    Ok(summary)
}

/// Load configuration from `cadence-config.yaml` in the working directory.
fn load_config() -> Result<CadenceConfig, EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        let config = CadenceConfig::from_file(config_path)?;
        Ok(config)
    } else {
        let mut config = CadenceConfig::default();
        config.apply_env_overrides()?;
        Ok(config)
    }
}
