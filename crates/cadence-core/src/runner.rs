//! Bounded run loop.
//!
//! [`run_ticks`] drives `Init` followed by a fixed number of full
//! `Observe..Summarize` cycles, invoking a [`FrameCallback`] after every
//! step. The first error from the orchestrator stops the run.

use serde_json::Value;
use tracing::info;

use cadence_types::{FulfillmentStatus, PhaseContext, RunId, TickEvent, TickFrame};

use crate::orchestrator::{OrchestratorError, StepOutcome, TickOrchestrator};

/// The events of one full tick, in order.
pub const CYCLE: [TickEvent; 5] = [
    TickEvent::Observe,
    TickEvent::Decide,
    TickEvent::Apply,
    TickEvent::Emit,
    TickEvent::Summarize,
];

/// Errors that can occur during a run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A step failed.
    #[error("step error: {source}")]
    Step {
        /// The underlying orchestrator error.
        #[from]
        source: OrchestratorError,
    },
}

/// Called after each successful step.
pub trait FrameCallback: Send {
    /// `frame` is the frame the step appended.
    fn on_step(&mut self, outcome: &StepOutcome, frame: &TickFrame);
}

/// A callback that does nothing.
pub struct NoOpCallback;

impl FrameCallback for NoOpCallback {
    fn on_step(&mut self, _outcome: &StepOutcome, _frame: &TickFrame) {}
}

/// Totals for a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// The run.
    pub run_id: RunId,
    /// Full ticks completed after `Init`.
    pub ticks_completed: u64,
    /// Frames appended.
    pub frames: usize,
    /// Actions admitted across all frames.
    pub admitted_actions: usize,
    /// Effects emitted across all frames.
    pub effects: usize,
    /// Effects recorded as `deferred`.
    pub deferred: usize,
    /// Effects recorded as `error`.
    pub errors: usize,
    /// Solver round-trips.
    pub solver_results: usize,
    /// Phase context at the end of the run.
    pub final_context: Option<PhaseContext>,
}

impl RunSummary {
    /// Summarise an orchestrator's logs.
    pub fn collect(orchestrator: &TickOrchestrator, ticks_completed: u64, solver_results: usize) -> Self {
        let frames = orchestrator.frames();
        let count = |status: FulfillmentStatus| {
            orchestrator
                .effect_log()
                .iter()
                .filter(|r| r.status == status)
                .count()
        };
        Self {
            run_id: orchestrator.run_id(),
            ticks_completed,
            frames: frames.len(),
            admitted_actions: frames.iter().map(|f| f.accepted_actions.len()).sum(),
            effects: frames.iter().map(|f| f.emitted_effects.len()).sum(),
            deferred: count(FulfillmentStatus::Deferred),
            errors: count(FulfillmentStatus::Error),
            solver_results,
            final_context: orchestrator.context().cloned(),
        }
    }
}

/// Run `Init` and then `ticks` full cycles.
///
/// `init_payload` is handed to personas subscribed to `Init`. Other phases
/// receive `Value::Null`.
pub async fn run_ticks(
    orchestrator: &mut TickOrchestrator,
    init_payload: Value,
    ticks: u64,
    callback: &mut dyn FrameCallback,
) -> Result<RunSummary, RunnerError> {
    info!(run_id = %orchestrator.run_id(), ticks, "run starting");

    let outcome = orchestrator
        .step_phase(TickEvent::Init.as_str(), init_payload)
        .await?;
    let mut solver_results = outcome.solver_results.len();
    notify(orchestrator, &outcome, callback);

    let mut completed: u64 = 0;
    while completed < ticks {
        for event in CYCLE {
            let outcome = orchestrator.step_phase(event.as_str(), Value::Null).await?;
            solver_results = solver_results.saturating_add(outcome.solver_results.len());
            notify(orchestrator, &outcome, callback);
        }
        completed = completed.saturating_add(1);
    }

    Ok(RunSummary::collect(orchestrator, completed, solver_results))
}

fn notify(orchestrator: &TickOrchestrator, outcome: &StepOutcome, callback: &mut dyn FrameCallback) {
    if let Some(frame) = orchestrator.frames().last() {
        callback.on_step(outcome, frame);
    }
}

/// Log the end of a run.
pub fn log_run_end(summary: &RunSummary) {
    info!(
        run_id = %summary.run_id,
        ticks = summary.ticks_completed,
        frames = summary.frames,
        admitted_actions = summary.admitted_actions,
        effects = summary.effects,
        deferred = summary.deferred,
        errors = summary.errors,
        solver_results = summary.solver_results,
        final_tick = summary.final_context.as_ref().map(|c| c.tick),
        "run ended"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::adapters::Adapters;
    use crate::clock::FixedClock;
    use crate::kernel::InMemoryKernel;
    use crate::orchestrator::OrchestratorConfig;
    use cadence_budget::{BudgetGate, CategoryRegistry};
    use cadence_types::TickPhase;

    struct Recorder {
        phases: Vec<TickPhase>,
    }

    impl FrameCallback for Recorder {
        fn on_step(&mut self, outcome: &StepOutcome, frame: &TickFrame) {
            assert_eq!(outcome.phase, frame.phase);
            self.phases.push(frame.phase);
        }
    }

    fn orchestrator() -> TickOrchestrator {
        TickOrchestrator::new(
            RunId::nil(),
            Arc::new(FixedClock::epoch()),
            OrchestratorConfig::default(),
            BudgetGate::new(CategoryRegistry::default(), BTreeMap::new()),
            Box::new(InMemoryKernel::new()),
            Adapters::none(),
        )
    }

    #[tokio::test]
    async fn runs_init_then_full_cycles() {
        let mut o = orchestrator();
        let mut recorder = Recorder { phases: Vec::new() };
        let summary = run_ticks(&mut o, Value::Null, 2, &mut recorder).await.unwrap();

        assert_eq!(summary.ticks_completed, 2);
        assert_eq!(summary.frames, 11);
        assert_eq!(recorder.phases.len(), 11);
        assert_eq!(recorder.phases[0], TickPhase::Init);
        assert_eq!(recorder.phases[10], TickPhase::Summarize);
        assert_eq!(summary.final_context.unwrap().tick, 1);
    }

    #[tokio::test]
    async fn zero_ticks_only_initializes() {
        let mut o = orchestrator();
        let summary = run_ticks(&mut o, Value::Null, 0, &mut NoOpCallback).await.unwrap();
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.ticks_completed, 0);
    }

    #[tokio::test]
    async fn second_run_on_same_orchestrator_fails_at_init() {
        let mut o = orchestrator();
        run_ticks(&mut o, Value::Null, 1, &mut NoOpCallback).await.unwrap();
        let err = run_ticks(&mut o, Value::Null, 1, &mut NoOpCallback).await.unwrap_err();
        assert!(matches!(err, RunnerError::Step { .. }));
    }
}
