//! The tick orchestrator.
//!
//! One call to [`TickOrchestrator::step_phase`] runs one phase:
//!
//! 1. Plan the phase transition. A rejected event aborts the step.
//! 2. Advance every subscribed persona, in registration order, on a clone.
//!    A persona error aborts the step; nothing has been committed yet.
//! 3. Commit the transition and the advanced personas.
//! 4. Gate all proposed actions through the [`BudgetGate`] in order.
//! 5. On `Apply`, apply admitted actions to the kernel and drain its effects.
//! 6. Number and dispatch effects: persona effects, then gate effects, then
//!    kernel effects. One fulfillment record per effect.
//! 7. Append one [`TickFrame`] and stage solver results for the next
//!    `Decide`.
//!
//! The orchestrator is the single writer of the budget table, the frame log,
//! and the effect log. Every id and timestamp is derived from the injected
//! run id and clock.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use cadence_budget::{BudgetCap, BudgetGate};
use cadence_types::{
    Action, Artifact, Effect, EffectKind, EffectProposal, FrameId, FrameMeta, FulfillmentRecord,
    PersonaView, PhaseContext, PhaseDetail, PhaseDigest, RunId, SolverResult, TickFrame, TickPhase,
};

use crate::adapters::Adapters;
use crate::clock::Clock;
use crate::dispatch::EffectDispatcher;
use crate::kernel::{self, KernelEffect, SimulationKernel};
use crate::persona::{Persona, PersonaError, PersonaOutput, PersonaRegistry, PhaseEvent, RegistryError};
use crate::phase::{PhaseError, PhaseMachine};
use crate::solver::SolverMediator;

/// Default `produced_by` stamped on frames.
pub const DEFAULT_PRODUCER: &str = "cadence-orchestrator";

/// Errors that abort a step. Everything else is recorded in the frame log.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The phase machine rejected the event.
    #[error("phase error: {source}")]
    Phase {
        /// The underlying phase error.
        #[from]
        source: PhaseError,
    },

    /// A persona rejected the phase event.
    #[error("persona '{persona}' failed in phase {phase} on event '{event}': {source}")]
    Persona {
        /// Registered persona name.
        persona: String,
        /// Phase being entered.
        phase: TickPhase,
        /// Event name.
        event: String,
        /// The persona's error.
        source: PersonaError,
    },

    /// Persona registration failed.
    #[error("registry error: {source}")]
    Registry {
        /// The underlying registry error.
        #[from]
        source: RegistryError,
    },
}

/// Per-run orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// `produced_by` stamped on every frame.
    pub produced_by: String,
    /// Seed passed to the kernel on `Init`.
    pub seed: u64,
    /// Category caps applied on `Init`.
    pub caps: BTreeMap<String, u64>,
    /// Action kind to kernel action code.
    pub action_codes: BTreeMap<String, u32>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            produced_by: DEFAULT_PRODUCER.to_owned(),
            seed: 0,
            caps: BTreeMap::new(),
            action_codes: BTreeMap::new(),
        }
    }
}

/// What [`TickOrchestrator::step_phase`] returns.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// The phase that was entered.
    pub phase: TickPhase,
    /// The tick it belongs to.
    pub tick: u64,
    /// Admitted actions, in gate order.
    pub actions: Vec<Action>,
    /// Solver results produced during this step.
    pub solver_results: Vec<SolverResult>,
    /// Post-step view of every persona.
    pub persona_views: BTreeMap<String, PersonaView>,
}

/// A persona clone that advanced successfully, waiting for commit.
struct Advanced {
    position: usize,
    name: String,
    persona: Box<dyn Persona>,
    output: PersonaOutput,
}

/// Drives the phase cycle and everything hanging off it.
pub struct TickOrchestrator {
    run_id: RunId,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
    machine: PhaseMachine,
    personas: PersonaRegistry,
    gate: BudgetGate,
    kernel: Box<dyn SimulationKernel>,
    dispatcher: EffectDispatcher,
    frames: Vec<TickFrame>,
    effect_log: Vec<FulfillmentRecord>,
    staged_solver_results: Vec<SolverResult>,
    prior: PhaseDigest,
    /// Tick the effect index belongs to.
    effect_tick: u64,
    /// Next effect index within `effect_tick`.
    effect_index: u64,
}

impl core::fmt::Debug for TickOrchestrator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TickOrchestrator")
            .field("run_id", &self.run_id)
            .field("context", &self.machine.context())
            .field("personas", &self.personas)
            .field("frames", &self.frames.len())
            .finish_non_exhaustive()
    }
}

impl TickOrchestrator {
    /// Create an orchestrator for one run.
    pub fn new(
        run_id: RunId,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
        gate: BudgetGate,
        kernel: Box<dyn SimulationKernel>,
        adapters: Adapters,
    ) -> Self {
        let mediator = SolverMediator::new(run_id, Arc::clone(&clock));
        Self {
            run_id,
            machine: PhaseMachine::new(Arc::clone(&clock)),
            clock,
            config,
            personas: PersonaRegistry::new(),
            gate,
            kernel,
            dispatcher: EffectDispatcher::new(adapters, mediator),
            frames: Vec::new(),
            effect_log: Vec::new(),
            staged_solver_results: Vec::new(),
            prior: PhaseDigest::default(),
            effect_tick: 0,
            effect_index: 0,
        }
    }

    /// Register a persona. Registration order is invocation order.
    pub fn register_persona(
        &mut self,
        name: &str,
        persona: Box<dyn Persona>,
    ) -> Result<(), OrchestratorError> {
        self.personas.register(name, persona)?;
        debug!(persona = name, "persona registered");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    /// The run id.
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// The current phase context, or `None` before `init`.
    pub const fn context(&self) -> Option<&PhaseContext> {
        self.machine.context()
    }

    /// The frame log, in append order.
    pub fn frames(&self) -> &[TickFrame] {
        &self.frames
    }

    /// Every fulfillment record produced so far, in dispatch order.
    pub fn effect_log(&self) -> &[FulfillmentRecord] {
        &self.effect_log
    }

    /// Solver results waiting for the next `Decide`.
    pub fn staged_solver_results(&self) -> &[SolverResult] {
        &self.staged_solver_results
    }

    /// Current view of every persona.
    pub fn persona_views(&self) -> BTreeMap<String, PersonaView> {
        self.personas.views()
    }

    /// The persona registry.
    pub const fn personas(&self) -> &PersonaRegistry {
        &self.personas
    }

    /// Snapshot of the budget table.
    pub fn budget_snapshot(&self) -> Vec<BudgetCap> {
        self.gate.snapshot()
    }

    /// The budget gate, including its ledger.
    pub const fn gate(&self) -> &BudgetGate {
        &self.gate
    }

    /// The simulation kernel.
    pub fn kernel(&self) -> &dyn SimulationKernel {
        self.kernel.as_ref()
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Run one phase.
    ///
    /// Fails only when the phase machine rejects `event` or a persona
    /// rejects the phase event; in both cases nothing is committed.
    pub async fn step_phase(
        &mut self,
        event: &str,
        payload: Value,
    ) -> Result<StepOutcome, OrchestratorError> {
        let mut transition = self.machine.plan(event)?;
        let phase = transition.context.phase;
        let tick = transition.context.tick;

        let phase_event = PhaseEvent {
            phase,
            event: transition.event,
            tick,
            payload: payload.clone(),
            solver_results: if phase == TickPhase::Decide {
                self.staged_solver_results.clone()
            } else {
                Vec::new()
            },
            prior: self.prior.clone(),
            // Init personas see the table the step is about to install.
            budget: if phase == TickPhase::Init {
                self.gate.preview_caps(&self.config.caps)
            } else {
                self.gate.snapshot()
            },
        };

        let advanced = self.advance_personas(&phase_event)?;

        // Commit point: nothing below can fail the step.
        self.machine.commit(&mut transition);
        if phase == TickPhase::Decide {
            self.staged_solver_results.clear();
        }
        if tick != self.effect_tick {
            self.effect_tick = tick;
            self.effect_index = 0;
        }

        let mut actions = Vec::new();
        let mut artifacts: Vec<Artifact> = Vec::new();
        let mut effects: Vec<Effect> = Vec::new();
        for Advanced {
            position,
            name,
            persona,
            mut output,
        } in advanced
        {
            self.personas.replace(position, persona);
            actions.append(&mut output.actions);
            for mut artifact in output.artifacts.drain(..) {
                artifact.produced_by.clone_from(&name);
                artifacts.push(artifact);
            }
            for proposal in output.into_proposals() {
                effects.push(self.number(tick, proposal));
            }
        }

        let mut followups = Vec::new();
        if phase == TickPhase::Init {
            followups.extend(self.initialize());
        }

        let (admitted, gate_proposals) = self.gate_actions(actions);
        for proposal in gate_proposals {
            effects.push(self.number(tick, proposal));
        }
        for proposal in followups {
            effects.push(self.number(tick, proposal));
        }

        if phase == TickPhase::Apply {
            for proposal in self.apply_to_kernel(&admitted) {
                effects.push(self.number(tick, proposal));
            }
            for drained in kernel::drain_effects(self.kernel.as_mut()) {
                effects.push(self.number_kernel(tick, drained));
            }
        }

        let mut records = Vec::with_capacity(effects.len());
        let mut solver_results = Vec::new();
        for effect in &effects {
            let dispatched = self.dispatcher.dispatch(effect.clone()).await;
            solver_results.extend(dispatched.solver_result);
            records.push(dispatched.record);
        }
        self.staged_solver_results
            .extend(solver_results.iter().cloned());

        let sequence = u64::try_from(self.frames.len()).unwrap_or(u64::MAX);
        let frame = TickFrame {
            meta: FrameMeta {
                id: FrameId::derive(self.run_id, sequence),
                run_id: self.run_id,
                sequence,
                created_at: self.clock.now(),
                produced_by: self.config.produced_by.clone(),
            },
            tick,
            phase,
            phase_detail: PhaseDetail {
                event: transition.event.as_str().to_owned(),
                previous: transition.previous,
                context: transition.context,
                payload,
            },
            accepted_actions: admitted,
            emitted_effects: effects,
            fulfilled_effects: records,
            persona_views: self.personas.views(),
            persona_artifacts: (!artifacts.is_empty()).then_some(artifacts),
        };

        info!(
            tick,
            phase = %phase,
            actions = frame.accepted_actions.len(),
            effects = frame.emitted_effects.len(),
            solver_results = solver_results.len(),
            "phase step complete"
        );

        self.prior = PhaseDigest::from(&frame);
        self.effect_log.extend(frame.fulfilled_effects.iter().cloned());
        let outcome = StepOutcome {
            phase,
            tick,
            actions: frame.accepted_actions.clone(),
            solver_results,
            persona_views: frame.persona_views.clone(),
        };
        self.frames.push(frame);
        Ok(outcome)
    }

    /// Advance subscribed personas on clones, in registration order.
    fn advance_personas(&self, event: &PhaseEvent) -> Result<Vec<Advanced>, OrchestratorError> {
        let mut advanced = Vec::new();
        for (position, (name, persona)) in self.personas.iter().enumerate() {
            if !persona.subscribes_to(event.phase) {
                continue;
            }
            let mut candidate = persona.clone_box();
            let output = candidate.advance(event).map_err(|source| {
                warn!(
                    persona = name,
                    phase = %event.phase,
                    error = %source,
                    "persona rejected phase event"
                );
                OrchestratorError::Persona {
                    persona: name.to_owned(),
                    phase: event.phase,
                    event: event.event.as_str().to_owned(),
                    source,
                }
            })?;
            debug!(
                persona = name,
                actions = output.actions.len(),
                effects = output.effects.len(),
                "persona advanced"
            );
            advanced.push(Advanced {
                position,
                name: name.to_owned(),
                persona: candidate,
                output,
            });
        }
        Ok(advanced)
    }

    /// Re-seed the budget table and the kernel.
    fn initialize(&mut self) -> Vec<EffectProposal> {
        let mut proposals = Vec::new();
        self.staged_solver_results.clear();

        // Seed first: a kernel may reset its budgets on init.
        if let Err(err) = self.kernel.init(self.config.seed) {
            proposals.push(init_invalid(&format!("kernel init failed: {err}")));
        }
        let applied = self.gate.apply_caps(&self.config.caps);
        for (category, cap) in applied.applied {
            if let Err(err) = self.kernel.set_budget(category.0, cap) {
                proposals.push(init_invalid(&format!(
                    "kernel rejected budget for category {category}: {err}"
                )));
            }
        }
        info!(
            seed = self.config.seed,
            skipped_caps = applied.skipped.len(),
            "run initialized"
        );
        proposals
    }

    /// Run actions through the gate in order.
    fn gate_actions(&mut self, actions: Vec<Action>) -> (Vec<Action>, Vec<EffectProposal>) {
        let mut admitted = Vec::with_capacity(actions.len());
        let mut signals = Vec::new();
        for action in actions {
            let admission = self.gate.admit(&action);
            if let Some(signal) = admission.signal {
                signals.push(signal.to_proposal());
            }
            if admission.admitted {
                admitted.push(action);
            }
        }
        (admitted, signals)
    }

    /// Apply admitted actions to the kernel, in order. Failures become
    /// `action_rejected` proposals.
    fn apply_to_kernel(&mut self, admitted: &[Action]) -> Vec<EffectProposal> {
        let mut rejections = Vec::new();
        for action in admitted {
            let result = match self.config.action_codes.get(&action.kind) {
                Some(&code) => self
                    .kernel
                    .apply_action(code, action.value())
                    .map_err(|err| err.to_string()),
                None => Err(format!("no kernel code for action kind '{}'", action.kind)),
            };
            if let Err(reason) = result {
                warn!(
                    actor = %action.actor_id,
                    kind = %action.kind,
                    %reason,
                    "kernel rejected action"
                );
                rejections.push(
                    EffectProposal::new(EffectKind::ActionRejected)
                        .with_data("message", reason)
                        .with_data("actorId", action.actor_id.clone())
                        .with_data("actionKind", action.kind.clone()),
                );
            }
        }
        rejections
    }

    /// Number a proposal with the next per-tick index.
    fn number(&mut self, tick: u64, proposal: EffectProposal) -> Effect {
        let index = self.next_index();
        Effect::from_proposal(tick, index, proposal)
    }

    /// Number a drained kernel effect; its identity value is the numeric payload.
    fn number_kernel(&mut self, tick: u64, drained: KernelEffect) -> Effect {
        let index = self.next_index();
        let kind = kernel::effect_kind_for_code(drained.code);
        let proposal = EffectProposal::new(kind.clone())
            .with_data("message", format!("kernel {}: {}", kind.as_str(), drained.value))
            .with_data("code", drained.code)
            .with_data("value", drained.value);
        Effect::with_value(tick, index, &drained.value.to_string(), proposal)
    }

    fn next_index(&mut self) -> u64 {
        let index = self.effect_index;
        self.effect_index = self.effect_index.saturating_add(1);
        index
    }
}

fn init_invalid(message: &str) -> EffectProposal {
    EffectProposal::new(EffectKind::InitInvalid).with_data("message", message)
}
