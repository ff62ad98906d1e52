//! The persona contract and registry.
//!
//! A persona is an independently-stated unit that reacts to a static set of
//! phases. The orchestrator only depends on the [`Persona`] trait; concrete
//! personas live in their own crate and keep their state as a closed enum.
//!
//! Cross-persona visibility is phase-delayed: a persona never sees another
//! persona's output from the phase it is running in, only the
//! [`PhaseDigest`] of the previous step.

use std::collections::BTreeMap;

use serde_json::Value;

use cadence_budget::BudgetCap;
use cadence_types::{
    Action, Artifact, EffectProposal, PersonaView, PhaseDigest, SolverResult, TelemetryRecord,
    TickEvent, TickPhase,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by a single persona.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersonaError {
    /// The persona's own transition table rejected the event.
    #[error("guard rejected event '{event}' in state '{state}'")]
    Guard {
        /// State the persona was in.
        state: String,
        /// Internal event that was rejected.
        event: String,
    },

    /// The persona was asked to handle a phase it does not subscribe to.
    #[error("not subscribed to phase {phase}")]
    NotSubscribed {
        /// The phase that was delivered.
        phase: TickPhase,
    },

    /// The phase payload could not be interpreted.
    #[error("invalid payload: {reason}")]
    InvalidPayload {
        /// What was wrong with it.
        reason: String,
    },
}

/// Errors raised when registering personas.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A persona with this name is already registered.
    #[error("persona already registered: {name}")]
    Duplicate {
        /// The duplicate name.
        name: String,
    },

    /// Persona names must be non-empty.
    #[error("persona name must not be empty")]
    EmptyName,
}

// ---------------------------------------------------------------------------
// Phase event and output
// ---------------------------------------------------------------------------

/// What a subscribed persona receives for one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseEvent {
    /// The phase being entered.
    pub phase: TickPhase,
    /// The event that entered it.
    pub event: TickEvent,
    /// Current tick.
    pub tick: u64,
    /// Caller-supplied payload for this step.
    pub payload: Value,
    /// Solver results staged since the last `Decide`. Empty in other phases.
    pub solver_results: Vec<SolverResult>,
    /// Output of the previous step.
    pub prior: PhaseDigest,
    /// Read-only snapshot of the budget table before this step. On `Init`
    /// this is the freshly capped table the step installs.
    pub budget: Vec<BudgetCap>,
}

impl PhaseEvent {
    /// A bare event with an empty digest, for tests and direct calls.
    pub fn new(phase: TickPhase, tick: u64) -> Self {
        Self {
            phase,
            event: phase_event(phase),
            tick,
            payload: Value::Null,
            solver_results: Vec::new(),
            prior: PhaseDigest::default(),
            budget: Vec::new(),
        }
    }

    /// Replace the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Replace the prior-step digest.
    #[must_use]
    pub fn with_prior(mut self, prior: PhaseDigest) -> Self {
        self.prior = prior;
        self
    }

    /// Replace the staged solver results.
    #[must_use]
    pub fn with_solver_results(mut self, results: Vec<SolverResult>) -> Self {
        self.solver_results = results;
        self
    }

    /// Replace the budget snapshot.
    #[must_use]
    pub fn with_budget(mut self, budget: Vec<BudgetCap>) -> Self {
        self.budget = budget;
        self
    }
}

/// The event that enters `phase`.
const fn phase_event(phase: TickPhase) -> TickEvent {
    match phase {
        TickPhase::Init => TickEvent::Init,
        TickPhase::Observe => TickEvent::Observe,
        TickPhase::Decide => TickEvent::Decide,
        TickPhase::Apply => TickEvent::Apply,
        TickPhase::Emit => TickEvent::Emit,
        TickPhase::Summarize => TickEvent::Summarize,
    }
}

/// Everything a persona proposes in one phase.
///
/// The persona's new state is read back through [`Persona::view`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonaOutput {
    /// Proposed actions, in the order they should be gated.
    pub actions: Vec<Action>,
    /// Proposed effects, in dispatch order.
    pub effects: Vec<EffectProposal>,
    /// Telemetry; dispatched as `telemetry` effects after `effects`.
    pub telemetry: Vec<TelemetryRecord>,
    /// Artifacts published this phase.
    pub artifacts: Vec<Artifact>,
}

impl PersonaOutput {
    /// An output that proposes nothing.
    pub const fn empty() -> Self {
        Self {
            actions: Vec::new(),
            effects: Vec::new(),
            telemetry: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    /// Append an action.
    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Append an effect proposal.
    #[must_use]
    pub fn with_effect(mut self, effect: EffectProposal) -> Self {
        self.effects.push(effect);
        self
    }

    /// Append a telemetry record.
    #[must_use]
    pub fn with_telemetry(mut self, record: TelemetryRecord) -> Self {
        self.telemetry.push(record);
        self
    }

    /// Append an artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Effect proposals followed by telemetry converted to effects.
    pub fn into_proposals(self) -> Vec<EffectProposal> {
        let mut proposals = self.effects;
        proposals.extend(self.telemetry.into_iter().map(TelemetryRecord::into_proposal));
        proposals
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A polymorphic, independently-stated participant in the tick cycle.
pub trait Persona: Send {
    /// The phases this persona reacts to. Static for the persona's lifetime.
    fn subscribe_phases(&self) -> &[TickPhase];

    /// Current state tag and context. Must not mutate.
    fn view(&self) -> PersonaView;

    /// React to a phase. The only mutating operation.
    fn advance(&mut self, event: &PhaseEvent) -> Result<PersonaOutput, PersonaError>;

    /// Clone into a new box. The orchestrator advances clones and only
    /// keeps them once the whole step has succeeded.
    fn clone_box(&self) -> Box<dyn Persona>;

    /// Whether this persona reacts to `phase`.
    fn subscribes_to(&self, phase: TickPhase) -> bool {
        self.subscribe_phases().contains(&phase)
    }
}

/// Advance `persona` if it subscribes to the event's phase.
///
/// Returns [`PersonaError::NotSubscribed`] otherwise, which is distinct from
/// a guard rejection.
pub fn advance_subscribed(
    persona: &mut dyn Persona,
    event: &PhaseEvent,
) -> Result<PersonaOutput, PersonaError> {
    if !persona.subscribes_to(event.phase) {
        return Err(PersonaError::NotSubscribed { phase: event.phase });
    }
    persona.advance(event)
}

/// Look up `(state, event)` in a persona guard table.
pub fn guard_transition<S, E>(table: &[(S, E, S)], state: S, event: &E) -> Option<S>
where
    S: Copy + PartialEq,
    E: PartialEq,
{
    table
        .iter()
        .find(|(from, on, _)| *from == state && on == event)
        .map(|&(_, _, to)| to)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Named personas in registration order.
#[derive(Default)]
pub struct PersonaRegistry {
    entries: Vec<(String, Box<dyn Persona>)>,
}

impl core::fmt::Debug for PersonaRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl PersonaRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a persona under `name`. Order of registration is the order
    /// of invocation within a phase.
    pub fn register(&mut self, name: &str, persona: Box<dyn Persona>) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.entries.iter().any(|(existing, _)| existing == name) {
            return Err(RegistryError::Duplicate {
                name: name.to_owned(),
            });
        }
        self.entries.push((name.to_owned(), persona));
        Ok(())
    }

    /// Number of registered personas.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no personas are registered.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Look up a persona by name.
    pub fn get(&self, name: &str) -> Option<&dyn Persona> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, persona)| persona.as_ref())
    }

    /// `(name, persona)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Persona)> {
        self.entries
            .iter()
            .map(|(name, persona)| (name.as_str(), persona.as_ref()))
    }

    /// Current view of every persona, keyed by name.
    pub fn views(&self) -> BTreeMap<String, PersonaView> {
        self.entries
            .iter()
            .map(|(name, persona)| (name.clone(), persona.view()))
            .collect()
    }

    /// Swap in an advanced persona at `position`.
    pub(crate) fn replace(&mut self, position: usize, persona: Box<dyn Persona>) {
        if let Some(slot) = self.entries.get_mut(position) {
            slot.1 = persona;
        }
    }
}
