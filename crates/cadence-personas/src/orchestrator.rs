//! The orchestrator persona.
//!
//! Subscribes to `Decide` only. Every `solve_every` ticks it asks the solver
//! for a plan; solver results staged by the kernel orchestrator arrive on the
//! next `Decide` and are tallied by status.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use cadence_core::config::OrchestratorPersonaConfig;
use cadence_core::persona::{Persona, PersonaError, PersonaOutput, PhaseEvent};
use cadence_types::{EffectKind, EffectProposal, PersonaView, TickPhase};

use crate::guard::{self, StateTag};

/// Orchestrator-persona states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// No request outstanding this tick.
    Waiting,
    /// A solver request went out this tick.
    Requesting,
}

impl StateTag for OrchestratorState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Requesting => "requesting",
        }
    }
}

const REQUEST: &str = "request";
const WAIT: &str = "wait";

const TRANSITIONS: [(OrchestratorState, &str, OrchestratorState); 4] = [
    (OrchestratorState::Waiting, REQUEST, OrchestratorState::Requesting),
    (OrchestratorState::Waiting, WAIT, OrchestratorState::Waiting),
    (OrchestratorState::Requesting, REQUEST, OrchestratorState::Requesting),
    (OrchestratorState::Requesting, WAIT, OrchestratorState::Waiting),
];

const PHASES: [TickPhase; 1] = [TickPhase::Decide];

/// Name the persona signs its solver requests with.
pub const REQUESTER: &str = "orchestrator";

/// Requests solver work on a fixed cadence.
#[derive(Debug, Clone)]
pub struct OrchestratorPersona {
    state: OrchestratorState,
    context: BTreeMap<String, Value>,
    solve_every: u64,
    requests: u64,
    results: BTreeMap<String, u64>,
}

impl OrchestratorPersona {
    /// Build from configuration.
    pub const fn new(config: &OrchestratorPersonaConfig) -> Self {
        Self {
            state: OrchestratorState::Waiting,
            context: BTreeMap::new(),
            solve_every: config.solve_every,
            requests: 0,
            results: BTreeMap::new(),
        }
    }

    /// Current state.
    pub const fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Received solver results, counted by status name.
    pub const fn results(&self) -> &BTreeMap<String, u64> {
        &self.results
    }

    fn due(&self, tick: u64) -> bool {
        tick.checked_rem(self.solve_every)
            .is_some_and(|remainder| remainder == 0)
    }
}

impl Persona for OrchestratorPersona {
    fn subscribe_phases(&self) -> &[TickPhase] {
        &PHASES
    }

    fn view(&self) -> PersonaView {
        guard::view(self.state, &self.context)
    }

    fn advance(&mut self, event: &PhaseEvent) -> Result<PersonaOutput, PersonaError> {
        for result in &event.solver_results {
            let count = self
                .results
                .entry(result.status.as_str().to_owned())
                .or_insert(0);
            *count = count.saturating_add(1);
        }

        let internal = if self.due(event.tick) { REQUEST } else { WAIT };
        self.state = guard::fire(&TRANSITIONS, self.state, internal)?;
        self.context
            .insert("lastEvent".to_owned(), Value::from(internal));
        self.context.insert("results".to_owned(), json!(self.results));

        let mut output = PersonaOutput::empty();
        if internal == REQUEST {
            self.requests = self.requests.saturating_add(1);
            self.context
                .insert("requests".to_owned(), Value::from(self.requests));
            output = output.with_effect(
                EffectProposal::new(EffectKind::SolverRequest)
                    .with_data("requestId", format!("solve:{}", event.tick))
                    .with_data("requestedBy", REQUESTER)
                    .with_data(
                        "problem",
                        json!({
                            "tick": event.tick,
                            "admittedLastStep": event.prior.accepted_actions.len(),
                            "resultsSoFar": self.results,
                        }),
                    ),
            );
        }
        Ok(output)
    }

    fn clone_box(&self) -> Box<dyn Persona> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::DateTime;

    use cadence_types::{FulfillmentStatus, RunId, SolverMeta, SolverResult};

    use super::*;

    fn persona(solve_every: u64) -> OrchestratorPersona {
        OrchestratorPersona::new(&OrchestratorPersonaConfig { solve_every })
    }

    fn result(status: FulfillmentStatus) -> SolverResult {
        SolverResult {
            status,
            meta: SolverMeta {
                id: "solve:0".to_owned(),
                run_id: RunId::nil(),
                created_at: DateTime::UNIX_EPOCH,
                produced_by: "test".to_owned(),
            },
            reason: None,
            solution: None,
        }
    }

    #[test]
    fn requests_on_cadence() {
        let mut p = persona(2);
        let ticks: Vec<bool> = (0..4)
            .map(|tick| {
                let out = p.advance(&PhaseEvent::new(TickPhase::Decide, tick)).unwrap();
                !out.effects.is_empty()
            })
            .collect();
        assert_eq!(ticks, vec![true, false, true, false]);
        assert_eq!(p.state(), OrchestratorState::Waiting);
    }

    #[test]
    fn request_carries_id_and_requester() {
        let mut p = persona(1);
        let out = p.advance(&PhaseEvent::new(TickPhase::Decide, 3)).unwrap();
        let effect = &out.effects[0];
        assert_eq!(effect.kind, EffectKind::SolverRequest);
        assert_eq!(effect.data["requestId"], "solve:3");
        assert_eq!(effect.data["requestedBy"], REQUESTER);
        assert_eq!(effect.data["problem"]["tick"], 3);
    }

    #[test]
    fn zero_cadence_never_requests() {
        let mut p = persona(0);
        for tick in 0..3 {
            let out = p.advance(&PhaseEvent::new(TickPhase::Decide, tick)).unwrap();
            assert!(out.effects.is_empty());
        }
    }

    #[test]
    fn tallies_staged_results() {
        let mut p = persona(0);
        let event = PhaseEvent::new(TickPhase::Decide, 1).with_solver_results(vec![
            result(FulfillmentStatus::Fulfilled),
            result(FulfillmentStatus::Deferred),
            result(FulfillmentStatus::Fulfilled),
        ]);
        p.advance(&event).unwrap();
        assert_eq!(p.results().get("fulfilled"), Some(&2));
        assert_eq!(p.results().get("deferred"), Some(&1));
        assert_eq!(p.view().context["results"]["fulfilled"], 2);
    }
}
