//! The actor persona.
//!
//! Proposes one action per configured kind on every `Apply`, each with a
//! seeded random `value`. With a round limit configured the actor becomes
//! exhausted after that many proposals and rests from then on.

use std::collections::BTreeMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use cadence_core::config::ActorConfig;
use cadence_core::persona::{Persona, PersonaError, PersonaOutput, PhaseEvent};
use cadence_types::{Action, PersonaView, TickPhase};

use crate::guard::{self, StateTag};

/// Actor states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Has not proposed yet.
    Idle,
    /// Proposed on the last `Apply`.
    Proposing,
    /// Out of rounds.
    Exhausted,
}

impl StateTag for ActorState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Proposing => "proposing",
            Self::Exhausted => "exhausted",
        }
    }
}

const PROPOSE: &str = "propose";
const TIRE: &str = "tire";
const REST: &str = "rest";

const TRANSITIONS: [(ActorState, &str, ActorState); 6] = [
    (ActorState::Idle, PROPOSE, ActorState::Proposing),
    (ActorState::Proposing, PROPOSE, ActorState::Proposing),
    (ActorState::Idle, TIRE, ActorState::Exhausted),
    (ActorState::Proposing, TIRE, ActorState::Exhausted),
    (ActorState::Exhausted, REST, ActorState::Exhausted),
    (ActorState::Idle, REST, ActorState::Idle),
];

const PHASES: [TickPhase; 1] = [TickPhase::Apply];

/// Payload key a caller can use to force the actor's internal event.
pub const EVENT_OVERRIDE: &str = "actor";

/// Proposes actions on `Apply`.
#[derive(Debug, Clone)]
pub struct Actor {
    name: String,
    state: ActorState,
    context: BTreeMap<String, Value>,
    proposals: Vec<String>,
    rounds: Option<u64>,
    max_value: i64,
    proposed_rounds: u64,
    rng: SmallRng,
}

impl Actor {
    /// Build an actor that signs its actions as `name`.
    pub fn new(name: &str, config: &ActorConfig, seed: u64) -> Self {
        Self {
            name: name.to_owned(),
            state: ActorState::Idle,
            context: BTreeMap::new(),
            proposals: config.proposals.clone(),
            rounds: config.rounds,
            max_value: config.max_value.max(1),
            proposed_rounds: 0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Current state.
    pub const fn state(&self) -> ActorState {
        self.state
    }

    /// Number of rounds proposed so far.
    pub const fn proposed_rounds(&self) -> u64 {
        self.proposed_rounds
    }

    fn exhausted_after_this(&self) -> bool {
        self.rounds
            .is_some_and(|limit| self.proposed_rounds.saturating_add(1) >= limit)
    }

    fn internal_event<'a>(&self, payload: &'a Value) -> &'a str {
        if let Some(forced) = payload.get(EVENT_OVERRIDE).and_then(Value::as_str) {
            return forced;
        }
        if self.state == ActorState::Exhausted || self.rounds == Some(0) {
            REST
        } else {
            PROPOSE
        }
    }
}

impl Persona for Actor {
    fn subscribe_phases(&self) -> &[TickPhase] {
        &PHASES
    }

    fn view(&self) -> PersonaView {
        guard::view(self.state, &self.context)
    }

    fn advance(&mut self, event: &PhaseEvent) -> Result<PersonaOutput, PersonaError> {
        let requested = self.internal_event(&event.payload);
        let internal = if requested == PROPOSE
            && self.state != ActorState::Exhausted
            && self.exhausted_after_this()
        {
            TIRE
        } else {
            requested
        };
        self.state = guard::fire(&TRANSITIONS, self.state, internal)?;
        self.context
            .insert("lastEvent".to_owned(), Value::from(internal));

        let mut output = PersonaOutput::empty();
        if internal == PROPOSE || internal == TIRE {
            self.proposed_rounds = self.proposed_rounds.saturating_add(1);
            for kind in &self.proposals {
                let value = self.rng.random_range(1..=self.max_value);
                output = output.with_action(
                    Action::new(&self.name, event.tick, kind).with_param("value", value),
                );
            }
            self.context
                .insert("rounds".to_owned(), Value::from(self.proposed_rounds));
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
    use serde_json::json;

    use super::*;

    fn config(rounds: Option<u64>) -> ActorConfig {
        ActorConfig {
            proposals: vec!["move".to_owned(), "greet".to_owned()],
            rounds,
            max_value: 5,
        }
    }

    fn apply(tick: u64) -> PhaseEvent {
        PhaseEvent::new(TickPhase::Apply, tick)
    }

    #[test]
    fn proposes_one_action_per_kind() {
        let mut actor = Actor::new("actor", &config(None), 7);
        let output = actor.advance(&apply(0)).unwrap();
        let kinds: Vec<&str> = output.actions.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(kinds, vec!["move", "greet"]);
        assert!(output.actions.iter().all(|a| (1..=5).contains(&a.value())));
        assert!(output.actions.iter().all(|a| a.actor_id == "actor"));
        assert_eq!(actor.state(), ActorState::Proposing);
    }

    #[test]
    fn same_seed_same_values() {
        let mut a = Actor::new("actor", &config(None), 99);
        let mut b = Actor::new("actor", &config(None), 99);
        for tick in 0..5 {
            assert_eq!(a.advance(&apply(tick)).unwrap(), b.advance(&apply(tick)).unwrap());
        }
    }

    #[test]
    fn exhausts_after_configured_rounds() {
        let mut actor = Actor::new("actor", &config(Some(2)), 1);
        assert_eq!(actor.advance(&apply(0)).unwrap().actions.len(), 2);
        assert_eq!(actor.advance(&apply(1)).unwrap().actions.len(), 2);
        assert_eq!(actor.state(), ActorState::Exhausted);
        assert!(actor.advance(&apply(2)).unwrap().actions.is_empty());
        assert_eq!(actor.proposed_rounds(), 2);
        assert_eq!(actor.view().context["lastEvent"], "rest");
    }

    #[test]
    fn forced_propose_while_exhausted_is_rejected() {
        let mut actor = Actor::new("actor", &config(Some(1)), 1);
        actor.advance(&apply(0)).unwrap();
        assert_eq!(actor.state(), ActorState::Exhausted);
        let forced = apply(1).with_payload(json!({ "actor": "propose" }));
        let err = actor.advance(&forced).unwrap_err();
        assert_eq!(
            err,
            PersonaError::Guard {
                state: "exhausted".to_owned(),
                event: "propose".to_owned(),
            }
        );
    }

    #[test]
    fn zero_rounds_never_proposes() {
        let mut actor = Actor::new("actor", &config(Some(0)), 1);
        assert!(actor.advance(&apply(0)).unwrap().actions.is_empty());
        assert_eq!(actor.state(), ActorState::Idle);
    }
}
