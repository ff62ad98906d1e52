//! The director persona.
//!
//! Drafts a plan on `Observe`, publishes it as a `plan:<tick>` artifact on
//! `Decide`, and rests on `Summarize`. The plan records how many actions
//! were admitted in the step before it was drafted.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use cadence_core::persona::{Persona, PersonaError, PersonaOutput, PhaseEvent};
use cadence_types::{Artifact, ArtifactRef, EffectProposal, PersonaView, TickPhase};

use crate::guard::{self, StateTag};

/// Director states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectorState {
    /// Before the first tick.
    Idle,
    /// A plan is being drafted.
    Drafting,
    /// The plan for this tick is out.
    Published,
    /// Tick closed.
    Resting,
}

impl StateTag for DirectorState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Drafting => "drafting",
            Self::Published => "published",
            Self::Resting => "resting",
        }
    }
}

const DRAFT: &str = "draft";
const PUBLISH: &str = "publish";
const REST: &str = "rest";

const TRANSITIONS: [(DirectorState, &str, DirectorState); 4] = [
    (DirectorState::Idle, DRAFT, DirectorState::Drafting),
    (DirectorState::Resting, DRAFT, DirectorState::Drafting),
    (DirectorState::Drafting, PUBLISH, DirectorState::Published),
    (DirectorState::Published, REST, DirectorState::Resting),
];

const PHASES: [TickPhase; 3] = [TickPhase::Observe, TickPhase::Decide, TickPhase::Summarize];

/// Kind tag of the artifacts the director publishes.
pub const PLAN_KIND: &str = "plan";

/// Plans each tick.
#[derive(Debug, Clone)]
pub struct Director {
    state: DirectorState,
    context: BTreeMap<String, Value>,
    observed_actions: usize,
}

impl Default for Director {
    fn default() -> Self {
        Self::new()
    }
}

impl Director {
    /// An idle director.
    pub const fn new() -> Self {
        Self {
            state: DirectorState::Idle,
            context: BTreeMap::new(),
            observed_actions: 0,
        }
    }

    /// Current state.
    pub const fn state(&self) -> DirectorState {
        self.state
    }
}

impl Persona for Director {
    fn subscribe_phases(&self) -> &[TickPhase] {
        &PHASES
    }

    fn view(&self) -> PersonaView {
        guard::view(self.state, &self.context)
    }

    fn advance(&mut self, event: &PhaseEvent) -> Result<PersonaOutput, PersonaError> {
        let internal = match event.phase {
            TickPhase::Observe => DRAFT,
            TickPhase::Decide => PUBLISH,
            TickPhase::Summarize => REST,
            other => return Err(PersonaError::NotSubscribed { phase: other }),
        };
        self.state = guard::fire(&TRANSITIONS, self.state, internal)?;
        self.context
            .insert("lastEvent".to_owned(), Value::from(internal));

        let mut output = PersonaOutput::empty();
        match internal {
            DRAFT => {
                self.observed_actions = event.prior.accepted_actions.len();
            }
            PUBLISH => {
                let id = format!("{PLAN_KIND}:{}", event.tick);
                output = output
                    .with_artifact(Artifact {
                        reference: ArtifactRef::new(PLAN_KIND, &id),
                        produced_by: "director".to_owned(),
                        tick: event.tick,
                        body: json!({
                            "tick": event.tick,
                            "observedActions": self.observed_actions,
                        }),
                    })
                    .with_effect(
                        EffectProposal::log(&format!("published {id}")).with_data("plan", id.clone()),
                    );
                self.context.insert("lastPlan".to_owned(), Value::from(id));
            }
            _ => {}
        }
        Ok(output)
    }

    fn clone_box(&self) -> Box<dyn Persona> {
        Box::new(self.clone())
    }
}
