//! The moderator persona.
//!
//! On `Emit` it reviews the actions admitted in the previous step and flags
//! every one whose kind is on its block list with an `action_rejected`
//! effect. The actions are already applied; the effect is the record.

use std::collections::BTreeMap;

use serde_json::Value;

use cadence_core::config::ModeratorConfig;
use cadence_core::persona::{Persona, PersonaError, PersonaOutput, PhaseEvent};
use cadence_types::{EffectKind, EffectProposal, PersonaView, TickPhase};

use crate::guard::{self, StateTag};

/// Moderator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeratorState {
    /// Nothing flagged in the last review.
    Watching,
    /// The last review flagged at least one action.
    Flagging,
}

impl StateTag for ModeratorState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Watching => "watching",
            Self::Flagging => "flagging",
        }
    }
}

const CLEAR: &str = "clear";
const FLAG: &str = "flag";

const TRANSITIONS: [(ModeratorState, &str, ModeratorState); 4] = [
    (ModeratorState::Watching, CLEAR, ModeratorState::Watching),
    (ModeratorState::Watching, FLAG, ModeratorState::Flagging),
    (ModeratorState::Flagging, CLEAR, ModeratorState::Watching),
    (ModeratorState::Flagging, FLAG, ModeratorState::Flagging),
];

const PHASES: [TickPhase; 1] = [TickPhase::Emit];

/// Flags admitted actions of blocked kinds.
#[derive(Debug, Clone)]
pub struct Moderator {
    state: ModeratorState,
    context: BTreeMap<String, Value>,
    blocked_kinds: Vec<String>,
    flagged: u64,
}

impl Moderator {
    /// Build from configuration.
    pub fn new(config: &ModeratorConfig) -> Self {
        Self {
            state: ModeratorState::Watching,
            context: BTreeMap::new(),
            blocked_kinds: config.blocked_kinds.clone(),
            flagged: 0,
        }
    }

    /// Current state.
    pub const fn state(&self) -> ModeratorState {
        self.state
    }
}

impl Persona for Moderator {
    fn subscribe_phases(&self) -> &[TickPhase] {
        &PHASES
    }

    fn view(&self) -> PersonaView {
        guard::view(self.state, &self.context)
    }

    fn advance(&mut self, event: &PhaseEvent) -> Result<PersonaOutput, PersonaError> {
        let offending: Vec<_> = event
            .prior
            .accepted_actions
            .iter()
            .filter(|action| self.blocked_kinds.contains(&action.kind))
            .collect();

        let internal = if offending.is_empty() { CLEAR } else { FLAG };
        self.state = guard::fire(&TRANSITIONS, self.state, internal)?;
        self.context
            .insert("lastEvent".to_owned(), Value::from(internal));

        let mut output = PersonaOutput::empty();
        for action in offending {
            self.flagged = self.flagged.saturating_add(1);
            output = output.with_effect(
                EffectProposal::new(EffectKind::ActionRejected)
                    .with_data(
                        "message",
                        format!("action kind '{}' is blocked by moderation", action.kind),
                    )
                    .with_data("actorId", action.actor_id.clone())
                    .with_data("actionKind", action.kind.clone())
                    .with_data("tick", action.tick),
            );
        }
        self.context
            .insert("flagged".to_owned(), Value::from(self.flagged));
        Ok(output)
    }

    fn clone_box(&self) -> Box<dyn Persona> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cadence_types::{Action, PhaseDigest};

    use super::*;

    fn emit_after(actions: Vec<Action>) -> PhaseEvent {
        PhaseEvent::new(TickPhase::Emit, 1).with_prior(PhaseDigest {
            tick: 1,
            phase: Some(TickPhase::Apply),
            accepted_actions: actions,
            ..PhaseDigest::default()
        })
    }

    #[test]
    fn flags_blocked_kinds_only() {
        let mut moderator = Moderator::new(&ModeratorConfig {
            blocked_kinds: vec!["spawn".to_owned()],
        });
        let output = moderator
            .advance(&emit_after(vec![
                Action::new("a", 1, "move"),
                Action::new("a", 1, "spawn"),
            ]))
            .unwrap();
        assert_eq!(output.effects.len(), 1);
        assert_eq!(output.effects[0].kind, EffectKind::ActionRejected);
        assert_eq!(output.effects[0].data["actionKind"], "spawn");
        assert_eq!(moderator.state(), ModeratorState::Flagging);
    }

    #[test]
    fn clean_step_returns_to_watching() {
        let mut moderator = Moderator::new(&ModeratorConfig {
            blocked_kinds: vec!["spawn".to_owned()],
        });
        moderator
            .advance(&emit_after(vec![Action::new("a", 1, "spawn")]))
            .unwrap();
        let output = moderator
            .advance(&emit_after(vec![Action::new("a", 2, "move")]))
            .unwrap();
        assert!(output.effects.is_empty());
        assert_eq!(moderator.state(), ModeratorState::Watching);
        assert_eq!(moderator.view().context["flagged"], 1);
    }
}
