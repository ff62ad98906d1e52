//! The annotator persona.
//!
//! On `Apply` it asks for an external fact about every artifact published in
//! the previous step. On `Summarize` it logs how many it asked for this tick.

use std::collections::BTreeMap;

use serde_json::Value;

use cadence_core::persona::{Persona, PersonaError, PersonaOutput, PhaseEvent};
use cadence_types::{EffectKind, EffectProposal, PersonaView, TickPhase};

use crate::guard::{self, StateTag};

/// Annotator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotatorState {
    /// Between ticks.
    Quiet,
    /// Requests went out this tick.
    Annotating,
}

impl StateTag for AnnotatorState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Annotating => "annotating",
        }
    }
}

const ANNOTATE: &str = "annotate";
const SUMMARIZE: &str = "summarize";

const TRANSITIONS: [(AnnotatorState, &str, AnnotatorState); 4] = [
    (AnnotatorState::Quiet, ANNOTATE, AnnotatorState::Annotating),
    (AnnotatorState::Annotating, ANNOTATE, AnnotatorState::Annotating),
    (AnnotatorState::Annotating, SUMMARIZE, AnnotatorState::Quiet),
    (AnnotatorState::Quiet, SUMMARIZE, AnnotatorState::Quiet),
];

const PHASES: [TickPhase; 2] = [TickPhase::Apply, TickPhase::Summarize];

/// Requests facts about published artifacts.
#[derive(Debug, Clone)]
pub struct Annotator {
    state: AnnotatorState,
    context: BTreeMap<String, Value>,
    this_tick: u64,
    total: u64,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

impl Annotator {
    /// A quiet annotator.
    pub const fn new() -> Self {
        Self {
            state: AnnotatorState::Quiet,
            context: BTreeMap::new(),
            this_tick: 0,
            total: 0,
        }
    }

    /// Current state.
    pub const fn state(&self) -> AnnotatorState {
        self.state
    }
}

impl Persona for Annotator {
    fn subscribe_phases(&self) -> &[TickPhase] {
        &PHASES
    }

    fn view(&self) -> PersonaView {
        guard::view(self.state, &self.context)
    }

    fn advance(&mut self, event: &PhaseEvent) -> Result<PersonaOutput, PersonaError> {
        let internal = match event.phase {
            TickPhase::Apply => ANNOTATE,
            TickPhase::Summarize => SUMMARIZE,
            other => return Err(PersonaError::NotSubscribed { phase: other }),
        };
        self.state = guard::fire(&TRANSITIONS, self.state, internal)?;
        self.context
            .insert("lastEvent".to_owned(), Value::from(internal));

        let mut output = PersonaOutput::empty();
        if internal == ANNOTATE {
            for artifact in &event.prior.artifacts {
                self.this_tick = self.this_tick.saturating_add(1);
                output = output.with_effect(
                    EffectProposal::new(EffectKind::NeedExternalFact)
                        .with_data("kind", artifact.reference.kind.clone())
                        .with_source_ref(artifact.reference.clone()),
                );
            }
        } else {
            self.total = self.total.saturating_add(self.this_tick);
            output = output.with_effect(
                EffectProposal::log(&format!(
                    "tick {}: requested {} annotation(s)",
                    event.tick, self.this_tick
                ))
                .with_data("annotations", self.this_tick),
            );
            self.this_tick = 0;
            self.context
                .insert("annotations".to_owned(), Value::from(self.total));
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

    use cadence_types::{Artifact, ArtifactRef, PhaseDigest};

    use super::*;

    fn plan(tick: u64) -> Artifact {
        Artifact {
            reference: ArtifactRef::new("plan", &format!("plan:{tick}")),
            produced_by: "director".to_owned(),
            tick,
            body: json!({}),
        }
    }

    #[test]
    fn requests_a_fact_per_prior_artifact() {
        let mut annotator = Annotator::new();
        let apply = PhaseEvent::new(TickPhase::Apply, 4).with_prior(PhaseDigest {
            tick: 4,
            phase: Some(TickPhase::Decide),
            artifacts: vec![plan(4)],
            ..PhaseDigest::default()
        });
        let output = annotator.advance(&apply).unwrap();
        assert_eq!(output.effects.len(), 1);
        let effect = &output.effects[0];
        assert_eq!(effect.kind, EffectKind::NeedExternalFact);
        assert_eq!(effect.source_ref.as_ref().unwrap().id, "plan:4");
        assert_eq!(annotator.state(), AnnotatorState::Annotating);
    }

    #[test]
    fn summary_logs_the_tick_count() {
        let mut annotator = Annotator::new();
        let apply = PhaseEvent::new(TickPhase::Apply, 0).with_prior(PhaseDigest {
            artifacts: vec![plan(0), plan(0)],
            ..PhaseDigest::default()
        });
        annotator.advance(&apply).unwrap();
        let output = annotator.advance(&PhaseEvent::new(TickPhase::Summarize, 0)).unwrap();
        assert_eq!(output.effects[0].kind, EffectKind::Log);
        assert_eq!(output.effects[0].data["annotations"], 2);
        assert_eq!(annotator.state(), AnnotatorState::Quiet);

        let output = annotator.advance(&PhaseEvent::new(TickPhase::Summarize, 1)).unwrap();
        assert_eq!(output.effects[0].data["annotations"], 0);
        assert_eq!(annotator.view().context["annotations"], 2);
    }
}
