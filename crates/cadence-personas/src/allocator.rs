//! The allocator persona.
//!
//! Watches budget pressure. On `Emit` it counts the actions admitted and the
//! limit effects raised in the previous step (the `Apply` step). On
//! `Summarize` it reports the counts with the current usage table as a
//! `budget.tick` telemetry record and starts a fresh count.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use cadence_core::persona::{Persona, PersonaError, PersonaOutput, PhaseEvent};
use cadence_types::{EffectKind, PersonaView, TelemetryRecord, TickPhase};

use crate::guard::{self, StateTag};

/// Allocator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorState {
    /// Accumulating counts for the current tick.
    Counting,
    /// Counts reported for the current tick.
    Reporting,
}

impl StateTag for AllocatorState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Counting => "counting",
            Self::Reporting => "reporting",
        }
    }
}

const COUNT: &str = "count";
const REPORT: &str = "report";

const TRANSITIONS: [(AllocatorState, &str, AllocatorState); 4] = [
    (AllocatorState::Counting, COUNT, AllocatorState::Counting),
    (AllocatorState::Counting, REPORT, AllocatorState::Reporting),
    (AllocatorState::Reporting, COUNT, AllocatorState::Counting),
    (AllocatorState::Reporting, REPORT, AllocatorState::Reporting),
];

const PHASES: [TickPhase; 2] = [TickPhase::Emit, TickPhase::Summarize];

/// Telemetry record name.
pub const BUDGET_TELEMETRY: &str = "budget.tick";

/// Tallies admissions and limit signals per tick.
#[derive(Debug, Clone)]
pub struct Allocator {
    state: AllocatorState,
    context: BTreeMap<String, Value>,
    admitted: u64,
    reached: u64,
    violated: u64,
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator {
    /// A fresh allocator.
    pub const fn new() -> Self {
        Self {
            state: AllocatorState::Counting,
            context: BTreeMap::new(),
            admitted: 0,
            reached: 0,
            violated: 0,
        }
    }

    /// Current state.
    pub const fn state(&self) -> AllocatorState {
        self.state
    }

    fn count(&mut self, event: &PhaseEvent) {
        let admitted = u64::try_from(event.prior.accepted_actions.len()).unwrap_or(u64::MAX);
        self.admitted = self.admitted.saturating_add(admitted);
        for effect in &event.prior.effects {
            match effect.kind {
                EffectKind::LimitReached => self.reached = self.reached.saturating_add(1),
                EffectKind::LimitViolated => self.violated = self.violated.saturating_add(1),
                _ => {}
            }
        }
    }

    fn report(&mut self, event: &PhaseEvent) -> TelemetryRecord {
        let usage: BTreeMap<&str, Value> = event
            .budget
            .iter()
            .map(|row| (row.category.as_str(), json!({ "cap": row.cap, "usage": row.usage })))
            .collect();
        let record = TelemetryRecord::new(BUDGET_TELEMETRY, event.tick)
            .with_field("admitted", self.admitted)
            .with_field("limitReached", self.reached)
            .with_field("limitViolated", self.violated)
            .with_field("usage", json!(usage));
        self.admitted = 0;
        self.reached = 0;
        self.violated = 0;
        record
    }
}

impl Persona for Allocator {
    fn subscribe_phases(&self) -> &[TickPhase] {
        &PHASES
    }

    fn view(&self) -> PersonaView {
        guard::view(self.state, &self.context)
    }

    fn advance(&mut self, event: &PhaseEvent) -> Result<PersonaOutput, PersonaError> {
        let internal = match event.phase {
            TickPhase::Emit => COUNT,
            TickPhase::Summarize => REPORT,
            other => return Err(PersonaError::NotSubscribed { phase: other }),
        };
        self.state = guard::fire(&TRANSITIONS, self.state, internal)?;
        self.context
            .insert("lastEvent".to_owned(), Value::from(internal));

        if internal == COUNT {
            self.count(event);
            self.context
                .insert("admitted".to_owned(), Value::from(self.admitted));
            return Ok(PersonaOutput::empty());
        }
        let record = self.report(event);
        Ok(PersonaOutput::empty().with_telemetry(record))
    }

    fn clone_box(&self) -> Box<dyn Persona> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cadence_budget::{BudgetCap, CategoryId};
    use cadence_types::{Action, Effect, EffectProposal, PhaseDigest};

    use super::*;

    fn apply_digest() -> PhaseDigest {
        PhaseDigest {
            tick: 2,
            phase: Some(TickPhase::Apply),
            accepted_actions: vec![Action::new("a", 2, "move"), Action::new("a", 2, "greet")],
            effects: vec![
                Effect::from_proposal(2, 0, EffectProposal::new(EffectKind::LimitReached)),
                Effect::from_proposal(2, 1, EffectProposal::new(EffectKind::LimitViolated)),
                Effect::from_proposal(2, 2, EffectProposal::log("noise")),
            ],
            ..PhaseDigest::default()
        }
    }

    #[test]
    fn counts_on_emit_and_reports_on_summarize() {
        let mut allocator = Allocator::new();
        let emit = PhaseEvent::new(TickPhase::Emit, 2).with_prior(apply_digest());
        assert!(allocator.advance(&emit).unwrap().telemetry.is_empty());

        let summarize = PhaseEvent::new(TickPhase::Summarize, 2).with_budget(vec![BudgetCap {
            category_id: CategoryId(0),
            category: "movement".to_owned(),
            cap: Some(3),
            usage: 2,
        }]);
        let output = allocator.advance(&summarize).unwrap();
        let record = &output.telemetry[0];
        assert_eq!(record.name, BUDGET_TELEMETRY);
        assert_eq!(record.fields["admitted"], 2);
        assert_eq!(record.fields["limitReached"], 1);
        assert_eq!(record.fields["limitViolated"], 1);
        assert_eq!(record.fields["usage"]["movement"]["cap"], 3);
        assert_eq!(allocator.state(), AllocatorState::Reporting);
    }

    #[test]
    fn counts_reset_after_report() {
        let mut allocator = Allocator::new();
        allocator
            .advance(&PhaseEvent::new(TickPhase::Emit, 0).with_prior(apply_digest()))
            .unwrap();
        allocator.advance(&PhaseEvent::new(TickPhase::Summarize, 0)).unwrap();
        allocator.advance(&PhaseEvent::new(TickPhase::Emit, 1)).unwrap();
        let output = allocator.advance(&PhaseEvent::new(TickPhase::Summarize, 1)).unwrap();
        assert_eq!(output.telemetry[0].fields["admitted"], 0);
    }
}
