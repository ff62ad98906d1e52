//! Phase contexts, persona views, and the append-only tick frame record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::actions::{Action, Artifact, Effect, FulfillmentRecord};
use crate::enums::TickPhase;
use crate::ids::{FrameId, RunId};

/// The phase machine's current position.
///
/// Replaced, never mutated, on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PhaseContext {
    /// Current tick.
    pub tick: u64,
    /// Current phase.
    pub phase: TickPhase,
    /// Name of the event that produced this context.
    pub last_event: String,
    /// Injected-clock time of the transition.
    pub updated_at: DateTime<Utc>,
}

/// What a transition looked like, kept in the frame log.
///
/// This is the only place the previous [`PhaseContext`] survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PhaseDetail {
    /// Event name that drove the transition.
    pub event: String,
    /// Context before the transition (`None` for `Init`).
    pub previous: Option<PhaseContext>,
    /// Context after the transition.
    pub context: PhaseContext,
    /// Caller payload for the step.
    pub payload: Value,
}

/// Read-only snapshot of one persona.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PersonaView {
    /// The persona's state tag (from its own closed enumeration).
    pub state: String,
    /// Last applied event plus persona-specific fields.
    pub context: BTreeMap<String, Value>,
}

impl PersonaView {
    /// A view with an empty context.
    pub fn new(state: &str) -> Self {
        Self {
            state: state.to_owned(),
            context: BTreeMap::new(),
        }
    }

    /// Builder-style context insertion.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_owned(), value.into());
        self
    }
}

/// Provenance of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FrameMeta {
    /// Derived from `(run_id, sequence)`.
    pub id: FrameId,
    /// Run this frame belongs to.
    pub run_id: RunId,
    /// Position of the frame in the run's log (0-based).
    pub sequence: u64,
    /// Injected-clock time the frame was appended.
    pub created_at: DateTime<Utc>,
    /// Component that appended the frame.
    pub produced_by: String,
}

/// Immutable record of one orchestrator step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TickFrame {
    /// Provenance.
    pub meta: FrameMeta,
    /// Tick of the step.
    pub tick: u64,
    /// Phase of the step.
    pub phase: TickPhase,
    /// The transition that opened the step.
    pub phase_detail: PhaseDetail,
    /// Actions admitted by the budget gate, in admission order.
    pub accepted_actions: Vec<Action>,
    /// Every effect emitted during the step, in dispatch order.
    pub emitted_effects: Vec<Effect>,
    /// One record per emitted effect, in the same order.
    pub fulfilled_effects: Vec<FulfillmentRecord>,
    /// Post-step view of every registered persona.
    pub persona_views: BTreeMap<String, PersonaView>,
    /// Artifacts published during the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_artifacts: Option<Vec<Artifact>>,
}

/// What the previous step produced, delivered to personas in the next one.
///
/// Personas never see output from their own phase; this digest is the only
/// channel between them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhaseDigest {
    /// Tick of the previous step.
    pub tick: u64,
    /// Phase of the previous step, if there was one.
    pub phase: Option<TickPhase>,
    /// Actions admitted in the previous step.
    pub accepted_actions: Vec<Action>,
    /// Effects emitted in the previous step.
    pub effects: Vec<Effect>,
    /// Fulfillment records of the previous step.
    pub fulfillments: Vec<FulfillmentRecord>,
    /// Artifacts published in the previous step.
    pub artifacts: Vec<Artifact>,
}

impl From<&TickFrame> for PhaseDigest {
    fn from(frame: &TickFrame) -> Self {
        Self {
            tick: frame.tick,
            phase: Some(frame.phase),
            accepted_actions: frame.accepted_actions.clone(),
            effects: frame.emitted_effects.clone(),
            fulfillments: frame.fulfilled_effects.clone(),
            artifacts: frame.persona_artifacts.clone().unwrap_or_default(),
        }
    }
}
