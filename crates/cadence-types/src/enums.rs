//! Enumeration types shared across the Cadence workspace.
//!
//! Phases and events are closed sets. Effect kinds are closed as well, with an
//! explicit [`EffectKind::Unknown`] fallback so unrecognized kinds still flow
//! through the dispatcher's warn path.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Phases and events
// ---------------------------------------------------------------------------

/// One stage within a tick.
///
/// Variants are declared in cycle order, so the derived [`Ord`] is the
/// in-tick ordering. `Init` happens once per run, before the first cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TickPhase {
    /// One-time run setup: caps applied, kernel seeded.
    Init,
    /// Personas look at the world.
    Observe,
    /// Personas plan; staged solver results are delivered here.
    Decide,
    /// Admitted actions are applied to the simulation kernel.
    Apply,
    /// Personas publish side-effects about what was applied.
    Emit,
    /// End-of-tick bookkeeping.
    Summarize,
}

impl TickPhase {
    /// Every phase, in cycle order.
    pub const ALL: [Self; 6] = [
        Self::Init,
        Self::Observe,
        Self::Decide,
        Self::Apply,
        Self::Emit,
        Self::Summarize,
    ];

    /// The snake-case name of this phase.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Observe => "observe",
            Self::Decide => "decide",
            Self::Apply => "apply",
            Self::Emit => "emit",
            Self::Summarize => "summarize",
        }
    }
}

impl fmt::Display for TickPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named event that drives the phase machine.
///
/// Each event names the phase it moves into. Whether the move is legal
/// depends on the current phase and is decided by the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TickEvent {
    /// Start the run.
    Init,
    /// Open a tick (or the next tick after `Summarize`).
    Observe,
    /// Move to planning.
    Decide,
    /// Move to kernel application.
    Apply,
    /// Move to side-effect publication.
    Emit,
    /// Close the tick.
    Summarize,
}

impl TickEvent {
    /// Every event, in phase order.
    pub const ALL: [Self; 6] = [
        Self::Init,
        Self::Observe,
        Self::Decide,
        Self::Apply,
        Self::Emit,
        Self::Summarize,
    ];

    /// The snake-case name of this event.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Observe => "observe",
            Self::Decide => "decide",
            Self::Apply => "apply",
            Self::Emit => "emit",
            Self::Summarize => "summarize",
        }
    }

    /// The phase this event moves into when the transition is legal.
    pub const fn target(self) -> TickPhase {
        match self {
            Self::Init => TickPhase::Init,
            Self::Observe => TickPhase::Observe,
            Self::Decide => TickPhase::Decide,
            Self::Apply => TickPhase::Apply,
            Self::Emit => TickPhase::Emit,
            Self::Summarize => TickPhase::Summarize,
        }
    }
}

impl fmt::Display for TickEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an event name does not match any [`TickEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTickEvent {
    /// The name that failed to parse.
    pub name: String,
}

impl fmt::Display for UnknownTickEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tick event: {}", self.name)
    }
}

impl std::error::Error for UnknownTickEvent {}

impl FromStr for TickEvent {
    type Err = UnknownTickEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "observe" => Ok(Self::Observe),
            "decide" => Ok(Self::Decide),
            "apply" => Ok(Self::Apply),
            "emit" => Ok(Self::Emit),
            "summarize" => Ok(Self::Summarize),
            other => Err(UnknownTickEvent {
                name: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// The kind tag of an [`Effect`](crate::Effect).
///
/// Serialized as its snake-case string. Any string that is not a known kind
/// round-trips through [`EffectKind::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EffectKind {
    /// A log line for the logger adapter.
    Log,
    /// Run configuration failed validation at `Init`.
    InitInvalid,
    /// An action was refused (by the kernel or by moderation).
    ActionRejected,
    /// The last action that still fits a category cap was admitted.
    LimitReached,
    /// An action overflowed its category cap and was not admitted.
    LimitViolated,
    /// A fact must be fetched from an external source.
    NeedExternalFact,
    /// A problem for the solver adapter.
    SolverRequest,
    /// A telemetry record.
    Telemetry,
    /// Any other kind; routed through the warn path.
    Unknown(String),
}

impl EffectKind {
    /// The wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Log => "log",
            Self::InitInvalid => "init_invalid",
            Self::ActionRejected => "action_rejected",
            Self::LimitReached => "limit_reached",
            Self::LimitViolated => "limit_violated",
            Self::NeedExternalFact => "need_external_fact",
            Self::SolverRequest => "solver_request",
            Self::Telemetry => "telemetry",
            Self::Unknown(name) => name,
        }
    }

    /// Whether this kind is one of the warning kinds routed to `logger.warn`.
    pub const fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::InitInvalid | Self::ActionRejected | Self::LimitReached | Self::LimitViolated
        )
    }

    /// The fulfillment class an effect of this kind gets when the proposer
    /// does not choose one.
    pub const fn default_fulfillment(&self) -> Fulfillment {
        match self {
            Self::Log
            | Self::InitInvalid
            | Self::ActionRejected
            | Self::LimitReached
            | Self::LimitViolated => Fulfillment::Deterministic,
            Self::NeedExternalFact | Self::SolverRequest | Self::Telemetry | Self::Unknown(_) => {
                Fulfillment::BestEffort
            }
        }
    }
}

impl From<String> for EffectKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "log" => Self::Log,
            "init_invalid" => Self::InitInvalid,
            "action_rejected" => Self::ActionRejected,
            "limit_reached" => Self::LimitReached,
            "limit_violated" => Self::LimitViolated,
            "need_external_fact" => Self::NeedExternalFact,
            "solver_request" => Self::SolverRequest,
            "telemetry" => Self::Telemetry,
            _ => Self::Unknown(name),
        }
    }
}

impl From<&str> for EffectKind {
    fn from(name: &str) -> Self {
        Self::from(name.to_owned())
    }
}

impl From<EffectKind> for String {
    fn from(kind: EffectKind) -> Self {
        match kind {
            EffectKind::Unknown(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strictly an effect must be realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Fulfillment {
    /// Must be realized the same way on every replay.
    Deterministic,
    /// May be skipped or vary between replays.
    BestEffort,
}

/// Outcome of attempting to realize an effect or a solver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum FulfillmentStatus {
    /// The adapter realized the effect.
    Fulfilled,
    /// A required capability or datum was absent. Never retried.
    Deferred,
    /// The adapter failed.
    Error,
}

impl FulfillmentStatus {
    /// The snake-case name of this status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fulfilled => "fulfilled",
            Self::Deferred => "deferred",
            Self::Error => "error",
        }
    }
}
