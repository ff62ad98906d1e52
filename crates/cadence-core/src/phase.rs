//! The tick phase machine.
//!
//! Owns the current [`PhaseContext`] and a fixed transition table keyed by
//! `(current phase, event)`:
//!
//! ```text
//! (unstarted) --init--> Init --observe--> Observe --decide--> Decide
//!     --apply--> Apply --emit--> Emit --summarize--> Summarize
//!     --observe--> Observe (tick + 1)
//! ```
//!
//! Transitions are split into [`PhaseMachine::plan`] (pure) and
//! [`PhaseMachine::commit`], so a caller can validate the rest of a step
//! before making the new context current. The clock is read only on commit.

use std::sync::Arc;

use chrono::DateTime;
use tracing::debug;

use cadence_types::{PhaseContext, TickEvent, TickPhase};

use crate::clock::Clock;

/// Errors raised by the phase machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhaseError {
    /// No transition row matches the current phase and event.
    #[error("invalid transition from {from} on event '{event}'")]
    InvalidTransition {
        /// The current phase, or `unstarted`.
        from: String,
        /// The rejected event name.
        event: String,
    },

    /// The tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,
}

/// Legal transitions. `None` is the unstarted state.
const TRANSITIONS: [(Option<TickPhase>, TickEvent, TickPhase); 7] = [
    (None, TickEvent::Init, TickPhase::Init),
    (Some(TickPhase::Init), TickEvent::Observe, TickPhase::Observe),
    (Some(TickPhase::Observe), TickEvent::Decide, TickPhase::Decide),
    (Some(TickPhase::Decide), TickEvent::Apply, TickPhase::Apply),
    (Some(TickPhase::Apply), TickEvent::Emit, TickPhase::Emit),
    (Some(TickPhase::Emit), TickEvent::Summarize, TickPhase::Summarize),
    (Some(TickPhase::Summarize), TickEvent::Observe, TickPhase::Observe),
];

/// Look up the next phase for `(current, event)`.
pub fn next_phase(current: Option<TickPhase>, event: TickEvent) -> Option<TickPhase> {
    TRANSITIONS
        .iter()
        .find(|(from, on, _)| *from == current && *on == event)
        .map(|&(_, _, to)| to)
}

/// A validated, not yet committed, transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTransition {
    /// The parsed event.
    pub event: TickEvent,
    /// The context being replaced, if the machine had started.
    pub previous: Option<PhaseContext>,
    /// The context that becomes current on commit. `updated_at` holds the
    /// previous stamp (or the epoch) until commit stamps it from the clock.
    pub context: PhaseContext,
}

/// Tracks `(tick, phase)` and enforces the transition table.
pub struct PhaseMachine {
    context: Option<PhaseContext>,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for PhaseMachine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PhaseMachine")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl PhaseMachine {
    /// Create an unstarted machine.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            context: None,
            clock,
        }
    }

    /// The current context, or `None` before `init`.
    pub const fn context(&self) -> Option<&PhaseContext> {
        self.context.as_ref()
    }

    /// The current phase, or `None` before `init`.
    pub fn phase(&self) -> Option<TickPhase> {
        self.context.as_ref().map(|c| c.phase)
    }

    /// The current tick, or `None` before `init`.
    pub fn tick(&self) -> Option<u64> {
        self.context.as_ref().map(|c| c.tick)
    }

    /// Validate `event` against the table and build the next context.
    ///
    /// Does not change the machine and does not read the clock.
    pub fn plan(&self, event: &str) -> Result<PhaseTransition, PhaseError> {
        let current = self.phase();
        let invalid = || PhaseError::InvalidTransition {
            from: current.map_or_else(|| "unstarted".to_owned(), |p| p.to_string()),
            event: event.to_owned(),
        };

        let parsed: TickEvent = event.parse().map_err(|_unknown| invalid())?;
        let phase = next_phase(current, parsed).ok_or_else(invalid)?;

        let tick = match (&self.context, parsed) {
            (None, _) => 0,
            (Some(ctx), TickEvent::Observe) if ctx.phase == TickPhase::Summarize => {
                ctx.tick.checked_add(1).ok_or(PhaseError::TickOverflow)?
            }
            (Some(ctx), _) => ctx.tick,
        };

        let updated_at = self
            .context
            .as_ref()
            .map_or(DateTime::UNIX_EPOCH, |ctx| ctx.updated_at);
        Ok(PhaseTransition {
            event: parsed,
            previous: self.context.clone(),
            context: PhaseContext {
                tick,
                phase,
                last_event: parsed.as_str().to_owned(),
                updated_at,
            },
        })
    }

    /// Stamp a planned transition from the clock and make it current.
    pub fn commit(&mut self, transition: &mut PhaseTransition) {
        transition.context.updated_at = self.clock.now();
        debug!(
            tick = transition.context.tick,
            phase = %transition.context.phase,
            event = transition.event.as_str(),
            "phase transition"
        );
        self.context = Some(transition.context.clone());
    }

    /// Plan and commit in one call.
    pub fn advance(&mut self, event: &str) -> Result<PhaseTransition, PhaseError> {
        let mut transition = self.plan(event)?;
        self.commit(&mut transition);
        Ok(transition)
    }
}
