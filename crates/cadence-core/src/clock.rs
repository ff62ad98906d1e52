//! Injected clocks.
//!
//! Every timestamp the orchestrator writes (phase contexts, frame metadata,
//! solver envelopes) is read from a [`Clock`] handed in at construction.
//! Nothing in the scheduling core reads wall time directly, so two runs with
//! the same clock produce the same frame log.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};

/// A source of timestamps.
pub trait Clock: Send + Sync {
    /// The current time according to this clock.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time. Only the engine binary uses this.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    instant: DateTime<Utc>,
}

impl FixedClock {
    /// Create a clock frozen at `instant`.
    pub const fn new(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }

    /// A clock frozen at the Unix epoch.
    pub const fn epoch() -> Self {
        Self {
            instant: DateTime::UNIX_EPOCH,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}

/// Advances by a fixed step on every read.
///
/// The n-th read (0-indexed) returns `start + n * step_millis`. Reads past
/// the representable range keep returning `start`.
#[derive(Debug)]
pub struct SteppingClock {
    start: DateTime<Utc>,
    step_millis: i64,
    reads: AtomicU64,
}

impl SteppingClock {
    /// Create a stepping clock.
    pub const fn new(start: DateTime<Utc>, step_millis: i64) -> Self {
        Self {
            start,
            step_millis,
            reads: AtomicU64::new(0),
        }
    }

    /// Number of reads so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let n = self.reads.fetch_add(1, Ordering::Relaxed);
        i64::try_from(n)
            .ok()
            .and_then(|n| n.checked_mul(self.step_millis))
            .and_then(TimeDelta::try_milliseconds)
            .and_then(|offset| self.start.checked_add_signed(offset))
            .unwrap_or(self.start)
    }
}
