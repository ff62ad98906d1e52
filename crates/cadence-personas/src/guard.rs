//! Shared guard-table plumbing for the personas in this crate.
//!
//! Every persona keeps its state as a closed enum and a static table of
//! `(from, event, to)` rows. An event with no row for the current state is
//! a [`PersonaError::Guard`].

use std::collections::BTreeMap;

use serde_json::Value;

use cadence_core::persona::{PersonaError, guard_transition};
use cadence_types::PersonaView;

/// A persona state enum.
pub trait StateTag: Copy + PartialEq {
    /// Snake-case name used in views and errors.
    fn as_str(self) -> &'static str;
}

/// Fire `event` from `state`.
pub fn fire<'a, S: StateTag>(
    table: &[(S, &'a str, S)],
    state: S,
    event: &'a str,
) -> Result<S, PersonaError> {
    guard_transition(table, state, &event).ok_or_else(|| PersonaError::Guard {
        state: state.as_str().to_owned(),
        event: event.to_owned(),
    })
}

/// Build a view from a state and a context map.
pub fn view<S: StateTag>(state: S, context: &BTreeMap<String, Value>) -> PersonaView {
    PersonaView {
        state: state.as_str().to_owned(),
        context: context.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Light {
        Off,
        On,
    }

    impl StateTag for Light {
        fn as_str(self) -> &'static str {
            match self {
                Self::Off => "off",
                Self::On => "on",
            }
        }
    }

    const TABLE: [(Light, &str, Light); 2] = [
        (Light::Off, "switch_on", Light::On),
        (Light::On, "switch_off", Light::Off),
    ];

    #[test]
    fn fire_follows_table() {
        assert_eq!(fire(&TABLE, Light::Off, "switch_on").unwrap(), Light::On);
    }

    #[test]
    fn fire_rejects_missing_row() {
        let err = fire(&TABLE, Light::On, "switch_on").unwrap_err();
        assert_eq!(
            err,
            PersonaError::Guard {
                state: "on".to_owned(),
                event: "switch_on".to_owned(),
            }
        );
    }
}
