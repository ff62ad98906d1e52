//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Run ids are fresh UUID v7 values (or injected by the caller). Frame and
//! effect ids are UUID v5 values *derived* from their inputs, so two runs fed
//! the same inputs produce the same ids.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Namespace for effect ids derived from `(tick, index, kind, value)`.
const EFFECT_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_3c2e_9b4d_4e0a_8c71_2d5f_0e9b_a413);

/// Namespace for frame ids derived from `(run_id, sequence)`.
const FRAME_NAMESPACE: Uuid = Uuid::from_u128(0x0c4e_71d2_5a38_4f96_b1e0_7d23_c6a9_58f2);

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identity of one orchestrator run. Injected at construction.
    RunId
}

define_id! {
    /// Identity of one appended [`TickFrame`](crate::TickFrame).
    FrameId
}

define_id! {
    /// Identity of one [`Effect`](crate::Effect).
    EffectId
}

impl RunId {
    /// Create a fresh run identifier using UUID v7 (time-ordered).
    ///
    /// Only the binary should call this; tests and replays inject a fixed id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// The all-zero run id.
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// A run id built from a fixed number, for reproducible runs.
    pub const fn fixed(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl FrameId {
    /// Derive the id of the `sequence`-th frame of a run.
    pub fn derive(run_id: RunId, sequence: u64) -> Self {
        let name = format!("{run_id}:{sequence}");
        Self(Uuid::new_v5(&FRAME_NAMESPACE, name.as_bytes()))
    }
}

impl EffectId {
    /// Derive an effect id from the tick, the per-tick index, the kind tag,
    /// and the effect's canonical value.
    pub fn derive(tick: u64, index: u64, kind: &str, value: &str) -> Self {
        let name = format!("{tick}:{index}:{kind}:{value}");
        Self(Uuid::new_v5(&EFFECT_NAMESPACE, name.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_ids_are_reproducible() {
        let a = EffectId::derive(3, 1, "log", "{\"message\":\"hi\"}");
        let b = EffectId::derive(3, 1, "log", "{\"message\":\"hi\"}");
        assert_eq!(a, b);
    }

    #[test]
    fn effect_ids_change_with_any_input() {
        let base = EffectId::derive(3, 1, "log", "x");
        assert_ne!(base, EffectId::derive(4, 1, "log", "x"));
        assert_ne!(base, EffectId::derive(3, 2, "log", "x"));
        assert_ne!(base, EffectId::derive(3, 1, "telemetry", "x"));
        assert_ne!(base, EffectId::derive(3, 1, "log", "y"));
    }

    #[test]
    fn frame_ids_depend_on_run_and_sequence() {
        let run = RunId::from(Uuid::nil());
        let other = RunId::from(Uuid::from_u128(7));
        assert_eq!(FrameId::derive(run, 0), FrameId::derive(run, 0));
        assert_ne!(FrameId::derive(run, 0), FrameId::derive(run, 1));
        assert_ne!(FrameId::derive(run, 0), FrameId::derive(other, 0));
    }

    #[test]
    fn id_display_matches_uuid() {
        let id = RunId::generate();
        assert_eq!(id.to_string(), id.into_inner().to_string());
    }
}
