//! The external simulation kernel contract.
//!
//! The kernel is consumed through a flat numeric call surface only. The
//! orchestrator maps action kinds to numeric codes, applies admitted actions
//! one at a time, and drains the kernel's effect buffer after `Apply`.
//!
//! [`InMemoryKernel`] is a small reference kernel used by the engine binary
//! and the tests.

use std::collections::BTreeMap;

use tracing::warn;

use cadence_types::EffectKind;

/// Errors reported by a kernel call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// A call other than `init` arrived before `init`.
    #[error("kernel not initialized")]
    NotInitialized,

    /// The kernel does not know this action code.
    #[error("unknown action code {code}")]
    UnknownAction {
        /// The rejected code.
        code: u32,
    },

    /// The kernel refused the action.
    #[error("action {code} rejected: {reason}")]
    Rejected {
        /// The action code.
        code: u32,
        /// Why.
        reason: String,
    },

    /// An effect index past the end of the buffer.
    #[error("effect index {index} out of range")]
    EffectIndex {
        /// The requested index.
        index: usize,
    },

    /// No budget has been set for this category.
    #[error("unknown budget category {category}")]
    UnknownCategory {
        /// The category id.
        category: u32,
    },
}

/// Numeric effect codes reported by the kernel.
pub mod codes {
    /// `action_rejected`.
    pub const ACTION_REJECTED: u32 = 1;
    /// `limit_reached`.
    pub const LIMIT_REACHED: u32 = 2;
    /// `limit_violated`.
    pub const LIMIT_VIOLATED: u32 = 3;
    /// `init_invalid`.
    pub const INIT_INVALID: u32 = 4;
    /// `log`.
    pub const LOG: u32 = 5;
    /// `need_external_fact`.
    pub const NEED_EXTERNAL_FACT: u32 = 6;
}

/// Map a kernel effect code to an effect kind.
///
/// Unlisted codes become [`EffectKind::Unknown`] and take the warn path.
pub fn effect_kind_for_code(code: u32) -> EffectKind {
    match code {
        codes::ACTION_REJECTED => EffectKind::ActionRejected,
        codes::LIMIT_REACHED => EffectKind::LimitReached,
        codes::LIMIT_VIOLATED => EffectKind::LimitViolated,
        codes::INIT_INVALID => EffectKind::InitInvalid,
        codes::LOG => EffectKind::Log,
        codes::NEED_EXTERNAL_FACT => EffectKind::NeedExternalFact,
        other => EffectKind::Unknown(format!("kernel_effect_{other}")),
    }
}

/// The kernel call surface.
pub trait SimulationKernel: Send {
    /// Reset the kernel and seed it.
    fn init(&mut self, seed: u64) -> Result<(), KernelError>;

    /// Apply one action.
    fn apply_action(&mut self, kind: u32, value: i64) -> Result<(), KernelError>;

    /// Number of buffered effects.
    fn get_effect_count(&self) -> usize;

    /// Code of the `index`-th buffered effect.
    fn get_effect_kind(&self, index: usize) -> Result<u32, KernelError>;

    /// Value of the `index`-th buffered effect.
    fn get_effect_value(&self, index: usize) -> Result<i64, KernelError>;

    /// Empty the effect buffer.
    fn clear_effects(&mut self);

    /// Set a category's cap.
    fn set_budget(&mut self, category: u32, cap: u64) -> Result<(), KernelError>;

    /// A category's cap.
    fn get_budget(&self, category: u32) -> Result<u64, KernelError>;

    /// A category's usage as the kernel counts it.
    fn get_budget_usage(&self, category: u32) -> Result<u64, KernelError>;
}

/// One drained kernel effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelEffect {
    /// Numeric effect code.
    pub code: u32,
    /// Numeric payload.
    pub value: i64,
}

/// Read every buffered effect, then clear the buffer.
///
/// Entries the kernel fails to report are skipped with a warning.
pub fn drain_effects(kernel: &mut dyn SimulationKernel) -> Vec<KernelEffect> {
    let count = kernel.get_effect_count();
    let mut drained = Vec::with_capacity(count);
    for index in 0..count {
        match (kernel.get_effect_kind(index), kernel.get_effect_value(index)) {
            (Ok(code), Ok(value)) => drained.push(KernelEffect { code, value }),
            (Err(err), _) | (_, Err(err)) => {
                warn!(index, error = %err, "skipping unreadable kernel effect");
            }
        }
    }
    kernel.clear_effects();
    drained
}

// ---------------------------------------------------------------------------
// Reference kernel
// ---------------------------------------------------------------------------

/// In-process reference kernel.
///
/// Keeps a running total per action code and reports a `log` effect whose
/// value is the new total after every applied action. Negative values are
/// rejected. Actions whose code is mapped to a budget category count
/// towards that category's kernel-side usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryKernel {
    seed: Option<u64>,
    totals: BTreeMap<u32, i64>,
    applied: Vec<(u32, i64)>,
    effects: Vec<KernelEffect>,
    budgets: BTreeMap<u32, (u64, u64)>,
    known_codes: Option<Vec<u32>>,
    code_categories: BTreeMap<u32, u32>,
}

impl InMemoryKernel {
    /// A kernel that accepts every non-zero action code.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the kernel to `codes`.
    #[must_use]
    pub fn with_known_codes(mut self, codes: &[u32]) -> Self {
        self.known_codes = Some(codes.to_vec());
        self
    }

    /// Count actions with `code` against budget `category`.
    #[must_use]
    pub fn with_code_category(mut self, code: u32, category: u32) -> Self {
        self.code_categories.insert(code, category);
        self
    }

    /// The seed passed to the last `init`.
    pub const fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Every applied `(code, value)` since `init`, in order.
    pub fn applied(&self) -> &[(u32, i64)] {
        &self.applied
    }

    /// Running total for an action code.
    pub fn total(&self, code: u32) -> i64 {
        self.totals.get(&code).copied().unwrap_or(0)
    }

    fn effect(&self, index: usize) -> Result<KernelEffect, KernelError> {
        self.effects
            .get(index)
            .copied()
            .ok_or(KernelError::EffectIndex { index })
    }
}

impl SimulationKernel for InMemoryKernel {
    fn init(&mut self, seed: u64) -> Result<(), KernelError> {
        self.seed = Some(seed);
        self.totals.clear();
        self.applied.clear();
        self.effects.clear();
        for (_, usage) in self.budgets.values_mut() {
            *usage = 0;
        }
        Ok(())
    }

    fn apply_action(&mut self, kind: u32, value: i64) -> Result<(), KernelError> {
        if self.seed.is_none() {
            return Err(KernelError::NotInitialized);
        }
        let known = self
            .known_codes
            .as_ref()
            .map_or(kind != 0, |codes| codes.contains(&kind));
        if !known {
            return Err(KernelError::UnknownAction { code: kind });
        }
        if value < 0 {
            return Err(KernelError::Rejected {
                code: kind,
                reason: "negative value".to_owned(),
            });
        }

        let total = self.totals.entry(kind).or_insert(0);
        *total = total.saturating_add(value);
        let total = *total;
        self.applied.push((kind, value));
        self.effects.push(KernelEffect {
            code: codes::LOG,
            value: total,
        });

        if let Some(category) = self.code_categories.get(&kind) {
            if let Some((_, usage)) = self.budgets.get_mut(category) {
                *usage = usage.saturating_add(1);
            }
        }
        Ok(())
    }

    fn get_effect_count(&self) -> usize {
        self.effects.len()
    }

    fn get_effect_kind(&self, index: usize) -> Result<u32, KernelError> {
        self.effect(index).map(|e| e.code)
    }

    fn get_effect_value(&self, index: usize) -> Result<i64, KernelError> {
        self.effect(index).map(|e| e.value)
    }

    fn clear_effects(&mut self) {
        self.effects.clear();
    }

    fn set_budget(&mut self, category: u32, cap: u64) -> Result<(), KernelError> {
        let entry = self.budgets.entry(category).or_insert((cap, 0));
        entry.0 = cap;
        Ok(())
    }

    fn get_budget(&self, category: u32) -> Result<u64, KernelError> {
        self.budgets
            .get(&category)
            .map(|&(cap, _)| cap)
            .ok_or(KernelError::UnknownCategory { category })
    }

    fn get_budget_usage(&self, category: u32) -> Result<u64, KernelError> {
        self.budgets
            .get(&category)
            .map(|&(_, usage)| usage)
            .ok_or(KernelError::UnknownCategory { category })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn apply_before_init_fails() {
        let mut kernel = InMemoryKernel::new();
        assert_eq!(kernel.apply_action(1, 1), Err(KernelError::NotInitialized));
    }

    #[test]
    fn apply_accumulates_and_reports() {
        let mut kernel = InMemoryKernel::new();
        kernel.init(7).unwrap();
        kernel.apply_action(1, 2).unwrap();
        kernel.apply_action(1, 3).unwrap();
        assert_eq!(kernel.total(1), 5);
        assert_eq!(kernel.get_effect_count(), 2);
        assert_eq!(kernel.get_effect_kind(1).unwrap(), codes::LOG);
        assert_eq!(kernel.get_effect_value(1).unwrap(), 5);
        assert!(kernel.get_effect_kind(2).is_err());
    }

    #[test]
    fn unknown_and_negative_actions_are_rejected() {
        let mut kernel = InMemoryKernel::new().with_known_codes(&[1]);
        kernel.init(0).unwrap();
        assert_eq!(
            kernel.apply_action(2, 1),
            Err(KernelError::UnknownAction { code: 2 })
        );
        assert!(matches!(
            kernel.apply_action(1, -1),
            Err(KernelError::Rejected { code: 1, .. })
        ));
        assert!(kernel.applied().is_empty());
    }

    #[test]
    fn drain_reads_then_clears() {
        let mut kernel = InMemoryKernel::new();
        kernel.init(0).unwrap();
        kernel.apply_action(3, 4).unwrap();
        let drained = drain_effects(&mut kernel);
        assert_eq!(
            drained,
            vec![KernelEffect {
                code: codes::LOG,
                value: 4,
            }]
        );
        assert_eq!(kernel.get_effect_count(), 0);
    }

    #[test]
    fn budget_accessors_track_usage() {
        let mut kernel = InMemoryKernel::new().with_code_category(1, 0);
        kernel.set_budget(0, 2).unwrap();
        kernel.init(0).unwrap();
        kernel.apply_action(1, 1).unwrap();
        assert_eq!(kernel.get_budget(0).unwrap(), 2);
        assert_eq!(kernel.get_budget_usage(0).unwrap(), 1);
        assert_eq!(
            kernel.get_budget(9),
            Err(KernelError::UnknownCategory { category: 9 })
        );
    }

    #[test]
    fn unlisted_codes_map_to_unknown() {
        assert_eq!(effect_kind_for_code(codes::LIMIT_VIOLATED), EffectKind::LimitViolated);
        assert_eq!(
            effect_kind_for_code(42),
            EffectKind::Unknown("kernel_effect_42".to_owned())
        );
    }
}
