//! The budget gate: cap table and admission decisions.
//!
//! The gate owns the authoritative usage counters. Personas only ever see
//! read snapshots via [`BudgetGate::snapshot`]; nothing outside the gate
//! mutates usage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use cadence_types::{Action, EffectKind, EffectProposal, Fulfillment};

use crate::category::{CategoryId, CategoryRegistry};
use crate::ledger::{BudgetEntry, BudgetLedger};

// ---------------------------------------------------------------------------
// Cap table
// ---------------------------------------------------------------------------

/// Cap and usage for a single category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetCap {
    /// The category this row tracks.
    pub category_id: CategoryId,
    /// Category name, for logs and snapshots.
    pub category: String,
    /// Maximum admissions. `None` means uncapped.
    pub cap: Option<u64>,
    /// Number of actions examined against this category since the last
    /// `Init`, admitted or not.
    pub usage: u64,
}

/// Caps that were applied, and names that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedCaps {
    /// `(id, cap)` pairs in id order, for mirroring into the kernel.
    pub applied: Vec<(CategoryId, u64)>,
    /// Cap names that did not resolve to a known category.
    pub skipped: Vec<String>,
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// How an admission decision came out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionOutcome {
    /// The action has no budget category and is not tracked.
    Untracked,
    /// Admitted below the cap (or uncapped).
    Admitted,
    /// Admitted, and usage now equals the cap.
    Reached,
    /// Rejected; usage exceeds the cap.
    Violated,
}

/// A limit signal raised by an admission decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitSignal {
    /// `LimitReached` or `LimitViolated`.
    pub kind: EffectKind,
    /// The category that hit its cap.
    pub category_id: CategoryId,
    /// Category name.
    pub category: String,
    /// The configured cap.
    pub cap: u64,
    /// Usage after counting this action.
    pub usage: u64,
    /// The persona that proposed the action.
    pub actor_id: String,
    /// The action kind.
    pub action_kind: String,
}

impl LimitSignal {
    /// Convert the signal into a deterministic effect proposal.
    pub fn to_proposal(&self) -> EffectProposal {
        EffectProposal::new(self.kind.clone())
            .with_fulfillment(Fulfillment::Deterministic)
            .with_data("category", self.category.clone())
            .with_data("categoryId", self.category_id.0)
            .with_data("cap", self.cap)
            .with_data("usage", self.usage)
            .with_data("actorId", self.actor_id.clone())
            .with_data("actionKind", self.action_kind.clone())
    }
}

/// Result of [`BudgetGate::admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Whether the action may proceed.
    pub admitted: bool,
    /// Decision detail.
    pub outcome: AdmissionOutcome,
    /// Signal to surface as an effect, if the cap was met or exceeded.
    pub signal: Option<LimitSignal>,
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Admits or rejects budget-limited actions against per-category caps.
#[derive(Debug, Clone)]
pub struct BudgetGate {
    registry: CategoryRegistry,
    /// Action kind -> category name.
    routes: BTreeMap<String, String>,
    table: BTreeMap<CategoryId, BudgetCap>,
    ledger: BudgetLedger,
}

impl BudgetGate {
    /// Create a gate with every category uncapped and zero usage.
    pub fn new(registry: CategoryRegistry, routes: BTreeMap<String, String>) -> Self {
        let table = uncapped_table(&registry);
        Self {
            registry,
            routes,
            table,
            ledger: BudgetLedger::new(),
        }
    }

    /// The category registry.
    pub const fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    /// Replace the cap table, reset usage, and clear the ledger.
    ///
    /// Categories absent from `caps` become uncapped. Names that do not
    /// resolve are skipped and reported.
    pub fn apply_caps(&mut self, caps: &BTreeMap<String, u64>) -> AppliedCaps {
        let (table, result) = capped_table(&self.registry, caps);
        for name in &result.skipped {
            debug!(category = %name, "skipping cap for unknown budget category");
        }
        self.table = table;
        self.ledger = BudgetLedger::new();
        result
    }

    /// The table [`BudgetGate::apply_caps`] would install for `caps`, with
    /// zero usage. Does not touch the gate.
    pub fn preview_caps(&self, caps: &BTreeMap<String, u64>) -> Vec<BudgetCap> {
        capped_table(&self.registry, caps).0.into_values().collect()
    }

    /// Resolve the budget category of an action.
    ///
    /// An explicit `category` parameter wins over the kind route. Returns
    /// `None` for untracked actions and for names that do not resolve.
    pub fn category_of(&self, action: &Action) -> Option<CategoryId> {
        let name = action
            .category()
            .or_else(|| self.routes.get(&action.kind).map(String::as_str))?;
        self.registry.resolve(name)
    }

    /// Count an action against its category and decide admission.
    pub fn admit(&mut self, action: &Action) -> Admission {
        let Some(id) = self.category_of(action) else {
            return Admission {
                admitted: true,
                outcome: AdmissionOutcome::Untracked,
                signal: None,
            };
        };

        let Some(row) = self.table.get_mut(&id) else {
            return Admission {
                admitted: true,
                outcome: AdmissionOutcome::Untracked,
                signal: None,
            };
        };

        row.usage = row.usage.saturating_add(1);
        let usage = row.usage;

        let (outcome, signal_kind) = match row.cap {
            None => (AdmissionOutcome::Admitted, None),
            Some(cap) if usage < cap => (AdmissionOutcome::Admitted, None),
            Some(cap) if usage == cap => (AdmissionOutcome::Reached, Some(EffectKind::LimitReached)),
            Some(_) => (AdmissionOutcome::Violated, Some(EffectKind::LimitViolated)),
        };

        let signal = signal_kind.map(|kind| LimitSignal {
            kind,
            category_id: id,
            category: row.category.clone(),
            cap: row.cap.unwrap_or(0),
            usage,
            actor_id: action.actor_id.clone(),
            action_kind: action.kind.clone(),
        });

        let admitted = outcome != AdmissionOutcome::Violated;
        debug!(
            category = %row.category,
            usage,
            cap = ?row.cap,
            admitted,
            actor = %action.actor_id,
            kind = %action.kind,
            "budget admission"
        );

        self.ledger.record(BudgetEntry {
            tick: action.tick,
            category_id: id,
            actor_id: action.actor_id.clone(),
            action_kind: action.kind.clone(),
            usage_after: usage,
            outcome,
        });

        Admission {
            admitted,
            outcome,
            signal,
        }
    }

    /// Current usage of a category.
    pub fn usage(&self, id: CategoryId) -> u64 {
        self.table.get(&id).map_or(0, |row| row.usage)
    }

    /// Current cap of a category, if capped.
    pub fn cap(&self, id: CategoryId) -> Option<u64> {
        self.table.get(&id).and_then(|row| row.cap)
    }

    /// Read-only copy of the cap table in id order.
    pub fn snapshot(&self) -> Vec<BudgetCap> {
        self.table.values().cloned().collect()
    }

    /// The admission ledger.
    pub const fn ledger(&self) -> &BudgetLedger {
        &self.ledger
    }
}

fn capped_table(
    registry: &CategoryRegistry,
    caps: &BTreeMap<String, u64>,
) -> (BTreeMap<CategoryId, BudgetCap>, AppliedCaps) {
    let mut table = uncapped_table(registry);
    let mut result = AppliedCaps::default();
    for (name, &cap) in caps {
        let Some(id) = registry.resolve(name) else {
            result.skipped.push(name.clone());
            continue;
        };
        if let Some(row) = table.get_mut(&id) {
            row.cap = Some(cap);
        }
        result.applied.push((id, cap));
    }
    result.applied.sort_by_key(|&(id, _)| id);
    (table, result)
}

fn uncapped_table(registry: &CategoryRegistry) -> BTreeMap<CategoryId, BudgetCap> {
    registry
        .iter()
        .map(|(id, name)| {
            (
                id,
                BudgetCap {
                    category_id: id,
                    category: name.to_owned(),
                    cap: None,
                    usage: 0,
                },
            )
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ledger::ReconcileResult;

    fn gate() -> BudgetGate {
        let registry =
            CategoryRegistry::new(&["movement".to_owned(), "interaction".to_owned()]).unwrap();
        let mut routes = BTreeMap::new();
        routes.insert("move".to_owned(), "movement".to_owned());
        routes.insert("greet".to_owned(), "interaction".to_owned());
        BudgetGate::new(registry, routes)
    }

    fn caps(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
        pairs.iter().map(|&(n, c)| (n.to_owned(), c)).collect()
    }

    #[test]
    fn cap_of_two_admits_two_and_flags_third() {
        let mut gate = gate();
        gate.apply_caps(&caps(&[("movement", 2)]));
        let action = Action::new("actor", 1, "move");

        let first = gate.admit(&action);
        assert!(first.admitted);
        assert!(first.signal.is_none());

        let second = gate.admit(&action);
        assert!(second.admitted);
        assert_eq!(second.outcome, AdmissionOutcome::Reached);
        assert_eq!(second.signal.unwrap().kind, EffectKind::LimitReached);

        let third = gate.admit(&action);
        assert!(!third.admitted);
        assert_eq!(third.outcome, AdmissionOutcome::Violated);
        let signal = third.signal.unwrap();
        assert_eq!(signal.kind, EffectKind::LimitViolated);
        assert_eq!(signal.usage, 3);
        assert_eq!(signal.cap, 2);

        assert_eq!(gate.usage(CategoryId(0)), 3);
    }

    #[test]
    fn uncapped_categories_admit_everything() {
        let mut gate = gate();
        gate.apply_caps(&caps(&[("movement", 1)]));
        for _ in 0..5 {
            let admission = gate.admit(&Action::new("actor", 0, "greet"));
            assert!(admission.admitted);
            assert!(admission.signal.is_none());
        }
        assert_eq!(gate.usage(CategoryId(1)), 5);
        assert_eq!(gate.cap(CategoryId(1)), None);
    }

    #[test]
    fn actions_without_category_are_untracked() {
        let mut gate = gate();
        gate.apply_caps(&caps(&[("movement", 0)]));
        let admission = gate.admit(&Action::new("actor", 0, "wave"));
        assert!(admission.admitted);
        assert_eq!(admission.outcome, AdmissionOutcome::Untracked);
        assert!(gate.ledger().is_empty());
    }

    #[test]
    fn explicit_category_param_overrides_route() {
        let mut gate = gate();
        gate.apply_caps(&caps(&[("interaction", 1)]));
        let action = Action::new("actor", 0, "move").with_param("category", "interaction");
        assert_eq!(gate.category_of(&action), Some(CategoryId(1)));
        gate.admit(&action);
        assert_eq!(gate.usage(CategoryId(0)), 0);
        assert_eq!(gate.usage(CategoryId(1)), 1);
    }

    #[test]
    fn unknown_cap_names_are_skipped() {
        let mut gate = gate();
        let applied = gate.apply_caps(&caps(&[("movement", 3), ("teleport", 1)]));
        assert_eq!(applied.applied, vec![(CategoryId(0), 3)]);
        assert_eq!(applied.skipped, vec!["teleport".to_owned()]);
    }

    #[test]
    fn reapplying_caps_resets_usage() {
        let mut gate = gate();
        gate.apply_caps(&caps(&[("movement", 1)]));
        gate.admit(&Action::new("actor", 0, "move"));
        gate.admit(&Action::new("actor", 0, "move"));
        assert_eq!(gate.usage(CategoryId(0)), 2);

        gate.apply_caps(&caps(&[("movement", 1)]));
        assert_eq!(gate.usage(CategoryId(0)), 0);
        assert!(gate.admit(&Action::new("actor", 0, "move")).admitted);
    }

    #[test]
    fn zero_cap_rejects_first_action() {
        let mut gate = gate();
        gate.apply_caps(&caps(&[("movement", 0)]));
        let admission = gate.admit(&Action::new("actor", 0, "move"));
        assert!(!admission.admitted);
        assert_eq!(admission.outcome, AdmissionOutcome::Violated);
    }

    #[test]
    fn ledger_reconciles_with_table() {
        let mut gate = gate();
        gate.apply_caps(&caps(&[("movement", 2)]));
        for tick in 0..4 {
            gate.admit(&Action::new("actor", tick, "move"));
        }
        gate.admit(&Action::new("actor", 4, "greet"));
        assert_eq!(
            gate.ledger().reconcile(&gate.snapshot()),
            ReconcileResult::Balanced
        );
        assert_eq!(gate.ledger().violations().count(), 2);
    }

    #[test]
    fn signal_becomes_deterministic_proposal() {
        let mut gate = gate();
        gate.apply_caps(&caps(&[("movement", 1)]));
        let signal = gate
            .admit(&Action::new("actor", 0, "move"))
            .signal
            .unwrap();
        let proposal = signal.to_proposal();
        assert_eq!(proposal.kind, EffectKind::LimitReached);
        assert_eq!(proposal.fulfillment, Fulfillment::Deterministic);
        assert_eq!(proposal.data["category"], "movement");
        assert_eq!(proposal.data["usage"], 1);
    }

    #[test]
    fn preview_matches_applied_table_without_mutating() {
        let mut gate = gate();
        gate.admit(&Action::new("actor", 0, "move"));
        let preview = gate.preview_caps(&caps(&[("movement", 4), ("teleport", 1)]));
        assert_eq!(preview[0].cap, Some(4));
        assert_eq!(preview[0].usage, 0);
        assert_eq!(preview[1].cap, None);
        assert_eq!(gate.cap(CategoryId(0)), None);
        assert_eq!(gate.usage(CategoryId(0)), 1);

        gate.apply_caps(&caps(&[("movement", 4), ("teleport", 1)]));
        assert_eq!(gate.snapshot(), preview);
    }
}
