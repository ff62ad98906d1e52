//! Append-only record of admission decisions.
//!
//! The ledger is an audit trail; the gate's cap table remains the source
//! of truth for usage. [`BudgetLedger::reconcile`] recomputes usage from the
//! entries and compares it to a table snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::CategoryId;
use crate::gate::{AdmissionOutcome, BudgetCap};

/// One admission decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetEntry {
    /// Tick of the examined action.
    pub tick: u64,
    /// Category charged.
    pub category_id: CategoryId,
    /// Proposing persona.
    pub actor_id: String,
    /// Action kind.
    pub action_kind: String,
    /// Category usage after counting this action.
    pub usage_after: u64,
    /// Decision.
    pub outcome: AdmissionOutcome,
}

/// Outcome of [`BudgetLedger::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileResult {
    /// Ledger and table agree for every category.
    Balanced,
    /// A category's recorded usage differs from the table.
    Drift {
        /// The drifting category.
        category_id: CategoryId,
        /// Usage recomputed from the ledger.
        ledger_usage: u64,
        /// Usage held in the table.
        table_usage: u64,
    },
}

/// Append-only list of [`BudgetEntry`] values since the last `Init`.
#[derive(Debug, Clone, Default)]
pub struct BudgetLedger {
    entries: Vec<BudgetEntry>,
}

impl BudgetLedger {
    /// Create an empty ledger.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry.
    pub fn record(&mut self, entry: BudgetEntry) {
        self.entries.push(entry);
    }

    /// Number of entries.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[BudgetEntry] {
        &self.entries
    }

    /// Entries for a single tick.
    pub fn entries_for_tick(&self, tick: u64) -> impl Iterator<Item = &BudgetEntry> {
        self.entries.iter().filter(move |e| e.tick == tick)
    }

    /// Entries whose action was rejected.
    pub fn violations(&self) -> impl Iterator<Item = &BudgetEntry> {
        self.entries
            .iter()
            .filter(|e| e.outcome == AdmissionOutcome::Violated)
    }

    /// Usage per category, recomputed from the entries.
    pub fn usage_by_category(&self) -> BTreeMap<CategoryId, u64> {
        let mut usage: BTreeMap<CategoryId, u64> = BTreeMap::new();
        for entry in &self.entries {
            let count = usage.entry(entry.category_id).or_insert(0);
            *count = count.saturating_add(1);
        }
        usage
    }

    /// Compare recomputed usage against a cap table snapshot.
    ///
    /// Only valid when the ledger and the table were reset together.
    pub fn reconcile(&self, table: &[BudgetCap]) -> ReconcileResult {
        let recorded = self.usage_by_category();
        for row in table {
            let ledger_usage = recorded.get(&row.category_id).copied().unwrap_or(0);
            if ledger_usage != row.usage {
                return ReconcileResult::Drift {
                    category_id: row.category_id,
                    ledger_usage,
                    table_usage: row.usage,
                };
            }
        }
        ReconcileResult::Balanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tick: u64, category: u32, outcome: AdmissionOutcome) -> BudgetEntry {
        BudgetEntry {
            tick,
            category_id: CategoryId(category),
            actor_id: "actor".to_owned(),
            action_kind: "move".to_owned(),
            usage_after: 0,
            outcome,
        }
    }

    #[test]
    fn queries_by_tick_and_outcome() {
        let mut ledger = BudgetLedger::new();
        ledger.record(entry(1, 0, AdmissionOutcome::Admitted));
        ledger.record(entry(1, 0, AdmissionOutcome::Violated));
        ledger.record(entry(2, 1, AdmissionOutcome::Reached));

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.entries_for_tick(1).count(), 2);
        assert_eq!(ledger.violations().count(), 1);
        let usage = ledger.usage_by_category();
        assert_eq!(usage.get(&CategoryId(0)), Some(&2));
        assert_eq!(usage.get(&CategoryId(1)), Some(&1));
    }

    #[test]
    fn reconcile_reports_drift() {
        let mut ledger = BudgetLedger::new();
        ledger.record(entry(0, 0, AdmissionOutcome::Admitted));
        let table = vec![BudgetCap {
            category_id: CategoryId(0),
            category: "movement".to_owned(),
            cap: Some(5),
            usage: 2,
        }];
        assert_eq!(
            ledger.reconcile(&table),
            ReconcileResult::Drift {
                category_id: CategoryId(0),
                ledger_usage: 1,
                table_usage: 2,
            }
        );
    }
}
