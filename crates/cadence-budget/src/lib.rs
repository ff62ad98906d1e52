//! Budget gate and admission ledger for the Cadence tick scheduler.
//!
//! Every budget-limited action passes through the [`BudgetGate`] before it
//! can reach the simulation kernel. The gate counts usage per category and
//! compares it to the category's cap:
//!
//! ```text
//! usage <  cap  -> admitted
//! usage == cap  -> admitted, emits limit_reached
//! usage >  cap  -> rejected, emits limit_violated
//! ```
//!
//! Usage is counted for every examined action, admitted or not, and only
//! resets when caps are re-applied at `Init`.
//!
//! # Modules
//!
//! - [`category`] -- Category names resolved to stable numeric ids.
//! - [`gate`] -- The [`BudgetGate`], cap table, and admission decisions.
//! - [`ledger`] -- Append-only record of every admission decision.
//!
//! # Usage
//!
//! ```
//! use std::collections::BTreeMap;
//! use cadence_budget::{BudgetGate, CategoryRegistry};
//! use cadence_types::Action;
//!
//! let registry = CategoryRegistry::new(&["movement".to_owned()]).ok().unwrap_or_default();
//! let mut routes = BTreeMap::new();
//! routes.insert("move".to_owned(), "movement".to_owned());
//! let mut gate = BudgetGate::new(registry, routes);
//!
//! let mut caps = BTreeMap::new();
//! caps.insert("movement".to_owned(), 1);
//! gate.apply_caps(&caps);
//!
//! assert!(gate.admit(&Action::new("actor", 0, "move")).admitted);
//! assert!(!gate.admit(&Action::new("actor", 0, "move")).admitted);
//! ```

pub mod category;
pub mod gate;
pub mod ledger;

pub use category::{CategoryId, CategoryRegistry, DEFAULT_CATEGORIES};
pub use gate::{Admission, AdmissionOutcome, AppliedCaps, BudgetCap, BudgetGate, LimitSignal};
pub use ledger::{BudgetEntry, BudgetLedger, ReconcileResult};

/// Errors that can occur when building budget structures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BudgetError {
    /// The same category name was listed twice.
    #[error("duplicate budget category: {0}")]
    DuplicateCategory(String),

    /// More categories than fit the numeric id space.
    #[error("too many budget categories: {count}")]
    TooManyCategories {
        /// Number of categories supplied.
        count: usize,
    },
}
