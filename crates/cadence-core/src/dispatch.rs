//! The effect dispatcher.
//!
//! Routes each [`Effect`] by kind to the matching adapter and returns exactly
//! one [`FulfillmentRecord`]. Dispatch never fails: a missing adapter or a
//! missing `sourceRef` is `deferred`, and an adapter error is `error` with
//! the adapter's message as the reason.
//!
//! | Kind | Requires | Missing |
//! |------|----------|---------|
//! | `log` | logger (info) | `missing_logger` |
//! | warning kinds, unknown kinds | logger (warn) | `missing_logger` |
//! | `need_external_fact` | `sourceRef`, then fact resolver | `missing_source_ref`, `missing_fact_resolver` |
//! | `solver_request` | solver | `missing_solver` |
//! | `telemetry` | telemetry sink | `missing_telemetry` |

use serde_json::{json, Value};
use tracing::debug;

use cadence_types::{
    Effect, EffectKind, FulfillmentRecord, FulfillmentStatus, SolverRequest, SolverRequestMeta,
    SolverResult, TelemetryRecord,
};

use crate::adapters::{Adapters, LogLevel};
use crate::solver::{SolverMediator, SOLVER_DEFERRED, SOLVER_ERROR};

/// Deferral reasons.
pub mod reasons {
    /// No logger, or the logger lacks the needed level.
    pub const MISSING_LOGGER: &str = "missing_logger";
    /// A fact request carried no `sourceRef`.
    pub const MISSING_SOURCE_REF: &str = "missing_source_ref";
    /// A fact request had a `sourceRef` but no resolver is wired.
    pub const MISSING_FACT_RESOLVER: &str = "missing_fact_resolver";
    /// No solver adapter.
    pub const MISSING_SOLVER: &str = "missing_solver";
    /// No telemetry adapter.
    pub const MISSING_TELEMETRY: &str = "missing_telemetry";
}

/// Result of dispatching one effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    /// The fulfillment record for the effect.
    pub record: FulfillmentRecord,
    /// Set when the effect was a solver request that reached the solver.
    pub solver_result: Option<SolverResult>,
}

impl Dispatched {
    const fn record(record: FulfillmentRecord) -> Self {
        Self {
            record,
            solver_result: None,
        }
    }
}

/// Routes effects to adapters.
#[derive(Debug, Clone)]
pub struct EffectDispatcher {
    adapters: Adapters,
    mediator: SolverMediator,
}

impl EffectDispatcher {
    /// Create a dispatcher.
    pub const fn new(adapters: Adapters, mediator: SolverMediator) -> Self {
        Self { adapters, mediator }
    }

    /// The wired adapters.
    pub const fn adapters(&self) -> &Adapters {
        &self.adapters
    }

    /// Dispatch one effect.
    pub async fn dispatch(&self, effect: Effect) -> Dispatched {
        let dispatched = match effect.kind.clone() {
            EffectKind::Log => {
                let level = log_level(&effect);
                let message = effect.message().unwrap_or("log").to_owned();
                Dispatched::record(self.write_log(effect, level, &message).await)
            }
            kind @ (EffectKind::InitInvalid
            | EffectKind::ActionRejected
            | EffectKind::LimitReached
            | EffectKind::LimitViolated) => {
                let message = effect.message().unwrap_or(kind.as_str()).to_owned();
                Dispatched::record(self.write_log(effect, LogLevel::Warn, &message).await)
            }
            EffectKind::Unknown(kind) => {
                let message = format!("unhandled effect kind: {kind}");
                Dispatched::record(self.write_log(effect, LogLevel::Warn, &message).await)
            }
            EffectKind::NeedExternalFact => Dispatched::record(self.resolve_fact(effect).await),
            EffectKind::SolverRequest => self.solve(effect).await,
            EffectKind::Telemetry => Dispatched::record(self.emit_telemetry(effect).await),
        };

        debug!(
            effect_id = %dispatched.record.effect.id,
            effect_kind = dispatched.record.effect.kind.as_str(),
            status = dispatched.record.status.as_str(),
            reason = dispatched.record.reason.as_deref(),
            "effect dispatched"
        );
        dispatched
    }

    async fn write_log(&self, effect: Effect, level: LogLevel, message: &str) -> FulfillmentRecord {
        let Some(logger) = self.adapters.logger.as_ref().filter(|l| l.supports(level)) else {
            return FulfillmentRecord::deferred(effect, reasons::MISSING_LOGGER);
        };
        match logger.write(level, message, &effect.data).await {
            Ok(()) => FulfillmentRecord::fulfilled(
                effect,
                json!({ "level": level.as_str(), "message": message }),
            ),
            Err(err) => FulfillmentRecord::error(effect, &err.to_string()),
        }
    }

    async fn resolve_fact(&self, effect: Effect) -> FulfillmentRecord {
        let Some(source) = effect.source_ref.clone() else {
            return FulfillmentRecord::deferred(effect, reasons::MISSING_SOURCE_REF);
        };
        let Some(facts) = self.adapters.facts.as_ref() else {
            return FulfillmentRecord::deferred(effect, reasons::MISSING_FACT_RESOLVER);
        };
        match facts.resolve(&source, &effect.data).await {
            Ok(value) => FulfillmentRecord::fulfilled(effect, value),
            Err(err) => FulfillmentRecord::error(effect, &err.to_string()),
        }
    }

    async fn solve(&self, effect: Effect) -> Dispatched {
        let Some(solver) = self.adapters.solver.as_ref() else {
            return Dispatched::record(FulfillmentRecord::deferred(effect, reasons::MISSING_SOLVER));
        };
        let request = solver_request(&effect);
        let result = self.mediator.solve(solver.as_ref(), &request).await;
        let record = match result.status {
            FulfillmentStatus::Fulfilled => FulfillmentRecord::fulfilled(
                effect,
                serde_json::to_value(&result).unwrap_or(Value::Null),
            ),
            FulfillmentStatus::Deferred => {
                FulfillmentRecord::deferred(effect, result.reason.as_deref().unwrap_or(SOLVER_DEFERRED))
            }
            FulfillmentStatus::Error => {
                FulfillmentRecord::error(effect, result.reason.as_deref().unwrap_or(SOLVER_ERROR))
            }
        };
        Dispatched {
            record,
            solver_result: Some(result),
        }
    }

    async fn emit_telemetry(&self, effect: Effect) -> FulfillmentRecord {
        let Some(telemetry) = self.adapters.telemetry.as_ref() else {
            return FulfillmentRecord::deferred(effect, reasons::MISSING_TELEMETRY);
        };
        let record = TelemetryRecord::from_effect(&effect);
        match telemetry.emit(&record).await {
            Ok(()) => FulfillmentRecord::fulfilled(effect, json!({ "name": record.name })),
            Err(err) => FulfillmentRecord::error(effect, &err.to_string()),
        }
    }
}

/// `log` effects may ask for a higher level through `data.level`.
fn log_level(effect: &Effect) -> LogLevel {
    match effect.data.get("level").and_then(Value::as_str) {
        Some("warn") => LogLevel::Warn,
        Some("error") => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

/// Build the solver request carried by a `solver_request` effect.
///
/// `requestId` and `requestedBy` fill the request metadata; `problem` is
/// passed through as-is.
fn solver_request(effect: &Effect) -> SolverRequest {
    let text = |key: &str| effect.data.get(key).and_then(Value::as_str).map(str::to_owned);
    SolverRequest {
        meta: SolverRequestMeta {
            id: text("requestId"),
            requested_by: text("requestedBy"),
        },
        problem: effect.data.get("problem").cloned().unwrap_or(Value::Null),
    }
}
