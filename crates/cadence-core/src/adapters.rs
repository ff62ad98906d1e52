//! Pluggable effect adapters.
//!
//! Each adapter exposes one minimal capability. Adapters are optional: a
//! missing adapter is a normal condition that the dispatcher records as
//! `deferred`, never a configuration error.
//!
//! Adapter methods return boxed futures so the traits stay usable as
//! `dyn` objects behind an [`Arc`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use futures::future::{self, BoxFuture, FutureExt as _};
use serde_json::Value;
use tracing::{error, info, warn};

use cadence_types::{ArtifactRef, FulfillmentStatus, SolverRequest, SolverResponse, TelemetryRecord};

/// Error reported by an adapter call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    /// The adapter tried and failed.
    #[error("{message}")]
    Failed {
        /// Adapter-supplied message; becomes the fulfillment reason.
        message: String,
    },

    /// The adapter has no answer for this input.
    #[error("not found: {key}")]
    NotFound {
        /// The key that was looked up.
        key: String,
    },
}

impl AdapterError {
    /// Shorthand for [`AdapterError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Severity of a logger call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// `log`.
    Info,
    /// `warn`.
    Warn,
    /// `error`.
    Error,
}

impl LogLevel {
    /// Lower-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Writes log lines.
pub trait LoggerAdapter: Send + Sync {
    /// Whether this logger implements `level`. Defaults to every level.
    fn supports(&self, _level: LogLevel) -> bool {
        true
    }

    /// Write one line.
    fn write<'a>(
        &'a self,
        level: LogLevel,
        message: &'a str,
        data: &'a BTreeMap<String, Value>,
    ) -> BoxFuture<'a, Result<(), AdapterError>>;
}

/// Publishes telemetry records.
pub trait TelemetryAdapter: Send + Sync {
    /// Emit one record.
    fn emit<'a>(&'a self, record: &'a TelemetryRecord) -> BoxFuture<'a, Result<(), AdapterError>>;
}

/// Answers solver requests.
pub trait SolverAdapter: Send + Sync {
    /// Solve one request.
    fn solve<'a>(
        &'a self,
        request: &'a SolverRequest,
    ) -> BoxFuture<'a, Result<SolverResponse, AdapterError>>;
}

/// Resolves `need_external_fact` effects against their source artifact.
pub trait FactAdapter: Send + Sync {
    /// Resolve the fact described by `data` from `source`.
    fn resolve<'a>(
        &'a self,
        source: &'a ArtifactRef,
        data: &'a BTreeMap<String, Value>,
    ) -> BoxFuture<'a, Result<Value, AdapterError>>;
}

/// The set of adapters available to the dispatcher.
#[derive(Clone, Default)]
pub struct Adapters {
    /// Logger for `log` and warning-class effects.
    pub logger: Option<Arc<dyn LoggerAdapter>>,
    /// Telemetry sink.
    pub telemetry: Option<Arc<dyn TelemetryAdapter>>,
    /// Solver backend.
    pub solver: Option<Arc<dyn SolverAdapter>>,
    /// External fact resolver.
    pub facts: Option<Arc<dyn FactAdapter>>,
}

impl core::fmt::Debug for Adapters {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Adapters")
            .field("logger", &self.logger.is_some())
            .field("telemetry", &self.telemetry.is_some())
            .field("solver", &self.solver.is_some())
            .field("facts", &self.facts.is_some())
            .finish()
    }
}

impl Adapters {
    /// No adapters at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Set the logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn LoggerAdapter>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the telemetry sink.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetryAdapter>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Set the solver.
    #[must_use]
    pub fn with_solver(mut self, solver: Arc<dyn SolverAdapter>) -> Self {
        self.solver = Some(solver);
        self
    }

    /// Set the fact resolver.
    #[must_use]
    pub fn with_facts(mut self, facts: Arc<dyn FactAdapter>) -> Self {
        self.facts = Some(facts);
        self
    }
}

// ---------------------------------------------------------------------------
// Built-in adapters
// ---------------------------------------------------------------------------

/// Logger that forwards to `tracing` under the `cadence::effects` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl LoggerAdapter for TracingLogger {
    fn write<'a>(
        &'a self,
        level: LogLevel,
        message: &'a str,
        data: &'a BTreeMap<String, Value>,
    ) -> BoxFuture<'a, Result<(), AdapterError>> {
        let data = serde_json::to_string(data).unwrap_or_default();
        match level {
            LogLevel::Info => info!(target: "cadence::effects", %data, "{message}"),
            LogLevel::Warn => warn!(target: "cadence::effects", %data, "{message}"),
            LogLevel::Error => error!(target: "cadence::effects", %data, "{message}"),
        }
        future::ready(Ok(())).boxed()
    }
}

/// One line captured by [`MemoryLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Severity.
    pub level: LogLevel,
    /// Message.
    pub message: String,
}

/// Logger that keeps lines in memory. Can be limited to some levels.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    levels: Option<Vec<LogLevel>>,
    lines: Mutex<Vec<LogLine>>,
}

impl MemoryLogger {
    /// A logger supporting every level.
    pub fn new() -> Self {
        Self::default()
    }

    /// A logger supporting only `levels`.
    pub fn with_levels(levels: &[LogLevel]) -> Self {
        Self {
            levels: Some(levels.to_vec()),
            lines: Mutex::new(Vec::new()),
        }
    }

    /// Lines captured so far.
    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl LoggerAdapter for MemoryLogger {
    fn supports(&self, level: LogLevel) -> bool {
        self.levels.as_ref().is_none_or(|levels| levels.contains(&level))
    }

    fn write<'a>(
        &'a self,
        level: LogLevel,
        message: &'a str,
        _data: &'a BTreeMap<String, Value>,
    ) -> BoxFuture<'a, Result<(), AdapterError>> {
        let result = self
            .lines
            .lock()
            .map(|mut lines| {
                lines.push(LogLine {
                    level,
                    message: message.to_owned(),
                });
            })
            .map_err(|poisoned| AdapterError::failed(poisoned.to_string()));
        future::ready(result).boxed()
    }
}

/// Telemetry sink that keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl MemoryTelemetry {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far.
    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl TelemetryAdapter for MemoryTelemetry {
    fn emit<'a>(&'a self, record: &'a TelemetryRecord) -> BoxFuture<'a, Result<(), AdapterError>> {
        let result = self
            .records
            .lock()
            .map(|mut records| records.push(record.clone()))
            .map_err(|poisoned| AdapterError::failed(poisoned.to_string()));
        future::ready(result).boxed()
    }
}

/// Solver that answers every request the same way.
#[derive(Debug, Clone)]
pub struct StubSolver {
    outcome: Result<SolverResponse, AdapterError>,
}

impl StubSolver {
    /// Fulfil every request with `solution`.
    pub fn fulfilled(solution: Value) -> Self {
        Self {
            outcome: Ok(SolverResponse {
                status: Some(FulfillmentStatus::Fulfilled),
                reason: None,
                solution: Some(solution),
            }),
        }
    }

    /// Answer every request with a bare response carrying no status.
    pub fn silent() -> Self {
        Self {
            outcome: Ok(SolverResponse::default()),
        }
    }

    /// Defer every request, optionally with a reason.
    pub fn deferred(reason: Option<&str>) -> Self {
        Self {
            outcome: Ok(SolverResponse {
                status: Some(FulfillmentStatus::Deferred),
                reason: reason.map(str::to_owned),
                solution: None,
            }),
        }
    }

    /// Answer every request with an `error` status, optionally with a reason.
    pub fn rejecting(reason: Option<&str>) -> Self {
        Self {
            outcome: Ok(SolverResponse {
                status: Some(FulfillmentStatus::Error),
                reason: reason.map(str::to_owned),
                solution: None,
            }),
        }
    }

    /// Fail every request with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(AdapterError::failed(message)),
        }
    }
}

impl SolverAdapter for StubSolver {
    fn solve<'a>(
        &'a self,
        _request: &'a SolverRequest,
    ) -> BoxFuture<'a, Result<SolverResponse, AdapterError>> {
        future::ready(self.outcome.clone()).boxed()
    }
}

/// Fact resolver backed by a fixed map from artifact id to value.
#[derive(Debug, Clone, Default)]
pub struct StaticFacts {
    facts: BTreeMap<String, Value>,
}

impl StaticFacts {
    /// An empty resolver; every lookup fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fact for artifact `id`.
    #[must_use]
    pub fn with_fact(mut self, id: &str, value: Value) -> Self {
        self.facts.insert(id.to_owned(), value);
        self
    }
}

impl FactAdapter for StaticFacts {
    fn resolve<'a>(
        &'a self,
        source: &'a ArtifactRef,
        _data: &'a BTreeMap<String, Value>,
    ) -> BoxFuture<'a, Result<Value, AdapterError>> {
        let result = self
            .facts
            .get(&source.id)
            .cloned()
            .ok_or_else(|| AdapterError::NotFound {
                key: source.id.clone(),
            });
        future::ready(result).boxed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_logger_respects_levels() {
        let logger = MemoryLogger::with_levels(&[LogLevel::Warn]);
        assert!(logger.supports(LogLevel::Warn));
        assert!(!logger.supports(LogLevel::Info));

        logger.write(LogLevel::Warn, "careful", &BTreeMap::new()).await.unwrap();
        assert_eq!(
            logger.lines(),
            vec![LogLine {
                level: LogLevel::Warn,
                message: "careful".to_owned(),
            }]
        );
    }

    #[tokio::test]
    async fn static_facts_lookup() {
        let facts = StaticFacts::new().with_fact("plan:0", Value::from(7));
        let hit = ArtifactRef::new("plan", "plan:0");
        let miss = ArtifactRef::new("plan", "plan:1");
        assert_eq!(facts.resolve(&hit, &BTreeMap::new()).await.unwrap(), Value::from(7));
        assert!(matches!(
            facts.resolve(&miss, &BTreeMap::new()).await,
            Err(AdapterError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn stub_solver_failure_carries_message() {
        let solver = StubSolver::failing("boom");
        let request = SolverRequest::new(Value::Null);
        let err = solver.solve(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
