//! Solver protocol: request `{meta, problem}`, result `{status, meta, ...}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::enums::FulfillmentStatus;
use crate::ids::RunId;

/// Requester-supplied metadata on a solver request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SolverRequestMeta {
    /// Correlation id chosen by the requester.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Persona that asked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
}

/// A problem handed to the solver adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SolverRequest {
    /// Requester metadata.
    #[serde(default)]
    pub meta: SolverRequestMeta,
    /// Opaque problem description.
    pub problem: Value,
}

impl SolverRequest {
    /// A request with empty metadata.
    pub fn new(problem: Value) -> Self {
        Self {
            meta: SolverRequestMeta::default(),
            problem,
        }
    }

    /// Set the correlation id.
    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.meta.id = Some(id.to_owned());
        self
    }

    /// Set the requesting persona.
    #[must_use]
    pub fn requested_by(mut self, persona: &str) -> Self {
        self.meta.requested_by = Some(persona.to_owned());
        self
    }
}

/// What a solver adapter returns on success.
///
/// Every field is optional: a stub adapter may return an empty response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SolverResponse {
    /// Adapter-reported status; `None` means fulfilled.
    pub status: Option<FulfillmentStatus>,
    /// Adapter-reported reason.
    pub reason: Option<String>,
    /// Solution body.
    pub solution: Option<Value>,
}

/// Traceability envelope stamped on every solver result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SolverMeta {
    /// The request's own id, or the run id when the request had none.
    pub id: String,
    /// Run the round-trip belongs to.
    pub run_id: RunId,
    /// Injected-clock time the result was built.
    pub created_at: DateTime<Utc>,
    /// Component that built the envelope.
    pub produced_by: String,
}

/// Uniform result of one solver round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SolverResult {
    /// Outcome.
    pub status: FulfillmentStatus,
    /// Traceability envelope.
    pub meta: SolverMeta,
    /// Reason for `deferred`/`error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Solution body, when the adapter returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<Value>,
}
