//! The solver mediator.
//!
//! Wraps a [`SolverAdapter`] call in a uniform [`SolverResult`] envelope.
//! Adapter errors are folded into the result; the mediator never fails.

use std::sync::Arc;

use tracing::debug;

use cadence_types::{FulfillmentStatus, RunId, SolverMeta, SolverRequest, SolverRequestMeta, SolverResult};

use crate::adapters::SolverAdapter;
use crate::clock::Clock;

/// Reason recorded when a solver defers without saying why.
pub const SOLVER_DEFERRED: &str = "solver_deferred";

/// Reason recorded when a solver reports an error without saying why.
pub const SOLVER_ERROR: &str = "solver_error";

/// `produced_by` for envelopes whose request names no persona.
const MEDIATOR_NAME: &str = "solver_mediator";

/// Turns solver requests into traceable results.
#[derive(Clone)]
pub struct SolverMediator {
    run_id: RunId,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for SolverMediator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SolverMediator")
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

impl SolverMediator {
    /// Create a mediator for one run.
    pub fn new(run_id: RunId, clock: Arc<dyn Clock>) -> Self {
        Self { run_id, clock }
    }

    /// Build the envelope for a request. `id` falls back to the run id.
    pub fn build_meta(&self, meta: &SolverRequestMeta) -> SolverMeta {
        SolverMeta {
            id: meta.id.clone().unwrap_or_else(|| self.run_id.to_string()),
            run_id: self.run_id,
            created_at: self.clock.now(),
            produced_by: meta
                .requested_by
                .clone()
                .unwrap_or_else(|| MEDIATOR_NAME.to_owned()),
        }
    }

    /// Call the adapter and normalise its answer.
    pub async fn solve(&self, adapter: &dyn SolverAdapter, request: &SolverRequest) -> SolverResult {
        let meta = self.build_meta(&request.meta);
        let result = match adapter.solve(request).await {
            Ok(response) => {
                let status = response.status.unwrap_or(FulfillmentStatus::Fulfilled);
                let reason = match status {
                    FulfillmentStatus::Fulfilled => response.reason,
                    FulfillmentStatus::Deferred => {
                        Some(response.reason.unwrap_or_else(|| SOLVER_DEFERRED.to_owned()))
                    }
                    FulfillmentStatus::Error => {
                        Some(response.reason.unwrap_or_else(|| SOLVER_ERROR.to_owned()))
                    }
                };
                SolverResult {
                    status,
                    meta,
                    reason,
                    solution: response.solution,
                }
            }
            Err(err) => SolverResult {
                status: FulfillmentStatus::Error,
                meta,
                reason: Some(err.to_string()),
                solution: None,
            },
        };
        debug!(
            id = %result.meta.id,
            status = result.status.as_str(),
            "solver round-trip"
        );
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::adapters::StubSolver;
    use crate::clock::FixedClock;

    fn mediator() -> SolverMediator {
        SolverMediator::new(RunId::nil(), Arc::new(FixedClock::epoch()))
    }

    #[tokio::test]
    async fn missing_status_means_fulfilled() {
        let result = mediator()
            .solve(&StubSolver::silent(), &SolverRequest::new(Value::Null))
            .await;
        assert_eq!(result.status, FulfillmentStatus::Fulfilled);
        assert!(result.reason.is_none());
    }

    #[tokio::test]
    async fn deferred_without_reason_gets_default() {
        let result = mediator()
            .solve(&StubSolver::deferred(None), &SolverRequest::new(Value::Null))
            .await;
        assert_eq!(result.status, FulfillmentStatus::Deferred);
        assert_eq!(result.reason.as_deref(), Some(SOLVER_DEFERRED));

        let explicit = mediator()
            .solve(&StubSolver::deferred(Some("busy")), &SolverRequest::new(Value::Null))
            .await;
        assert_eq!(explicit.reason.as_deref(), Some("busy"));
    }

    #[tokio::test]
    async fn error_status_without_reason_gets_default() {
        let result = mediator()
            .solve(&StubSolver::rejecting(None), &SolverRequest::new(Value::Null))
            .await;
        assert_eq!(result.status, FulfillmentStatus::Error);
        assert_eq!(result.reason.as_deref(), Some(SOLVER_ERROR));

        let explicit = mediator()
            .solve(&StubSolver::rejecting(Some("infeasible")), &SolverRequest::new(Value::Null))
            .await;
        assert_eq!(explicit.reason.as_deref(), Some("infeasible"));
    }

    #[tokio::test]
    async fn adapter_error_becomes_error_status() {
        let result = mediator()
            .solve(&StubSolver::failing("solver offline"), &SolverRequest::new(Value::Null))
            .await;
        assert_eq!(result.status, FulfillmentStatus::Error);
        assert_eq!(result.reason.as_deref(), Some("solver offline"));
    }

    #[tokio::test]
    async fn meta_id_prefers_request_then_run() {
        let m = mediator();
        let with_id = SolverRequest::new(json!({})).with_id("req-1").requested_by("planner");
        let result = m.solve(&StubSolver::fulfilled(json!([1, 2])), &with_id).await;
        assert_eq!(result.meta.id, "req-1");
        assert_eq!(result.meta.produced_by, "planner");
        assert_eq!(result.solution, Some(json!([1, 2])));

        let without = m.solve(&StubSolver::silent(), &SolverRequest::new(json!({}))).await;
        assert_eq!(without.meta.id, RunId::nil().to_string());
        assert_eq!(without.meta.produced_by, MEDIATOR_NAME);
    }
}
