//! Shared type definitions for the Cadence tick scheduler.
//!
//! This crate is the single source of truth for the data that crosses crate
//! boundaries: phases and events, persona actions and effects, fulfillment
//! records, and the tick frames that form a run's replay log. Types flow to
//! `TypeScript` via `ts-rs` for log viewers.
//!
//! # Modules
//!
//! - [`ids`] -- Run ids plus derived (UUID v5) frame and effect ids
//! - [`enums`] -- Phases, events, effect kinds, fulfillment classes/statuses
//! - [`actions`] -- Actions, effects, artifacts, fulfillment and telemetry records
//! - [`frame`] -- Phase contexts, persona views, tick frames, phase digests
//! - [`solver`] -- Solver request/response/result protocol

pub mod actions;
pub mod enums;
pub mod frame;
pub mod ids;
pub mod solver;

// Re-export all public types at crate root for convenience.
pub use actions::{
    Action, Artifact, ArtifactRef, Effect, EffectProposal, FulfillmentRecord, TelemetryRecord,
};
pub use enums::{EffectKind, Fulfillment, FulfillmentStatus, TickEvent, TickPhase, UnknownTickEvent};
pub use frame::{FrameMeta, PersonaView, PhaseContext, PhaseDetail, PhaseDigest, TickFrame};
pub use ids::{EffectId, FrameId, RunId};
pub use solver::{SolverMeta, SolverRequest, SolverRequestMeta, SolverResponse, SolverResult};
