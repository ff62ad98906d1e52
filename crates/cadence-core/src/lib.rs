//! Phase machine, persona contract, effect dispatch, and tick orchestration
//! for the Cadence tick scheduler.
//!
//! Each tick cycles through `Observe`, `Decide`, `Apply`, `Emit`, and
//! `Summarize` after a single `Init`. The [`TickOrchestrator`] fans every
//! phase out to the personas subscribed to it, gates their actions through
//! the budget, applies admitted actions to the simulation kernel, routes
//! their effects to adapters, and appends one immutable frame per phase.
//!
//! # Modules
//!
//! - [`adapters`] -- Logger, telemetry, solver, and fact adapter traits plus
//!   in-memory and `tracing` implementations.
//! - [`clock`] -- Injected clocks ([`SystemClock`], [`FixedClock`],
//!   [`SteppingClock`]).
//! - [`config`] -- Configuration loading from `cadence-config.yaml`.
//! - [`dispatch`] -- The effect dispatcher and its deferral reasons.
//! - [`kernel`] -- The numeric simulation kernel contract and
//!   [`InMemoryKernel`].
//! - [`orchestrator`] -- [`TickOrchestrator`] and `step_phase`.
//! - [`persona`] -- The [`Persona`] trait, phase events, and the registry.
//! - [`phase`] -- The tick phase machine and its transition table.
//! - [`runner`] -- Bounded run loop with per-step callbacks.
//! - [`solver`] -- The solver mediator.
//!
//! [`SystemClock`]: clock::SystemClock
//! [`FixedClock`]: clock::FixedClock
//! [`SteppingClock`]: clock::SteppingClock
//! [`InMemoryKernel`]: kernel::InMemoryKernel
//! [`TickOrchestrator`]: orchestrator::TickOrchestrator
//! [`Persona`]: persona::Persona

pub mod adapters;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod kernel;
pub mod orchestrator;
pub mod persona;
pub mod phase;
pub mod runner;
pub mod solver;

pub use adapters::{Adapters, AdapterError, LogLevel};
pub use clock::{Clock, FixedClock, SteppingClock, SystemClock};
pub use config::{CadenceConfig, ConfigError};
pub use dispatch::{Dispatched, EffectDispatcher};
pub use kernel::{InMemoryKernel, KernelError, SimulationKernel};
pub use orchestrator::{OrchestratorConfig, OrchestratorError, StepOutcome, TickOrchestrator};
pub use persona::{Persona, PersonaError, PersonaOutput, PersonaRegistry, PhaseEvent, RegistryError};
pub use phase::{PhaseError, PhaseMachine};
pub use runner::{FrameCallback, NoOpCallback, RunSummary, RunnerError, run_ticks};
pub use solver::SolverMediator;
