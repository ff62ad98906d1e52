//! Concrete personas for the Cadence tick scheduler.
//!
//! Every persona keeps its state as a closed enum with a static guard table
//! (see [`guard`]) and implements [`cadence_core::Persona`]. The
//! [`roster`] module wires the default set into an orchestrator.
//!
//! | Persona | Phases |
//! |---------|--------|
//! | [`Configurator`] | `Init` |
//! | [`Director`] | `Observe`, `Decide`, `Summarize` |
//! | [`OrchestratorPersona`] | `Decide` |
//! | [`Actor`] | `Apply` |
//! | [`Moderator`] | `Emit` |
//! | [`Allocator`] | `Emit`, `Summarize` |
//! | [`Annotator`] | `Apply`, `Summarize` |

pub mod actor;
pub mod allocator;
pub mod annotator;
pub mod configurator;
pub mod director;
pub mod guard;
pub mod moderator;
pub mod orchestrator;
pub mod roster;

pub use actor::{Actor, ActorState};
pub use allocator::{Allocator, AllocatorState};
pub use annotator::{Annotator, AnnotatorState};
pub use configurator::{Configurator, ConfiguratorState};
pub use director::{Director, DirectorState};
pub use moderator::{Moderator, ModeratorState};
pub use orchestrator::{OrchestratorPersona, OrchestratorState};
pub use roster::{ROSTER, register_all};
