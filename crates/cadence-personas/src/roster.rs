//! The default persona roster.
//!
//! Builds every persona from configuration, in invocation order, and
//! registers them with an orchestrator.

use cadence_core::config::CadenceConfig;
use cadence_core::orchestrator::{OrchestratorError, TickOrchestrator};
use cadence_core::persona::Persona;
use tracing::info;

use crate::{Actor, Allocator, Annotator, Configurator, Director, Moderator, OrchestratorPersona};

/// Registration names, in invocation order.
pub const ROSTER: [&str; 7] = [
    "configurator",
    "director",
    "orchestrator",
    "actor",
    "moderator",
    "allocator",
    "annotator",
];

/// Build the default roster from configuration.
pub fn build(config: &CadenceConfig) -> Vec<(&'static str, Box<dyn Persona>)> {
    let personas: [Box<dyn Persona>; 7] = [
        Box::new(Configurator::new()),
        Box::new(Director::new()),
        Box::new(OrchestratorPersona::new(&config.personas.orchestrator)),
        Box::new(Actor::new("actor", &config.personas.actor, config.run.seed)),
        Box::new(Moderator::new(&config.personas.moderator)),
        Box::new(Allocator::new()),
        Box::new(Annotator::new()),
    ];
    ROSTER.into_iter().zip(personas).collect()
}

/// Register the default roster with `orchestrator`.
pub fn register_all(
    orchestrator: &mut TickOrchestrator,
    config: &CadenceConfig,
) -> Result<(), OrchestratorError> {
    for (name, persona) in build(config) {
        orchestrator.register_persona(name, persona)?;
    }
    info!(personas = ROSTER.len(), "persona roster registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use cadence_types::TickPhase;

    use super::*;

    #[test]
    fn every_cycle_phase_has_a_subscriber() {
        let roster = build(&CadenceConfig::default());
        for phase in TickPhase::ALL {
            assert!(
                roster.iter().any(|(_, p)| p.subscribes_to(phase)),
                "no persona subscribes to {phase}"
            );
        }
    }

    #[test]
    fn names_follow_invocation_order() {
        let names: Vec<&str> = build(&CadenceConfig::default())
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, ROSTER);
    }
}
