//! The configurator persona.
//!
//! Runs once, on `Init`. Reads the configuration snapshot from the `Init`
//! payload and checks it for wiring gaps. Each problem becomes an
//! `init_invalid` effect; a clean snapshot produces a single `log` effect.

use std::collections::BTreeMap;

use serde_json::Value;

use cadence_core::config::CadenceConfig;
use cadence_core::persona::{Persona, PersonaError, PersonaOutput, PhaseEvent};
use cadence_types::{EffectKind, EffectProposal, PersonaView, TickPhase};

use crate::guard::{self, StateTag};

/// Configurator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfiguratorState {
    /// Waiting for `Init`.
    Unconfigured,
    /// The snapshot passed every check.
    Configured,
    /// At least one check failed.
    Invalid,
}

impl StateTag for ConfiguratorState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Configured => "configured",
            Self::Invalid => "invalid",
        }
    }
}

const ACCEPT: &str = "accept";
const REJECT: &str = "reject";

const TRANSITIONS: [(ConfiguratorState, &str, ConfiguratorState); 2] = [
    (ConfiguratorState::Unconfigured, ACCEPT, ConfiguratorState::Configured),
    (ConfiguratorState::Unconfigured, REJECT, ConfiguratorState::Invalid),
];

const PHASES: [TickPhase; 1] = [TickPhase::Init];

/// Validates the run configuration on `Init`.
#[derive(Debug, Clone)]
pub struct Configurator {
    state: ConfiguratorState,
    context: BTreeMap<String, Value>,
}

impl Default for Configurator {
    fn default() -> Self {
        Self::new()
    }
}

impl Configurator {
    /// A configurator waiting for `Init`.
    pub const fn new() -> Self {
        Self {
            state: ConfiguratorState::Unconfigured,
            context: BTreeMap::new(),
        }
    }

    /// Current state.
    pub const fn state(&self) -> ConfiguratorState {
        self.state
    }
}

/// Problems found in a configuration snapshot.
pub fn validate(payload: &Value) -> Vec<String> {
    if !payload.is_object() {
        return vec!["init payload carries no configuration snapshot".to_owned()];
    }
    let config: CadenceConfig = match serde_json::from_value(payload.clone()) {
        Ok(config) => config,
        Err(err) => return vec![format!("configuration snapshot does not parse: {err}")],
    };

    let mut problems = Vec::new();
    if config.run.max_ticks == 0 {
        problems.push("run.max_ticks is 0; no ticks will run".to_owned());
    }
    for (kind, category) in &config.budget.action_categories {
        if !config.budget.categories.contains(category) {
            problems.push(format!(
                "action kind '{kind}' routes to unknown category '{category}'"
            ));
        }
    }
    for kind in &config.personas.actor.proposals {
        if !config.kernel.action_codes.contains_key(kind) {
            problems.push(format!("actor proposes '{kind}' but it has no kernel action code"));
        }
    }
    if config.personas.actor.max_value < 1 {
        problems.push("personas.actor.max_value must be at least 1".to_owned());
    }
    problems
}

impl Persona for Configurator {
    fn subscribe_phases(&self) -> &[TickPhase] {
        &PHASES
    }

    fn view(&self) -> PersonaView {
        guard::view(self.state, &self.context)
    }

    fn advance(&mut self, event: &PhaseEvent) -> Result<PersonaOutput, PersonaError> {
        let problems = validate(&event.payload);
        let internal = if problems.is_empty() { ACCEPT } else { REJECT };
        self.state = guard::fire(&TRANSITIONS, self.state, internal)?;

        self.context.insert("lastEvent".to_owned(), Value::from(internal));
        self.context
            .insert("problems".to_owned(), Value::from(problems.len()));

        let mut output = PersonaOutput::empty();
        if problems.is_empty() {
            output = output.with_effect(EffectProposal::log("configuration accepted"));
        }
        for problem in problems {
            output = output.with_effect(
                EffectProposal::new(EffectKind::InitInvalid).with_data("message", problem),
            );
        }
        Ok(output)
    }

    fn clone_box(&self) -> Box<dyn Persona> {
        Box::new(self.clone())
    }
}
