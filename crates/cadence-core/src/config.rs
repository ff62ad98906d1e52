//! Configuration loading and typed config structures for Cadence.
//!
//! The canonical configuration lives in `cadence-config.yaml` at the project
//! root. Every section and field has a default, so an empty file is a valid
//! configuration.
//!
//! Environment variables override YAML values after parsing:
//! - `CADENCE_SEED` overrides `run.seed`
//! - `CADENCE_LOG_LEVEL` overrides `logging.level`

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use cadence_budget::{BudgetError, BudgetGate, CategoryRegistry, DEFAULT_CATEGORIES};

use crate::orchestrator::{DEFAULT_PRODUCER, OrchestratorConfig};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The budget section does not describe a valid category set.
    #[error("invalid budget configuration: {source}")]
    Budget {
        /// The underlying budget error.
        #[from]
        source: BudgetError,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for {name}: {value}")]
    InvalidOverride {
        /// Variable name.
        name: String,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration. Mirrors `cadence-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadenceConfig {
    /// Run identity and bounds.
    #[serde(default)]
    pub run: RunConfig,

    /// Budget categories, caps, and action routing.
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Kernel action codes.
    #[serde(default)]
    pub kernel: KernelConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-persona settings.
    #[serde(default)]
    pub personas: PersonasConfig,
}

impl CadenceConfig {
    /// Load configuration from a YAML file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidOverride`] if an override does not parse.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Apply `CADENCE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("CADENCE_SEED") {
            self.run.seed = val.parse().map_err(|_err| ConfigError::InvalidOverride {
                name: "CADENCE_SEED".to_owned(),
                value: val.clone(),
            })?;
        }
        if let Some(val) = lookup("CADENCE_LOG_LEVEL") {
            self.logging.level = val;
        }
        Ok(())
    }

    /// Orchestrator settings derived from this configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            produced_by: DEFAULT_PRODUCER.to_owned(),
            seed: self.run.seed,
            caps: self.budget.caps.clone(),
            action_codes: self.kernel.action_codes.clone(),
        }
    }

    /// Build the budget gate. Caps are applied later, on `Init`.
    pub fn budget_gate(&self) -> Result<BudgetGate, ConfigError> {
        let registry = CategoryRegistry::new(&self.budget.categories)?;
        Ok(BudgetGate::new(
            registry,
            self.budget.action_categories.clone(),
        ))
    }
}

/// Run identity and bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Human-readable run label.
    #[serde(default = "default_label")]
    pub label: String,

    /// Seed passed to the kernel and to seeded personas.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of full ticks the engine runs after `Init`.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            seed: default_seed(),
            max_ticks: default_max_ticks(),
        }
    }
}

/// Budget categories, caps, and routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Category names; position is the numeric id.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// Category name to cap. Absent categories are uncapped; unknown names
    /// are skipped when caps are applied.
    #[serde(default)]
    pub caps: BTreeMap<String, u64>,

    /// Action kind to category name.
    #[serde(default = "default_action_categories")]
    pub action_categories: BTreeMap<String, String>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            caps: BTreeMap::new(),
            action_categories: default_action_categories(),
        }
    }
}

/// Kernel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Action kind to numeric kernel action code.
    #[serde(default = "default_action_codes")]
    pub action_codes: BTreeMap<String, u32>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            action_codes: default_action_codes(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Where the engine writes the frame log as JSON lines. `None` disables it.
    #[serde(default = "default_frame_log_path")]
    pub frame_log_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            frame_log_path: default_frame_log_path(),
        }
    }
}

/// Per-persona settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonasConfig {
    /// Actor settings.
    #[serde(default)]
    pub actor: ActorConfig,

    /// Orchestrator-persona settings.
    #[serde(default)]
    pub orchestrator: OrchestratorPersonaConfig,

    /// Moderator settings.
    #[serde(default)]
    pub moderator: ModeratorConfig,
}

/// Actor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Action kinds proposed on every `Apply`.
    #[serde(default = "default_proposals")]
    pub proposals: Vec<String>,

    /// Number of `Apply` rounds before the actor is exhausted. `None` never
    /// exhausts.
    #[serde(default)]
    pub rounds: Option<u64>,

    /// Upper bound (inclusive) of the seeded random `value` param.
    #[serde(default = "default_max_value")]
    pub max_value: i64,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            proposals: default_proposals(),
            rounds: None,
            max_value: default_max_value(),
        }
    }
}

/// Orchestrator-persona settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorPersonaConfig {
    /// Ticks between solver requests. `0` disables requests.
    #[serde(default = "default_solve_every")]
    pub solve_every: u64,
}

impl Default for OrchestratorPersonaConfig {
    fn default() -> Self {
        Self {
            solve_every: default_solve_every(),
        }
    }
}

/// Moderator settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeratorConfig {
    /// Action kinds the moderator flags.
    #[serde(default)]
    pub blocked_kinds: Vec<String>,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_label() -> String {
    "cadence".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_max_ticks() -> u64 {
    10
}

fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|&c| c.to_owned()).collect()
}

fn default_action_categories() -> BTreeMap<String, String> {
    [("move", "movement"), ("greet", "interaction"), ("spawn", "spawn")]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}

fn default_action_codes() -> BTreeMap<String, u32> {
    [("move", 1), ("greet", 2), ("spawn", 3)]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect()
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[allow(clippy::unnecessary_wraps)]
fn default_frame_log_path() -> Option<String> {
    Some("cadence-frames.jsonl".to_owned())
}

fn default_proposals() -> Vec<String> {
    vec!["move".to_owned(), "greet".to_owned()]
}

const fn default_max_value() -> i64 {
    5
}

const fn default_solve_every() -> u64 {
    2
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CadenceConfig::default();
        assert_eq!(config.run.seed, 42);
        assert_eq!(config.run.max_ticks, 10);
        assert_eq!(config.budget.categories.len(), 4);
        assert!(config.budget.caps.is_empty());
        assert_eq!(config.kernel.action_codes.get("move"), Some(&1));
        assert_eq!(config.personas.orchestrator.solve_every, 2);
        assert!(config.budget_gate().is_ok());
    }

    #[test]
    fn empty_yaml_uses_defaults() {
        let config = CadenceConfig::parse("{}").unwrap();
        assert_eq!(config, CadenceConfig::default());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
run:
  label: "trial"
  seed: 7
  max_ticks: 3

budget:
  categories: [movement, interaction]
  caps:
    movement: 2
    teleport: 1
  action_categories:
    move: movement

kernel:
  action_codes:
    move: 10

logging:
  level: debug
  frame_log_path: null

personas:
  actor:
    proposals: [move, move, move]
    rounds: 2
  orchestrator:
    solve_every: 1
  moderator:
    blocked_kinds: [spawn]
"#;
        let config = CadenceConfig::parse(yaml).unwrap();
        assert_eq!(config.run.label, "trial");
        assert_eq!(config.run.seed, 7);
        assert_eq!(config.budget.caps.get("movement"), Some(&2));
        assert_eq!(config.kernel.action_codes.get("move"), Some(&10));
        assert_eq!(config.logging.frame_log_path, None);
        assert_eq!(config.personas.actor.proposals.len(), 3);
        assert_eq!(config.personas.actor.rounds, Some(2));
        assert_eq!(config.personas.moderator.blocked_kinds, vec!["spawn".to_owned()]);

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.seed, 7);
        assert_eq!(orchestrator.caps.len(), 2);
    }

    #[test]
    fn duplicate_categories_are_a_config_error() {
        let config = CadenceConfig::parse("budget:\n  categories: [a, a]\n").unwrap();
        assert!(matches!(
            config.budget_gate(),
            Err(ConfigError::Budget { .. })
        ));
    }

    #[test]
    fn overrides_apply_after_parse() {
        let mut config = CadenceConfig::default();
        config
            .apply_overrides(|name| match name {
                "CADENCE_SEED" => Some("99".to_owned()),
                "CADENCE_LOG_LEVEL" => Some("warn".to_owned()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.run.seed, 99);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn bad_seed_override_is_rejected() {
        let mut config = CadenceConfig::default();
        let result = config.apply_overrides(|name| {
            (name == "CADENCE_SEED").then(|| "not-a-number".to_owned())
        });
        assert!(matches!(result, Err(ConfigError::InvalidOverride { .. })));
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        assert!(CadenceConfig::parse("run: [").is_err());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("cadence-config.yaml");
        if path.exists() {
            let contents = std::fs::read_to_string(&path).unwrap();
            let config = CadenceConfig::parse(&contents);
            assert!(config.is_ok(), "failed to load project config: {config:?}");
            assert!(config.unwrap().budget_gate().is_ok());
        }
    }
}
