//! Error types for the engine binary.

/// Top-level error for the engine binary.
///
/// Each variant wraps a subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: cadence_core::ConfigError,
    },

    /// Persona registration failed.
    #[error("orchestrator error: {source}")]
    Orchestrator {
        /// The underlying orchestrator error.
        #[from]
        source: cadence_core::OrchestratorError,
    },

    /// The run failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: cadence_core::RunnerError,
    },

    /// The configuration snapshot could not be serialized for `Init`.
    #[error("snapshot error: {source}")]
    Snapshot {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// The frame log could not be opened.
    #[error("frame log error: {path}: {source}")]
    FrameLog {
        /// Log file path.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
