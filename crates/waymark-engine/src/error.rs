//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode of startup, the tick loop, and
//! the final snapshot so `main` can propagate with `?`.

use std::path::PathBuf;

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: waymark_core::config::ConfigError,
    },

    /// Game clock initialization failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: waymark_core::clock::ClockError,
    },

    /// The starting scenario could not be loaded or applied.
    #[error("scenario error: {source}")]
    Scenario {
        /// The underlying scenario error.
        #[from]
        source: waymark_core::scenario::ScenarioError,
    },

    /// The transport layer failed outside the tick loop.
    #[error("transport error: {source}")]
    Transport {
        /// The underlying transport error.
        #[from]
        source: waymark_transport::TransportError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: waymark_core::runner::RunnerError,
    },

    /// The final snapshot could not be written.
    #[error("failed to write snapshot to {}: {source}", path.display())]
    Snapshot {
        /// Target path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
