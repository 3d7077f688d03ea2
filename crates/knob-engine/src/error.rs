//! Error types for the engine.

use thiserror::Error;

/// Errors that can occur while building or running the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A required hotkey is not configured.
    #[error("Missing required hotkey setting: {0}")]
    MissingBinding(&'static str),

    /// A hotkey value could not be parsed.
    #[error("Invalid hotkey {key} = {value:?}: {reason}")]
    InvalidBinding {
        key: String,
        value: String,
        reason: String,
    },

    /// A worker thread could not be started.
    #[error("Failed to spawn {name} thread: {source}")]
    Thread {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}
