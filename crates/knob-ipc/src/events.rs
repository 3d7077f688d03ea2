//! Events sent from the engine to the app.

use serde::{Deserialize, Serialize};

use crate::types::TargetId;

/// Events that the engine can send to the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Engine is ready to accept commands.
    Ready,

    /// The active target changed after a command.
    TargetChanged {
        /// Previous target.
        previous: TargetId,

        /// Current target.
        current: TargetId,
    },

    /// The quit hotkey was pressed.
    QuitRequested,

    /// Engine has shut down.
    Shutdown,
}
