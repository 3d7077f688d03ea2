//! Commands sent to the engine thread.

use serde::{Deserialize, Serialize};

use crate::types::HotkeyAction;

/// Commands the hotkey thread (or the app) can send to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineCommand {
    /// Execute a hotkey action against the mixer profile.
    Action(HotkeyAction),

    /// Cancel pending work and stop the engine loop.
    Shutdown,
}
