//! Typed cross-thread messages for the knob volume mixer.
//!
//! This crate defines the message types exchanged between the hotkey
//! capture thread, the engine thread and the overlay UI loop, plus the
//! settings shape shared by the binary and the engine.

mod commands;
mod events;
mod types;

pub use commands::EngineCommand;
pub use events::EngineEvent;
pub use types::{
    DisplayLevel, DisplayUpdate, HotkeyAction, KeyDisposition, KeyEvent, KeyEventKind, Settings,
    TargetId, SYSTEM_SENTINEL,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (hotkey thread → engine).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for events (engine → app).
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for overlay display updates (any thread → UI loop).
pub const DISPLAY_CHANNEL_CAPACITY: usize = 50;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<EngineCommand>, Receiver<EngineCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<EngineEvent>, Receiver<EngineEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}

/// Creates the bounded display channel feeding the overlay.
pub fn display_channel() -> (Sender<DisplayUpdate>, Receiver<DisplayUpdate>) {
    crossbeam_channel::bounded(DISPLAY_CHANNEL_CAPACITY)
}
