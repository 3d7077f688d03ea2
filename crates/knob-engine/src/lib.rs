//! Mixer profile, hotkey bindings and command loop.
//!
//! This crate owns the volume-control state machine: which target the
//! hotkeys act on, how far each press moves the volume, what happens when
//! the target goes silent, and when a manual switch reverts to the default.

mod bindings;
mod error;
mod orchestrator;
mod profile;
mod step;
mod timer;

pub use bindings::{key_dispatcher, HotkeyBindingTable, KeyBinding, SCAN_CODE_PREFIX};
pub use error::EngineError;
pub use orchestrator::{spawn_engine, Engine};
pub use profile::{MixerProfile, MixerSettings};
pub use step::{dynamic_step, volume_down_level, volume_up_level, StepDirection};
pub use timer::RevertTimer;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
