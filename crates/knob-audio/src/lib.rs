//! Per-application audio session resolution and volume control.
//!
//! This crate resolves a [`TargetId`](knob_ipc::TargetId) to live volume
//! handles: the system output endpoint, or every active stream owned by a
//! process. The platform mixer sits behind [`AudioBackend`]; on Windows it is
//! implemented with WASAPI session enumeration.

mod backend;
mod com;
mod endpoint;
mod error;
#[cfg(any(test, feature = "test-util"))]
mod memory;
mod resolver;
mod target;
#[cfg(windows)]
mod wasapi;

pub use backend::{AudioBackend, AudioStream, VolumeControl};
pub use com::ComScope;
pub use endpoint::SystemAudioEndpoint;
pub use error::AudioError;
#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryBackend, MemoryControl};
pub use resolver::{AudioSessionResolver, DEFAULT_SNAPSHOT_TTL};
pub use target::{AudioHandle, AudioTarget};
#[cfg(windows)]
pub use wasapi::{process_name, WasapiBackend};

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

/// Create the native backend for this platform, if there is one.
#[cfg(windows)]
pub fn create_backend() -> Option<std::sync::Arc<dyn AudioBackend>> {
    Some(std::sync::Arc::new(WasapiBackend::new()))
}

/// Create the native backend for this platform, if there is one.
#[cfg(not(windows))]
pub fn create_backend() -> Option<std::sync::Arc<dyn AudioBackend>> {
    None
}
