//! A resolved volume target.

use std::sync::Arc;

use knob_ipc::TargetId;
use tracing::{debug, warn};

use crate::backend::VolumeControl;
use crate::com::ComScope;
use crate::endpoint::SystemAudioEndpoint;
use crate::resolver::AudioSessionResolver;

/// One live handle behind a target.
#[derive(Clone)]
pub enum AudioHandle {
    /// A per-process stream.
    ProcessStream(Arc<dyn VolumeControl>),

    /// The system output device.
    SystemEndpoint(Arc<SystemAudioEndpoint>),
}

impl AudioHandle {
    fn volume(&self) -> Option<f32> {
        match self {
            Self::ProcessStream(control) => match control.volume() {
                Ok(level) => Some(level),
                Err(e) => {
                    warn!(error = %e, "Failed to read stream volume");
                    None
                }
            },
            Self::SystemEndpoint(endpoint) => endpoint.volume(),
        }
    }

    fn set_volume(&self, level: f32) -> bool {
        match self {
            Self::ProcessStream(control) => match control.set_volume(level) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, level, "Failed to set stream volume");
                    false
                }
            },
            Self::SystemEndpoint(endpoint) => endpoint.set_volume(level).is_some(),
        }
    }
}

/// The target whose volume the hotkeys currently change.
///
/// Process targets are re-resolved on every access, so streams that start
/// or stop between key presses are picked up.
pub struct AudioTarget {
    id: TargetId,
    resolver: Arc<AudioSessionResolver>,
    system: Arc<SystemAudioEndpoint>,
    handles: Vec<AudioHandle>,
}

impl AudioTarget {
    /// Create a target and resolve it once.
    pub fn new(
        id: TargetId,
        resolver: Arc<AudioSessionResolver>,
        system: Arc<SystemAudioEndpoint>,
    ) -> Self {
        let mut target = Self {
            id,
            resolver,
            system,
            handles: Vec::new(),
        };
        target.refresh();
        target
    }

    /// Identifier of this target.
    pub fn id(&self) -> &TargetId {
        &self.id
    }

    /// Handles from the most recent resolution.
    pub fn handles(&self) -> &[AudioHandle] {
        &self.handles
    }

    /// Returns true if the most recent resolution found nothing to control.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Re-resolve the target's handles.
    pub fn refresh(&mut self) -> &[AudioHandle] {
        self.handles = match &self.id {
            TargetId::System => vec![AudioHandle::SystemEndpoint(Arc::clone(&self.system))],
            TargetId::Process(name) => self
                .resolver
                .resolve(name)
                .into_iter()
                .map(AudioHandle::ProcessStream)
                .collect(),
        };
        &self.handles
    }

    /// Read the target's volume from its first handle.
    ///
    /// `None` if the target has no audio or the read failed.
    pub fn volume(&mut self) -> Option<f32> {
        self.refresh();
        let handle = self.handles.first()?.clone();

        let _com = ComScope::enter().ok()?;
        let _guard = self.resolver.volume_lock();
        handle.volume()
    }

    /// Apply a level to every handle of the target.
    ///
    /// Returns the level if at least one handle accepted it.
    pub fn set_volume(&mut self, level: f32) -> Option<f32> {
        self.refresh();
        if self.handles.is_empty() {
            debug!(target_id = %self.id, "Nothing to set");
            return None;
        }

        let _com = ComScope::enter().ok()?;
        let _guard = self.resolver.volume_lock();
        let mut applied = false;
        for handle in &self.handles {
            applied |= handle.set_volume(level);
        }
        applied.then_some(level)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::memory::MemoryBackend;

    fn setup() -> (
        Arc<MemoryBackend>,
        Arc<AudioSessionResolver>,
        Arc<SystemAudioEndpoint>,
    ) {
        let backend = Arc::new(MemoryBackend::new());
        let resolver = Arc::new(AudioSessionResolver::with_snapshot_ttl(
            backend.clone(),
            Duration::ZERO,
        ));
        let system = Arc::new(SystemAudioEndpoint::new(backend.clone()));
        (backend, resolver, system)
    }

    #[test]
    fn test_set_volume_applies_to_every_stream() {
        let (backend, resolver, system) = setup();
        let first = backend.add_stream("chrome.exe", 0.4, 1.0);
        let second = backend.add_stream("chrome.exe", 0.2, 0.8);

        let mut target = AudioTarget::new(TargetId::parse("chrome.exe"), resolver, system);
        assert_eq!(target.handles().len(), 2);
        assert_eq!(target.set_volume(0.5), Some(0.5));
        assert_eq!(first.level(), 0.5);
        assert_eq!(second.level(), 0.5);
    }

    #[test]
    fn test_volume_reads_first_stream() {
        let (backend, resolver, system) = setup();
        backend.add_stream("vlc.exe", 0.4, 0.3);
        backend.add_stream("vlc.exe", 0.4, 0.9);

        let mut target = AudioTarget::new(TargetId::parse("vlc.exe"), resolver, system);
        assert_eq!(target.volume(), Some(0.3));
    }

    #[test]
    fn test_target_without_audio() {
        let (backend, resolver, system) = setup();
        backend.add_stream("vlc.exe", 0.0, 0.3);

        let mut target = AudioTarget::new(TargetId::parse("vlc.exe"), resolver, system);
        assert!(target.is_empty());
        assert_eq!(target.volume(), None);
        assert_eq!(target.set_volume(0.5), None);
    }

    #[test]
    fn test_target_reresolves_between_accesses() {
        let (backend, resolver, system) = setup();
        let mut target = AudioTarget::new(TargetId::parse("vlc.exe"), resolver, system);
        assert!(target.is_empty());

        let control = backend.add_stream("vlc.exe", 0.5, 0.6);
        assert_eq!(target.volume(), Some(0.6));

        backend.remove_process("vlc.exe");
        assert_eq!(target.set_volume(0.1), None);
        assert_eq!(control.level(), 0.6);
    }

    #[test]
    fn test_system_target_uses_endpoint() {
        let (backend, resolver, system) = setup();
        let mut target = AudioTarget::new(TargetId::System, resolver, system);
        assert_eq!(target.handles().len(), 1);
        assert_eq!(target.set_volume(0.25), Some(0.25));
        assert_eq!(backend.system_control().level(), 0.25);
    }

    #[test]
    fn test_failed_stream_does_not_block_others() {
        let (backend, resolver, system) = setup();
        let broken = backend.add_stream("game.exe", 0.5, 1.0);
        let working = backend.add_stream("game.exe", 0.5, 1.0);
        broken.set_failing(true);

        let mut target = AudioTarget::new(TargetId::parse("game.exe"), resolver, system);
        assert_eq!(target.set_volume(0.4), Some(0.4));
        assert_eq!(working.level(), 0.4);
    }
}
