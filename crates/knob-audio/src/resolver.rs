//! Stream enumeration and process resolution.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::backend::{AudioBackend, AudioStream, VolumeControl};
use crate::com::ComScope;

/// How long an enumeration is reused before the mixer is queried again.
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_millis(50);

struct Snapshot {
    taken_at: Instant,
    streams: Vec<AudioStream>,
}

/// Enumerates the platform mixer and resolves process names to stream handles.
///
/// Holds no state beyond a short-lived snapshot that absorbs bursts of
/// key-repeat. Also owns the lock that serializes every volume read and
/// write in the process.
pub struct AudioSessionResolver {
    backend: Arc<dyn AudioBackend>,
    snapshot_ttl: Duration,
    snapshot: Mutex<Option<Snapshot>>,
    volume_lock: Mutex<()>,
}

impl AudioSessionResolver {
    /// Create a resolver with the default snapshot lifetime.
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self::with_snapshot_ttl(backend, DEFAULT_SNAPSHOT_TTL)
    }

    /// Create a resolver with a custom snapshot lifetime; zero disables reuse.
    pub fn with_snapshot_ttl(backend: Arc<dyn AudioBackend>, snapshot_ttl: Duration) -> Self {
        Self {
            backend,
            snapshot_ttl,
            snapshot: Mutex::new(None),
            volume_lock: Mutex::new(()),
        }
    }

    /// The backend this resolver enumerates.
    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    /// Names of processes with at least one audible stream.
    ///
    /// Deduplicated, in the order the mixer reports them. Returns an empty
    /// list if enumeration fails.
    pub fn list_active_stream_owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = Vec::new();
        for stream in self.streams().iter().filter(|s| s.is_audible()) {
            if !owners.iter().any(|name| *name == stream.process_name) {
                owners.push(stream.process_name.clone());
            }
        }
        owners
    }

    /// Every stream handle owned by `process_name`, matched exactly.
    ///
    /// Empty unless at least one of the process's streams is audible; an
    /// empty result means the process currently has no audio. When audible,
    /// silent streams of the same process are included so a volume change
    /// covers them too.
    pub fn resolve(&self, process_name: &str) -> Vec<Arc<dyn VolumeControl>> {
        let streams = self.streams();
        let owned: Vec<&AudioStream> = streams
            .iter()
            .filter(|s| s.process_name == process_name)
            .collect();

        if !owned.iter().any(|s| s.is_audible()) {
            debug!(process = process_name, "No audible streams");
            return Vec::new();
        }

        owned.into_iter().map(|s| Arc::clone(&s.handle)).collect()
    }

    /// Drop the cached snapshot so the next query re-enumerates.
    pub fn invalidate(&self) {
        *self.snapshot.lock() = None;
    }

    /// Acquire the process-wide volume lock.
    pub fn volume_lock(&self) -> MutexGuard<'_, ()> {
        self.volume_lock.lock()
    }

    fn streams(&self) -> Vec<AudioStream> {
        let mut snapshot = self.snapshot.lock();
        if let Some(cached) = snapshot.as_ref() {
            if cached.taken_at.elapsed() < self.snapshot_ttl {
                return cached.streams.clone();
            }
        }

        let streams = match ComScope::enter().and_then(|_com| self.backend.streams()) {
            Ok(streams) => streams,
            Err(e) => {
                warn!(error = %e, "Audio session enumeration failed");
                *snapshot = None;
                return Vec::new();
            }
        };

        *snapshot = Some(Snapshot {
            taken_at: Instant::now(),
            streams: streams.clone(),
        });
        streams
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    fn resolver(backend: &Arc<MemoryBackend>) -> AudioSessionResolver {
        AudioSessionResolver::with_snapshot_ttl(backend.clone(), Duration::ZERO)
    }

    #[test]
    fn test_active_owners_deduplicated_in_order() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_stream("spotify.exe", 0.3, 1.0);
        backend.add_stream("chrome.exe", 0.0, 1.0);
        backend.add_stream("discord.exe", 0.1, 1.0);
        backend.add_stream("spotify.exe", 0.2, 1.0);

        let resolver = resolver(&backend);
        assert_eq!(
            resolver.list_active_stream_owners(),
            vec!["spotify.exe".to_string(), "discord.exe".to_string()]
        );
    }

    #[test]
    fn test_resolve_returns_all_streams_of_process() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_stream("chrome.exe", 0.5, 1.0);
        backend.add_stream("chrome.exe", 0.0, 1.0);
        backend.add_stream("vlc.exe", 0.5, 1.0);

        let resolver = resolver(&backend);
        assert_eq!(resolver.resolve("chrome.exe").len(), 2);
        assert_eq!(resolver.resolve("vlc.exe").len(), 1);
    }

    #[test]
    fn test_resolve_silent_or_missing_process_is_empty() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_stream("chrome.exe", 0.0, 1.0);

        let resolver = resolver(&backend);
        assert!(resolver.resolve("chrome.exe").is_empty());
        assert!(resolver.resolve("vlc.exe").is_empty());
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_stream("Spotify.exe", 0.4, 1.0);

        let resolver = resolver(&backend);
        assert!(resolver.resolve("spotify.exe").is_empty());
        assert_eq!(resolver.resolve("Spotify.exe").len(), 1);
    }

    #[test]
    fn test_snapshot_reused_within_ttl() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_stream("chrome.exe", 0.5, 1.0);

        let resolver =
            AudioSessionResolver::with_snapshot_ttl(backend.clone(), Duration::from_secs(60));
        resolver.list_active_stream_owners();
        resolver.resolve("chrome.exe");
        assert_eq!(backend.enumerations(), 1);

        resolver.invalidate();
        resolver.resolve("chrome.exe");
        assert_eq!(backend.enumerations(), 2);
    }

    #[test]
    fn test_zero_ttl_always_reenumerates() {
        let backend = Arc::new(MemoryBackend::new());
        let resolver = resolver(&backend);
        resolver.list_active_stream_owners();
        resolver.list_active_stream_owners();
        assert_eq!(backend.enumerations(), 2);
    }
}
