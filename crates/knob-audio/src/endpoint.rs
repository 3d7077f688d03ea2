//! Lazily opened system output endpoint.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::{debug, instrument, warn};

use crate::backend::{AudioBackend, VolumeControl};
use crate::com::ComScope;

/// Volume control for the default output device.
///
/// The native handle is opened on first use and discarded whenever a call
/// through it fails, so the next access reopens it on the current default
/// device. All failures surface as `None`.
pub struct SystemAudioEndpoint {
    backend: Arc<dyn AudioBackend>,
    control: ReentrantMutex<RefCell<Option<Box<dyn VolumeControl>>>>,
}

impl SystemAudioEndpoint {
    /// Create an endpoint that opens its handle on first use.
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            control: ReentrantMutex::new(RefCell::new(None)),
        }
    }

    /// Returns true if a native handle is currently held.
    pub fn is_initialized(&self) -> bool {
        self.control.lock().borrow().is_some()
    }

    /// Open the native handle if it is not held yet.
    ///
    /// Returns false, with any partial state released, if the device could
    /// not be opened.
    #[instrument(name = "system_endpoint_initialize", skip(self))]
    pub fn initialize(&self) -> bool {
        let guard = self.control.lock();
        if guard.borrow().is_some() {
            return true;
        }

        let _com = match ComScope::enter() {
            Ok(scope) => scope,
            Err(e) => {
                warn!(error = %e, "COM unavailable for system endpoint");
                return false;
            }
        };

        match self.backend.open_system_endpoint() {
            Ok(control) => {
                *guard.borrow_mut() = Some(control);
                debug!("System endpoint opened");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to open system endpoint");
                drop(guard);
                self.cleanup();
                false
            }
        }
    }

    /// Read the system volume.
    pub fn volume(&self) -> Option<f32> {
        let guard = self.control.lock();
        if !self.initialize() {
            return None;
        }

        let _com = ComScope::enter().ok()?;
        let result = guard.borrow().as_ref().map(|control| control.volume());
        match result {
            Some(Ok(level)) => Some(level),
            Some(Err(e)) => {
                warn!(error = %e, "Failed to read system volume");
                self.cleanup();
                None
            }
            None => None,
        }
    }

    /// Apply a system volume level, returning the level that was set.
    pub fn set_volume(&self, level: f32) -> Option<f32> {
        let guard = self.control.lock();
        if !self.initialize() {
            return None;
        }

        let _com = ComScope::enter().ok()?;
        let result = guard
            .borrow()
            .as_ref()
            .map(|control| control.set_volume(level));
        match result {
            Some(Ok(())) => Some(level),
            Some(Err(e)) => {
                warn!(error = %e, level, "Failed to set system volume");
                self.cleanup();
                None
            }
            None => None,
        }
    }

    /// Release the native handle. The next access reopens it.
    pub fn cleanup(&self) {
        let guard = self.control.lock();
        if guard.borrow_mut().take().is_some() {
            debug!("System endpoint released");
        }
    }
}

impl Drop for SystemAudioEndpoint {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    #[test]
    fn test_lazy_initialization() {
        let backend = Arc::new(MemoryBackend::new());
        let endpoint = SystemAudioEndpoint::new(backend.clone());
        assert!(!endpoint.is_initialized());
        assert_eq!(backend.endpoint_opens(), 0);

        backend.system_control().set_level(0.4);
        assert_eq!(endpoint.volume(), Some(0.4));
        assert!(endpoint.is_initialized());

        endpoint.volume();
        assert_eq!(backend.endpoint_opens(), 1);
    }

    #[test]
    fn test_set_volume_returns_level() {
        let backend = Arc::new(MemoryBackend::new());
        let endpoint = SystemAudioEndpoint::new(backend.clone());
        assert_eq!(endpoint.set_volume(0.7), Some(0.7));
        assert_eq!(backend.system_control().level(), 0.7);
    }

    #[test]
    fn test_open_failure_returns_none_then_recovers() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_next_endpoint_open();
        let endpoint = SystemAudioEndpoint::new(backend.clone());

        assert_eq!(endpoint.volume(), None);
        assert!(!endpoint.is_initialized());

        assert_eq!(endpoint.set_volume(0.3), Some(0.3));
        assert!(endpoint.is_initialized());
    }

    #[test]
    fn test_call_failure_drops_handle_and_reopens() {
        let backend = Arc::new(MemoryBackend::new());
        let endpoint = SystemAudioEndpoint::new(backend.clone());
        assert!(endpoint.initialize());

        let stale = backend.system_control();
        let fresh = backend.replace_system_endpoint(0.6);
        stale.set_failing(true);

        assert_eq!(endpoint.volume(), None);
        assert!(!endpoint.is_initialized());

        assert_eq!(endpoint.volume(), Some(0.6));
        assert_eq!(fresh.level(), 0.6);
        assert_eq!(backend.endpoint_opens(), 2);
    }
}
