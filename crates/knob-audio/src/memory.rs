//! In-memory mixer for tests.
//!
//! Compiled for this crate's tests and, for dependents, behind the
//! `test-util` feature.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{AudioBackend, AudioStream, VolumeControl};
use crate::error::AudioError;
use crate::AudioResult;

/// A volume scalar held in memory.
#[derive(Debug)]
pub struct MemoryControl {
    level: Mutex<f32>,
    failing: AtomicBool,
}

impl MemoryControl {
    /// Create a control at the given level.
    pub fn new(level: f32) -> Self {
        Self {
            level: Mutex::new(level),
            failing: AtomicBool::new(false),
        }
    }

    /// Current level, ignoring the failure flag.
    pub fn level(&self) -> f32 {
        *self.level.lock()
    }

    /// Overwrite the level, ignoring the failure flag.
    pub fn set_level(&self, level: f32) {
        *self.level.lock() = level;
    }

    /// Make every subsequent call fail, as a released native handle would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> AudioResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(AudioError::HandleInvalidated("memory control".to_string()))
        } else {
            Ok(())
        }
    }
}

impl VolumeControl for MemoryControl {
    fn volume(&self) -> AudioResult<f32> {
        self.check()?;
        Ok(self.level())
    }

    fn set_volume(&self, level: f32) -> AudioResult<()> {
        self.check()?;
        self.set_level(level);
        Ok(())
    }
}

struct MemoryStream {
    process_name: String,
    peak: f32,
    control: Arc<MemoryControl>,
}

struct MemoryState {
    streams: Vec<MemoryStream>,
    endpoint: Arc<MemoryControl>,
    endpoint_opens: usize,
    fail_endpoint_opens: usize,
    enumerations: usize,
}

/// An [`AudioBackend`] whose streams and endpoint are plain values.
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    /// Create a mixer with no streams and the system volume at 1.0.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                streams: Vec::new(),
                endpoint: Arc::new(MemoryControl::new(1.0)),
                endpoint_opens: 0,
                fail_endpoint_opens: 0,
                enumerations: 0,
            }),
        }
    }

    /// Add a stream and return its control.
    pub fn add_stream(&self, process_name: &str, peak: f32, level: f32) -> Arc<MemoryControl> {
        let control = Arc::new(MemoryControl::new(level));
        self.state.lock().streams.push(MemoryStream {
            process_name: process_name.to_string(),
            peak,
            control: Arc::clone(&control),
        });
        control
    }

    /// Set the peak of every stream owned by a process.
    pub fn set_peak(&self, process_name: &str, peak: f32) {
        let mut state = self.state.lock();
        for stream in state
            .streams
            .iter_mut()
            .filter(|s| s.process_name == process_name)
        {
            stream.peak = peak;
        }
    }

    /// Remove every stream owned by a process.
    pub fn remove_process(&self, process_name: &str) {
        self.state
            .lock()
            .streams
            .retain(|s| s.process_name != process_name);
    }

    /// Control behind the current system endpoint.
    pub fn system_control(&self) -> Arc<MemoryControl> {
        Arc::clone(&self.state.lock().endpoint)
    }

    /// Swap in a new default output device at the given level.
    pub fn replace_system_endpoint(&self, level: f32) -> Arc<MemoryControl> {
        let control = Arc::new(MemoryControl::new(level));
        self.state.lock().endpoint = Arc::clone(&control);
        control
    }

    /// Make the next endpoint open fail.
    pub fn fail_next_endpoint_open(&self) {
        self.state.lock().fail_endpoint_opens += 1;
    }

    /// Number of successful endpoint opens.
    pub fn endpoint_opens(&self) -> usize {
        self.state.lock().endpoint_opens
    }

    /// Number of stream enumerations performed.
    pub fn enumerations(&self) -> usize {
        self.state.lock().enumerations
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for MemoryBackend {
    fn streams(&self) -> AudioResult<Vec<AudioStream>> {
        let mut state = self.state.lock();
        state.enumerations += 1;
        Ok(state
            .streams
            .iter()
            .map(|s| AudioStream {
                process_name: s.process_name.clone(),
                peak: s.peak,
                handle: Arc::clone(&s.control) as Arc<dyn VolumeControl>,
            })
            .collect())
    }

    fn open_system_endpoint(&self) -> AudioResult<Box<dyn VolumeControl>> {
        let mut state = self.state.lock();
        if state.fail_endpoint_opens > 0 {
            state.fail_endpoint_opens -= 1;
            return Err(AudioError::EndpointUnavailable(
                "no default output device".to_string(),
            ));
        }
        state.endpoint_opens += 1;
        Ok(Box::new(Arc::clone(&state.endpoint)))
    }
}
