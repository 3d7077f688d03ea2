//! The platform mixer seam.

use std::fmt;
use std::sync::Arc;

use crate::AudioResult;

/// A native volume scalar in [0, 1].
///
/// Implemented for per-process streams and for the system output endpoint.
pub trait VolumeControl: Send + Sync {
    /// Read the current volume.
    fn volume(&self) -> AudioResult<f32>;

    /// Apply a volume level.
    fn set_volume(&self, level: f32) -> AudioResult<()>;
}

impl<T: VolumeControl + ?Sized> VolumeControl for Arc<T> {
    fn volume(&self) -> AudioResult<f32> {
        (**self).volume()
    }

    fn set_volume(&self, level: f32) -> AudioResult<()> {
        (**self).set_volume(level)
    }
}

/// One audio stream as reported by the platform mixer.
#[derive(Clone)]
pub struct AudioStream {
    /// Executable name of the owning process (e.g. "chrome.exe").
    pub process_name: String,

    /// Instantaneous peak signal, 0.0 when silent.
    pub peak: f32,

    /// Volume handle for this stream.
    pub handle: Arc<dyn VolumeControl>,
}

impl AudioStream {
    /// Returns true if the stream is currently producing audible output.
    pub fn is_audible(&self) -> bool {
        self.peak > 0.0
    }
}

impl fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioStream")
            .field("process_name", &self.process_name)
            .field("peak", &self.peak)
            .finish_non_exhaustive()
    }
}

/// A platform audio mixer.
pub trait AudioBackend: Send + Sync {
    /// Enumerate every stream on the default render device, in discovery order.
    fn streams(&self) -> AudioResult<Vec<AudioStream>>;

    /// Open a volume handle on the current default output device.
    fn open_system_endpoint(&self) -> AudioResult<Box<dyn VolumeControl>>;
}
