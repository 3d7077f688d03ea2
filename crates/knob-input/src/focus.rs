//! Foreground process lookup.

use std::sync::Arc;

use parking_lot::Mutex;

/// Reports the executable name of the process owning the foreground window.
pub trait FocusProvider: Send + Sync {
    /// `None` if there is no foreground window or its process cannot be read.
    fn focused_process_name(&self) -> Option<String>;
}

/// A focus provider that reports a settable value.
#[derive(Debug, Default)]
pub struct FixedFocus {
    name: Mutex<Option<String>>,
}

impl FixedFocus {
    /// Create a provider reporting `name`.
    pub fn new(name: Option<&str>) -> Self {
        Self {
            name: Mutex::new(name.map(str::to_string)),
        }
    }

    /// Change the reported process.
    pub fn set(&self, name: Option<&str>) {
        *self.name.lock() = name.map(str::to_string);
    }
}

impl FocusProvider for FixedFocus {
    fn focused_process_name(&self) -> Option<String> {
        self.name.lock().clone()
    }
}

/// Foreground window lookup through the Windows API.
#[cfg(windows)]
#[derive(Debug, Default)]
pub struct WindowsFocus;

#[cfg(windows)]
impl FocusProvider for WindowsFocus {
    fn focused_process_name(&self) -> Option<String> {
        use windows::Win32::UI::WindowsAndMessaging::{
            GetForegroundWindow, GetWindowThreadProcessId,
        };

        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.0.is_null() {
            return None;
        }

        let mut pid = 0u32;
        unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
        if pid == 0 {
            return None;
        }

        let name = knob_audio::process_name(pid);
        tracing::trace!(pid, ?name, "Foreground process");
        name
    }
}

/// The focus provider for this platform.
#[cfg(windows)]
pub fn system_focus() -> Arc<dyn FocusProvider> {
    Arc::new(WindowsFocus)
}

/// The focus provider for this platform.
#[cfg(not(windows))]
pub fn system_focus() -> Arc<dyn FocusProvider> {
    Arc::new(FixedFocus::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_focus() {
        let focus = FixedFocus::new(Some("spotify.exe"));
        assert_eq!(focus.focused_process_name().as_deref(), Some("spotify.exe"));
        focus.set(None);
        assert_eq!(focus.focused_process_name(), None);
    }
}
