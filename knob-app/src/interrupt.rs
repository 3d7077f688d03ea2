//! Console interrupt handling.
//!
//! Ctrl-C and Ctrl-Break raise a [`ShutdownFlag`] instead of killing the
//! process, so the main loop can run the ordered shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// A shared flag set once shutdown has been requested.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once shutdown has been requested.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

static CONSOLE_FLAG: OnceLock<ShutdownFlag> = OnceLock::new();

/// Raise `flag` when the console delivers Ctrl-C or Ctrl-Break.
///
/// Only one flag can be registered per process.
#[cfg(windows)]
pub fn install_console_handler(flag: &ShutdownFlag) -> anyhow::Result<()> {
    use anyhow::Context;
    use windows::Win32::System::Console::SetConsoleCtrlHandler;

    if CONSOLE_FLAG.set(flag.clone()).is_err() {
        anyhow::bail!("Console control handler already installed");
    }
    unsafe { SetConsoleCtrlHandler(Some(console_ctrl_handler), true) }
        .context("Failed to install console control handler")?;
    tracing::debug!("Console control handler installed");
    Ok(())
}

/// Raise `flag` when the console delivers Ctrl-C or Ctrl-Break.
///
/// Only one flag can be registered per process.
#[cfg(not(windows))]
pub fn install_console_handler(flag: &ShutdownFlag) -> anyhow::Result<()> {
    if CONSOLE_FLAG.set(flag.clone()).is_err() {
        anyhow::bail!("Console control handler already installed");
    }
    tracing::debug!("Console control events are not available on this platform");
    Ok(())
}

#[cfg(windows)]
unsafe extern "system" fn console_ctrl_handler(ctrl_type: u32) -> windows::Win32::Foundation::BOOL {
    use windows::Win32::Foundation::BOOL;
    use windows::Win32::System::Console::{CTRL_BREAK_EVENT, CTRL_C_EVENT};

    match ctrl_type {
        CTRL_C_EVENT | CTRL_BREAK_EVENT => {
            if let Some(flag) = CONSOLE_FLAG.get() {
                flag.raise();
            }
            BOOL(1)
        }
        _ => BOOL(0),
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use knob_ipc::display_channel;

    use super::*;
    use crate::overlay::{LogSurface, Overlay, OverlayOptions};

    #[test]
    fn test_flag_is_shared_between_clones() {
        let flag = ShutdownFlag::new();
        let handler_copy = flag.clone();
        assert!(!flag.is_raised());

        handler_copy.raise();
        assert!(flag.is_raised());
    }

    #[test]
    fn test_raised_flag_ends_overlay_loop() {
        let (_tx, rx) = display_channel();
        let mut overlay = Overlay::new(rx, Box::new(LogSurface::default()), OverlayOptions::default());
        let flag = ShutdownFlag::new();

        let raiser = {
            let flag = flag.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                flag.raise();
            })
        };

        let started = Instant::now();
        overlay.run_until(|| flag.is_raised());
        raiser.join().unwrap();

        assert!(flag.is_raised());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
