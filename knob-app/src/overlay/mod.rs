//! On-screen volume overlay.
//!
//! The engine posts [`DisplayUpdate`]s to a bounded channel; the overlay
//! drains it on the main thread, renders the newest one and hides itself
//! after a period without updates.

#[cfg(windows)]
mod gdi;

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use knob_ipc::{DisplayLevel, DisplayUpdate, Settings};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

#[cfg(windows)]
pub use gdi::GdiSurface;

/// Interval between overlay ticks.
pub const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Errors raised by an overlay surface.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Windows API error.
    #[error("Windows API error: {message}")]
    WindowsApi {
        message: String,
        #[cfg(windows)]
        #[source]
        source: Option<windows::core::Error>,
    },

    /// The surface was used after `close`.
    #[error("Overlay surface is closed")]
    Closed,
}

#[cfg(windows)]
impl From<windows::core::Error> for OverlayError {
    fn from(err: windows::core::Error) -> Self {
        Self::WindowsApi {
            message: err.message().to_string(),
            source: Some(err),
        }
    }
}

/// Something the overlay can draw on.
pub trait OverlaySurface {
    /// Show `label` with a level bar, bringing the surface up if hidden.
    fn show(&mut self, label: &str, level: &DisplayLevel) -> Result<(), OverlayError>;

    /// Hide the surface.
    fn hide(&mut self) -> Result<(), OverlayError>;

    /// Process pending window messages.
    fn pump(&mut self) {}

    /// Release the surface. Further calls fail with [`OverlayError::Closed`].
    fn close(&mut self) -> Result<(), OverlayError>;
}

/// Writes overlay updates to the log instead of the screen.
#[derive(Debug, Default)]
pub struct LogSurface {
    closed: bool,
}

impl OverlaySurface for LogSurface {
    fn show(&mut self, label: &str, level: &DisplayLevel) -> Result<(), OverlayError> {
        if self.closed {
            return Err(OverlayError::Closed);
        }
        info!("{label}: {}", level.text());
        Ok(())
    }

    fn hide(&mut self) -> Result<(), OverlayError> {
        if self.closed {
            return Err(OverlayError::Closed);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), OverlayError> {
        self.closed = true;
        Ok(())
    }
}

/// Overlay behavior switches.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayOptions {
    /// Render updates at all.
    pub visible: bool,

    /// Time without updates before hiding.
    pub timeout: Duration,

    /// Append the session index to the label.
    pub debug: bool,
}

impl OverlayOptions {
    /// Derive options from settings; `debug` also covers the command line flag.
    pub fn from_settings(settings: &Settings, debug: bool) -> Self {
        Self {
            visible: settings.show_overlay,
            timeout: Duration::from_millis(
                (settings.overlay_timeout_secs.max(0.0) * 1000.0).round() as u64,
            ),
            debug: debug || settings.debug,
        }
    }
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), false)
    }
}

/// Consumer side of the display channel.
pub struct Overlay {
    updates: Receiver<DisplayUpdate>,
    surface: Box<dyn OverlaySurface>,
    options: OverlayOptions,
    shown_at: Option<Instant>,
}

impl Overlay {
    pub fn new(
        updates: Receiver<DisplayUpdate>,
        surface: Box<dyn OverlaySurface>,
        options: OverlayOptions,
    ) -> Self {
        Self {
            updates,
            surface,
            options,
            shown_at: None,
        }
    }

    /// Returns true while the surface is showing an update.
    pub fn is_shown(&self) -> bool {
        self.shown_at.is_some()
    }

    /// Drain pending updates, render the newest and hide on timeout.
    ///
    /// Returns true if something was rendered.
    pub fn tick(&mut self, now: Instant) -> Result<bool, OverlayError> {
        let latest = self.updates.try_iter().last();

        if let Some(update) = latest {
            if !self.options.visible {
                trace!(label = %update.label, "Overlay hidden, dropping update");
                return Ok(false);
            }

            let label = if self.options.debug {
                update.debug_label()
            } else {
                update.label.clone()
            };
            self.surface.show(&label, &update.level)?;
            self.shown_at = Some(now);
            return Ok(true);
        }

        if let Some(shown_at) = self.shown_at {
            if now.saturating_duration_since(shown_at) >= self.options.timeout {
                self.surface.hide()?;
                self.shown_at = None;
                trace!("Overlay hidden after timeout");
            }
        }
        Ok(false)
    }

    /// Run the overlay loop on the calling thread until `should_quit` returns true.
    pub fn run_until(&mut self, mut should_quit: impl FnMut() -> bool) {
        debug!("Overlay loop started");
        loop {
            self.surface.pump();
            if let Err(e) = self.tick(Instant::now()) {
                warn!("Overlay update failed: {}", e);
            }
            if should_quit() {
                break;
            }
            thread::sleep(TICK_INTERVAL);
        }
        debug!("Overlay loop stopped");
    }

    /// Hide and release the surface.
    pub fn close(&mut self) -> Result<(), OverlayError> {
        self.shown_at = None;
        self.surface.close()
    }
}
