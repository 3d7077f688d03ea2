//! knob application wiring.
//!
//! Loads the configuration, starts the engine thread and the keyboard hook,
//! and runs the overlay loop on the main thread until the quit hotkey or
//! Ctrl-C is pressed.

pub mod cli;
pub mod config;
pub mod interrupt;
pub mod logging;
pub mod overlay;

use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};
use knob_engine::{
    key_dispatcher, spawn_engine, Engine, HotkeyBindingTable, MixerProfile, MixerSettings,
};
use knob_input::install_keyboard_hook;
use knob_ipc::{
    command_channel, display_channel, event_channel, EngineCommand, EngineEvent, HotkeyAction,
};
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::config::ConfigError;
use crate::interrupt::ShutdownFlag;
use crate::overlay::{LogSurface, Overlay, OverlayOptions, OverlaySurface};

/// Run the application until the quit hotkey or Ctrl-C is pressed.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let settings = match config::load_or_create(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init_logging(cli.debug, None)?;
            return Err(e.into());
        }
    };

    let debug = cli.debug || settings.debug;
    let log_file = debug.then(|| config::debug_log_path(&config_path));
    if let Err(e) = logging::init_logging(debug, log_file.as_deref()) {
        logging::init_logging(debug, None)?;
        warn!("{e:#}");
    }

    info!("Starting knob v{}", env!("CARGO_PKG_VERSION"));
    debug!(path = %config_path.display(), "Configuration loaded");

    let bindings = HotkeyBindingTable::from_settings(&settings).map_err(ConfigError::from)?;
    if let Some(quit) = bindings.binding(HotkeyAction::Quit) {
        let suffix = if quit.is_scan_code() { " (scan code)" } else { "" };
        info!("Press '{quit}'{suffix} to exit.");
    }

    let Some(backend) = knob_audio::create_backend() else {
        anyhow::bail!("knob is only supported on Windows");
    };

    let (command_tx, command_rx) = command_channel();
    let (event_tx, event_rx) = event_channel();
    let (display_tx, display_rx) = display_channel();

    let profile = MixerProfile::new(
        MixerSettings::from_settings(&settings),
        backend,
        knob_input::system_focus(),
        display_tx,
    )?;
    let engine = spawn_engine(Engine::new(profile, command_rx, event_tx))?;

    let hook = match install_keyboard_hook(key_dispatcher(Arc::new(bindings), command_tx.clone()))
    {
        Ok(hook) => hook,
        Err(e) => {
            stop_engine(&command_tx, engine);
            return Err(e).context("Failed to install keyboard hook");
        }
    };

    let interrupted = ShutdownFlag::new();
    if let Err(e) = interrupt::install_console_handler(&interrupted) {
        warn!("{e:#}");
    }

    let options = OverlayOptions::from_settings(&settings, cli.debug);
    let mut overlay = Overlay::new(display_rx, create_surface(&options), options);
    overlay.run_until(|| {
        interrupted.is_raised() || quit_requested(&event_rx) || engine.is_finished()
    });

    if interrupted.is_raised() {
        info!("Interrupted");
    }
    info!("Shutting down");
    stop_engine(&command_tx, engine);
    if let Err(e) = overlay.close() {
        warn!("Failed to close overlay: {}", e);
    }
    drop(hook);

    info!("Goodbye");
    Ok(())
}

/// Drain engine events; returns true once the engine asks to quit or stops.
fn quit_requested(events: &Receiver<EngineEvent>) -> bool {
    let mut quit = false;
    for event in events.try_iter() {
        match event {
            EngineEvent::Ready => debug!("Engine ready"),
            EngineEvent::TargetChanged { previous, current } => {
                debug!(%previous, %current, "Target changed");
            }
            EngineEvent::QuitRequested | EngineEvent::Shutdown => quit = true,
        }
    }
    quit
}

fn stop_engine(commands: &Sender<EngineCommand>, engine: JoinHandle<()>) {
    if !engine.is_finished() {
        let _ = commands.send(EngineCommand::Shutdown);
    }
    if engine.join().is_err() {
        warn!("Engine thread panicked");
    }
}

#[cfg(windows)]
fn create_surface(options: &OverlayOptions) -> Box<dyn OverlaySurface> {
    if options.visible {
        match overlay::GdiSurface::new() {
            Ok(surface) => return Box::new(surface),
            Err(e) => warn!("Overlay window unavailable, logging updates instead: {}", e),
        }
    }
    Box::new(LogSurface::default())
}

#[cfg(not(windows))]
fn create_surface(_options: &OverlayOptions) -> Box<dyn OverlaySurface> {
    Box::new(LogSurface::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_requested_drains_events() {
        let (tx, rx) = event_channel();
        tx.send(EngineEvent::Ready).unwrap();
        tx.send(EngineEvent::TargetChanged {
            previous: knob_ipc::TargetId::System,
            current: knob_ipc::TargetId::parse("vlc.exe"),
        })
        .unwrap();
        assert!(!quit_requested(&rx));

        tx.send(EngineEvent::QuitRequested).unwrap();
        assert!(quit_requested(&rx));
        assert!(rx.is_empty());
    }
}
