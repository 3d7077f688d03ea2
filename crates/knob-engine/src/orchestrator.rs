//! Engine command loop.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use knob_audio::ComScope;
use knob_ipc::{EngineCommand, EngineEvent, HotkeyAction};
use tracing::{debug, info, instrument, warn};

use crate::error::EngineError;
use crate::profile::MixerProfile;
use crate::EngineResult;

/// Executes hotkey commands against a [`MixerProfile`], in arrival order.
pub struct Engine {
    command_rx: Receiver<EngineCommand>,
    event_tx: Sender<EngineEvent>,
    profile: MixerProfile,
}

impl Engine {
    /// Create a new engine.
    pub fn new(
        profile: MixerProfile,
        command_rx: Receiver<EngineCommand>,
        event_tx: Sender<EngineEvent>,
    ) -> Self {
        Self {
            command_rx,
            event_tx,
            profile,
        }
    }

    /// The profile this engine drives.
    pub fn profile(&self) -> &MixerProfile {
        &self.profile
    }

    /// Run the engine (blocking).
    #[instrument(name = "engine_run", skip(self))]
    pub fn run(&mut self) {
        info!("Engine starting");
        let _com = match ComScope::enter() {
            Ok(scope) => Some(scope),
            Err(e) => {
                warn!(error = %e, "Audio subsystem unavailable on engine thread");
                None
            }
        };
        self.send_event(EngineEvent::Ready);

        loop {
            match self.command_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Command channel disconnected, shutting down");
                    self.profile.shutdown();
                    break;
                }
            }
        }

        info!("Engine stopped");
    }

    /// Handle a command. Returns false if engine should stop.
    fn handle_command(&mut self, command: EngineCommand) -> bool {
        debug!(?command, "Handling command");

        match command {
            EngineCommand::Action(HotkeyAction::Quit) => {
                info!("Quit requested");
                self.send_event(EngineEvent::QuitRequested);
            }
            EngineCommand::Action(action) => {
                let previous = self.profile.current_target();
                self.profile.handle_action(action);
                let current = self.profile.current_target();
                if current != previous {
                    self.send_event(EngineEvent::TargetChanged { previous, current });
                }
            }
            EngineCommand::Shutdown => {
                self.profile.shutdown();
                self.send_event(EngineEvent::Shutdown);
                return false;
            }
        }

        true
    }

    fn send_event(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}

/// Run an engine on its own thread.
pub fn spawn_engine(mut engine: Engine) -> EngineResult<JoinHandle<()>> {
    thread::Builder::new()
        .name("knob-engine".to_string())
        .spawn(move || engine.run())
        .map_err(|source| EngineError::Thread {
            name: "engine",
            source,
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use knob_audio::{AudioSessionResolver, MemoryBackend, SystemAudioEndpoint};
    use knob_input::FixedFocus;
    use knob_ipc::{command_channel, display_channel, event_channel, TargetId};

    use super::*;
    use crate::profile::MixerSettings;

    fn engine_with_backend() -> (
        Arc<MemoryBackend>,
        Sender<EngineCommand>,
        Receiver<EngineEvent>,
        JoinHandle<()>,
    ) {
        let backend = Arc::new(MemoryBackend::new());
        let resolver = Arc::new(AudioSessionResolver::with_snapshot_ttl(
            backend.clone(),
            Duration::ZERO,
        ));
        let system = Arc::new(SystemAudioEndpoint::new(backend.clone()));
        let (display_tx, _display_rx) = display_channel();
        let profile = MixerProfile::with_parts(
            MixerSettings::default(),
            resolver,
            system,
            Arc::new(FixedFocus::default()),
            display_tx,
        )
        .unwrap();

        let (command_tx, command_rx) = command_channel();
        let (event_tx, event_rx) = event_channel();
        let handle = spawn_engine(Engine::new(profile, command_rx, event_tx)).unwrap();
        (backend, command_tx, event_rx, handle)
    }

    fn next_event(rx: &Receiver<EngineEvent>) -> EngineEvent {
        rx.recv_timeout(Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_engine_lifecycle() {
        let (_backend, commands, events, handle) = engine_with_backend();
        assert_eq!(next_event(&events), EngineEvent::Ready);

        commands.send(EngineCommand::Shutdown).unwrap();
        assert_eq!(next_event(&events), EngineEvent::Shutdown);
        handle.join().unwrap();
    }

    #[test]
    fn test_quit_emits_event() {
        let (_backend, commands, events, handle) = engine_with_backend();
        assert_eq!(next_event(&events), EngineEvent::Ready);

        commands
            .send(EngineCommand::Action(HotkeyAction::Quit))
            .unwrap();
        assert_eq!(next_event(&events), EngineEvent::QuitRequested);

        commands.send(EngineCommand::Shutdown).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_actions_applied_in_order() {
        let (backend, commands, events, handle) = engine_with_backend();
        let stream = backend.add_stream("chrome.exe", 0.5, 0.5);
        assert_eq!(next_event(&events), EngineEvent::Ready);

        for _ in 0..3 {
            commands
                .send(EngineCommand::Action(HotkeyAction::VolumeDown))
                .unwrap();
        }
        commands
            .send(EngineCommand::Action(HotkeyAction::SwitchToSystem))
            .unwrap();
        commands.send(EngineCommand::Shutdown).unwrap();

        assert_eq!(
            next_event(&events),
            EngineEvent::TargetChanged {
                previous: TargetId::parse("chrome.exe"),
                current: TargetId::System,
            }
        );
        assert_eq!(next_event(&events), EngineEvent::Shutdown);
        handle.join().unwrap();

        // 0.5 -> 0.45 -> 0.40 -> 0.35
        assert!((stream.level() - 0.35).abs() < 1e-4);
    }

    #[test]
    fn test_disconnect_stops_engine() {
        let (_backend, commands, events, handle) = engine_with_backend();
        assert_eq!(next_event(&events), EngineEvent::Ready);
        drop(commands);
        handle.join().unwrap();
    }
}
