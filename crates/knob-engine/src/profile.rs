//! The mixer profile: current target, fallback, cycling and revert.

use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, TrySendError};
use knob_audio::{AudioBackend, AudioSessionResolver, AudioTarget, SystemAudioEndpoint};
use knob_input::FocusProvider;
use knob_ipc::{DisplayUpdate, HotkeyAction, KeyDisposition, KeyEvent, Settings, TargetId};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace, warn};

use crate::bindings::HotkeyBindingTable;
use crate::step::{volume_down_level, volume_up_level};
use crate::timer::RevertTimer;
use crate::EngineResult;

/// Tunables for a [`MixerProfile`].
#[derive(Debug, Clone, PartialEq)]
pub struct MixerSettings {
    /// Target restored after the revert delay.
    pub default_target: TargetId,

    /// Smallest per-press delta.
    pub min_step: f32,

    /// Largest per-press delta.
    pub max_step: f32,

    /// Fall back to the system output when nothing plays audio.
    pub system_fallback: bool,

    /// Idle time before reverting to the default target.
    pub revert_delay: Duration,

    /// Minimum time between accepted cycle presses.
    pub cycle_debounce: Duration,
}

impl MixerSettings {
    /// Derive the tunables from the `[settings]` table.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_target: TargetId::parse(&settings.default_process),
            min_step: settings.volume_step_min,
            max_step: settings.volume_step_max,
            system_fallback: settings.change_system_vol_if_no_audio,
            revert_delay: seconds(settings.revert_delay_secs),
            cycle_debounce: seconds(settings.cycle_debounce_secs),
        }
    }
}

/// Whole milliseconds, so 0.3 reads as exactly 300 ms.
fn seconds(value: f32) -> Duration {
    Duration::from_millis((value.max(0.0) * 1000.0).round() as u64)
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

struct MixerState {
    target: AudioTarget,
    cycle_index: usize,
    last_cycle: Option<Instant>,
    last_session_change: Instant,
}

struct Shared {
    settings: MixerSettings,
    resolver: Arc<AudioSessionResolver>,
    system: Arc<SystemAudioEndpoint>,
    focus: Arc<dyn FocusProvider>,
    display: Sender<DisplayUpdate>,
    state: Mutex<MixerState>,
    timer: RevertTimer,
}

/// Owns the current volume target and executes hotkey actions against it.
///
/// Cheap to clone; clones share state. Actions run on the caller's thread
/// and the revert runs on the timer thread, serialized by one state lock.
#[derive(Clone)]
pub struct MixerProfile {
    shared: Arc<Shared>,
}

impl MixerProfile {
    /// Create a profile on top of a platform backend.
    pub fn new(
        settings: MixerSettings,
        backend: Arc<dyn AudioBackend>,
        focus: Arc<dyn FocusProvider>,
        display: Sender<DisplayUpdate>,
    ) -> EngineResult<Self> {
        let resolver = Arc::new(AudioSessionResolver::new(Arc::clone(&backend)));
        let system = Arc::new(SystemAudioEndpoint::new(backend));
        Self::with_parts(settings, resolver, system, focus, display)
    }

    /// Create a profile from an existing resolver and system endpoint.
    pub fn with_parts(
        settings: MixerSettings,
        resolver: Arc<AudioSessionResolver>,
        system: Arc<SystemAudioEndpoint>,
        focus: Arc<dyn FocusProvider>,
        display: Sender<DisplayUpdate>,
    ) -> EngineResult<Self> {
        let owner: Arc<OnceLock<Weak<Shared>>> = Arc::new(OnceLock::new());
        let timer = RevertTimer::spawn({
            let owner = Arc::clone(&owner);
            move |generation| {
                if let Some(shared) = owner.get().and_then(Weak::upgrade) {
                    shared.revert_if_current(generation);
                }
            }
        })?;

        let target = AudioTarget::new(
            settings.default_target.clone(),
            Arc::clone(&resolver),
            Arc::clone(&system),
        );
        info!(target_id = %settings.default_target, "Mixer profile ready");

        let shared = Arc::new(Shared {
            settings,
            resolver,
            system,
            focus,
            display,
            state: Mutex::new(MixerState {
                target,
                cycle_index: 0,
                last_cycle: None,
                last_session_change: Instant::now(),
            }),
            timer,
        });
        let _ = owner.set(Arc::downgrade(&shared));

        Ok(Self { shared })
    }

    /// The profile's tunables.
    pub fn settings(&self) -> &MixerSettings {
        &self.shared.settings
    }

    /// Identifier of the current target.
    pub fn current_target(&self) -> TargetId {
        self.shared.state.lock().target.id().clone()
    }

    /// Position of the current target in the last cycled source list.
    pub fn cycle_index(&self) -> usize {
        self.shared.state.lock().cycle_index
    }

    /// When the target last changed.
    pub fn last_session_change(&self) -> Instant {
        self.shared.state.lock().last_session_change
    }

    /// Current target's volume, `None` if it has no audio.
    pub fn current_volume(&self) -> Option<f32> {
        self.shared.state.lock().target.volume()
    }

    /// Dispatch a key event synchronously.
    ///
    /// Bound key presses other than quit are executed and suppressed;
    /// everything else passes through.
    pub fn handle_volume_keys(
        &self,
        event: &KeyEvent,
        bindings: &HotkeyBindingTable,
    ) -> KeyDisposition {
        if !event.is_down() {
            return KeyDisposition::PassThrough;
        }
        match bindings.lookup(event) {
            Some(HotkeyAction::Quit) | None => KeyDisposition::PassThrough,
            Some(action) => {
                self.handle_action(action);
                KeyDisposition::Suppress
            }
        }
    }

    /// Execute one hotkey action. Quit is left to the caller.
    #[instrument(name = "handle_action", skip(self))]
    pub fn handle_action(&self, action: HotkeyAction) {
        match action {
            HotkeyAction::VolumeUp => {
                self.volume_up();
            }
            HotkeyAction::VolumeDown => {
                self.volume_down();
            }
            HotkeyAction::CycleSource => {
                self.cycle_source();
            }
            HotkeyAction::SwitchToFocused => self.switch_to_focused(),
            HotkeyAction::SwitchToSystem => self.switch_to_system(),
            HotkeyAction::Quit => trace!("Quit is handled by the engine"),
        }
    }

    /// Raise the current target's volume by one dynamic step.
    ///
    /// Returns the applied level, or `None` if there was no audio to control.
    pub fn volume_up(&self) -> Option<f32> {
        self.shared.adjust_volume(|current, settings| {
            volume_up_level(current, settings.min_step, settings.max_step)
        })
    }

    /// Lower the current target's volume by one dynamic step.
    pub fn volume_down(&self) -> Option<f32> {
        self.shared.adjust_volume(|current, settings| {
            volume_down_level(current, settings.min_step, settings.max_step)
        })
    }

    /// Move off a silent target. Returns true if the target changed.
    ///
    /// In order: keep the system target; keep a target that is playing;
    /// switch to the focused process (the default target when focus is
    /// unknown) if it is playing; switch to the first
    /// playing process; switch to the system output if allowed; otherwise
    /// leave the target unchanged.
    pub fn handle_no_audio_swap(&self) -> bool {
        let mut state = self.shared.state.lock();
        self.shared.no_audio_swap(&mut state)
    }

    /// Switch to the next process producing audio.
    ///
    /// Presses within the debounce window are ignored. Never lands on the
    /// current target while another source is playing. Returns true if the
    /// press was accepted and a source selected.
    #[instrument(name = "cycle_source", skip(self))]
    pub fn cycle_source(&self) -> bool {
        let shared = &self.shared;
        let mut state = shared.state.lock();

        let now = Instant::now();
        if let Some(last) = state.last_cycle {
            if now.duration_since(last) < shared.settings.cycle_debounce {
                trace!("Cycle debounced");
                return false;
            }
        }
        state.last_cycle = Some(now);

        let owners = shared.resolver.list_active_stream_owners();
        debug!(?owners, "Active sources");
        if owners.is_empty() {
            info!("No active audio sources to cycle through");
            return false;
        }

        let count = owners.len();
        let mut index = (state.cycle_index + 1) % count;
        if count > 1 && state.target.id().is_process(&owners[index]) {
            index = (index + 1) % count;
        }
        state.cycle_index = index;

        info!(index, "Switching to session");
        shared.switch_to(&mut state, TargetId::parse(&owners[index]));
        shared.show_current(&mut state);
        true
    }

    /// Switch to the process owning the foreground window, or to the default
    /// target if it cannot be determined.
    pub fn switch_to_focused(&self) {
        let shared = &self.shared;
        let id = shared.focused_target();
        let mut state = shared.state.lock();
        shared.switch_to(&mut state, id);
        shared.show_current(&mut state);
    }

    /// Switch to the system output.
    pub fn switch_to_system(&self) {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        shared.switch_to(&mut state, TargetId::System);
        shared.show_current(&mut state);
    }

    /// Restore the default target. Returns true if the target changed.
    pub fn revert_to_default(&self) -> bool {
        let mut state = self.shared.state.lock();
        self.shared.revert(&mut state)
    }

    /// Cancel the pending revert. Called once on shutdown.
    pub fn shutdown(&self) {
        self.shared.timer.cancel();
        debug!("Revert timer canceled");
    }
}

impl Shared {
    fn adjust_volume(&self, level: impl Fn(f32, &MixerSettings) -> f32) -> Option<f32> {
        let mut state = self.state.lock();
        if self.no_audio_swap(&mut state) {
            debug!("Swapped audio source");
        }

        let Some(current) = state.target.volume() else {
            info!(target_id = %state.target.id(), "No audio to control");
            return None;
        };

        let requested = level(current, &self.settings);
        let Some(applied) = state.target.set_volume(requested) else {
            warn!(target_id = %state.target.id(), requested, "Volume change failed");
            return None;
        };

        debug!(
            target_id = %state.target.id(),
            from = current,
            to = applied,
            "Volume changed"
        );
        self.show(&state, Some(applied));
        self.timer.arm(self.settings.revert_delay);
        Some(applied)
    }

    fn no_audio_swap(&self, state: &mut MixerState) -> bool {
        if state.target.id().is_system() {
            return false;
        }

        let owners = self.resolver.list_active_stream_owners();
        if owners.iter().any(|name| state.target.id().is_process(name)) {
            trace!(target_id = %state.target.id(), "Current target is playing");
            return false;
        }

        if let TargetId::Process(focused) = self.focused_target() {
            if owners.contains(&focused) {
                debug!(process = %focused, "Switching to focused app");
                self.switch_to(state, TargetId::Process(focused));
                return true;
            }
        }

        if let Some(first) = owners.first() {
            debug!(process = %first, "Switching to first audio source");
            self.switch_to(state, TargetId::parse(first));
            return true;
        }

        if self.settings.system_fallback {
            debug!("Switching to system output");
            self.switch_to(state, TargetId::System);
            return true;
        }

        debug!("No audio source to switch to");
        false
    }

    fn switch_to(&self, state: &mut MixerState, id: TargetId) {
        info!(target_id = %id, "On profile");
        state.target = AudioTarget::new(id, Arc::clone(&self.resolver), Arc::clone(&self.system));
        state.last_session_change = Instant::now();
        self.timer.arm(self.settings.revert_delay);
    }

    fn revert(&self, state: &mut MixerState) -> bool {
        if *state.target.id() == self.settings.default_target {
            return false;
        }
        info!(target_id = %self.settings.default_target, "Reverting to default profile");
        state.target = AudioTarget::new(
            self.settings.default_target.clone(),
            Arc::clone(&self.resolver),
            Arc::clone(&self.system),
        );
        state.last_session_change = Instant::now();
        true
    }

    fn revert_if_current(&self, generation: u64) {
        let mut state = self.state.lock();
        if !self.timer.is_current(generation) {
            trace!(generation, "Stale revert ignored");
            return;
        }
        self.revert(&mut state);
    }

    fn focused_target(&self) -> TargetId {
        match self.focus.focused_process_name() {
            Some(name) => TargetId::Process(name),
            None => {
                warn!("Failed to get focused process, using default");
                self.settings.default_target.clone()
            }
        }
    }

    fn show_current(&self, state: &mut MixerState) {
        let volume = state.target.volume();
        self.show(state, volume);
    }

    fn show(&self, state: &MixerState, volume: Option<f32>) {
        let update = DisplayUpdate::for_target(state.target.id(), volume, state.cycle_index);
        match self.display.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => trace!("Overlay queue full, dropping update"),
            Err(TrySendError::Disconnected(_)) => trace!("Overlay closed"),
        }
    }
}
