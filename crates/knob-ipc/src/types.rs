//! Common types used across thread boundaries.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Configuration spelling of the system output target.
pub const SYSTEM_SENTINEL: &str = "_system";

/// A resolvable volume-control target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetId {
    /// The system output device.
    System,

    /// All active streams owned by a process, matched by exact executable name.
    Process(String),
}

impl TargetId {
    /// Parse a configured identifier; `_system` selects the system output.
    pub fn parse(identifier: &str) -> Self {
        if identifier == SYSTEM_SENTINEL {
            Self::System
        } else {
            Self::Process(identifier.to_string())
        }
    }

    /// Returns true for the system output target.
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }

    /// Returns the identifier as written in configuration.
    pub fn as_str(&self) -> &str {
        match self {
            Self::System => SYSTEM_SENTINEL,
            Self::Process(name) => name,
        }
    }

    /// Returns the label shown to the user.
    pub fn display_name(&self) -> &str {
        match self {
            Self::System => "System",
            Self::Process(name) => name,
        }
    }

    /// Returns true if this target is the process with the given name.
    pub fn is_process(&self, process_name: &str) -> bool {
        matches!(self, Self::Process(name) if name == process_name)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical actions a hotkey can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HotkeyAction {
    /// Raise the current target's volume by one step.
    VolumeUp,

    /// Lower the current target's volume by one step.
    VolumeDown,

    /// Switch to the next process that is producing audio.
    CycleSource,

    /// Switch to the process owning the foreground window.
    SwitchToFocused,

    /// Switch to the system output device.
    SwitchToSystem,

    /// Exit the application.
    Quit,
}

impl HotkeyAction {
    /// All actions, in dispatch priority order.
    pub const ALL: [HotkeyAction; 6] = [
        Self::Quit,
        Self::CycleSource,
        Self::SwitchToFocused,
        Self::SwitchToSystem,
        Self::VolumeUp,
        Self::VolumeDown,
    ];

    /// Returns the settings key this action is configured under.
    pub fn setting_key(self) -> &'static str {
        match self {
            Self::VolumeUp => "key_volume_up",
            Self::VolumeDown => "key_volume_down",
            Self::CycleSource => "key_cycle_audio_source",
            Self::SwitchToFocused => "key_currently_focused",
            Self::SwitchToSystem => "key_swap_to_system",
            Self::Quit => "key_quit",
        }
    }

    /// Look up the action configured under a settings key.
    pub fn from_setting_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.setting_key() == key)
    }
}

/// Key event direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyEventKind {
    Down,
    Up,
}

/// A key event delivered by the keyboard hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Press or release.
    pub kind: KeyEventKind,

    /// Hardware scan code; negative for media keys without one.
    pub scan_code: i32,

    /// Lowercase key name, if the key has a stable one.
    pub name: Option<String>,
}

impl KeyEvent {
    /// Create a key-down event.
    pub fn down(scan_code: i32, name: Option<&str>) -> Self {
        Self {
            kind: KeyEventKind::Down,
            scan_code,
            name: name.map(str::to_string),
        }
    }

    /// Create a key-up event.
    pub fn up(scan_code: i32, name: Option<&str>) -> Self {
        Self {
            kind: KeyEventKind::Up,
            ..Self::down(scan_code, name)
        }
    }

    /// Returns true for key-down events.
    pub fn is_down(&self) -> bool {
        self.kind == KeyEventKind::Down
    }
}

/// What the hook should do with a key event after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyDisposition {
    /// Swallow the event so no other application sees it.
    Suppress,

    /// Let the event through unchanged.
    PassThrough,
}

/// Level shown on the overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DisplayLevel {
    /// A volume scalar in [0, 1].
    Volume(f32),

    /// The target currently has no audio to control.
    NoAudio,
}

impl DisplayLevel {
    /// Text rendered under the progress bar.
    pub fn text(&self) -> String {
        match self {
            Self::Volume(level) => format!("{}%", (level * 100.0).round() as i32),
            Self::NoAudio => "No audio".to_string(),
        }
    }

    /// Progress bar fill in percent.
    pub fn percent(&self) -> u32 {
        match self {
            Self::Volume(level) => (level.clamp(0.0, 1.0) * 100.0).round() as u32,
            Self::NoAudio => 0,
        }
    }
}

/// An immutable overlay message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayUpdate {
    /// Target label.
    pub label: String,

    /// Volume or status.
    pub level: DisplayLevel,

    /// Position of the target in the last cycled source list.
    pub session_index: usize,
}

impl DisplayUpdate {
    /// Build an update for a target and an optional volume reading.
    pub fn for_target(target: &TargetId, volume: Option<f32>, session_index: usize) -> Self {
        Self {
            label: target.display_name().to_string(),
            level: volume.map_or(DisplayLevel::NoAudio, DisplayLevel::Volume),
            session_index,
        }
    }

    /// Label with the session index appended, as shown in debug mode.
    pub fn debug_label(&self) -> String {
        format!("{} {}", self.label, self.session_index)
    }
}

/// The flat `[settings]` table of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Identifier restored after the revert delay.
    #[serde(default = "default_process")]
    pub default_process: String,

    /// Smallest per-press volume delta.
    #[serde(default = "default_step_min")]
    pub volume_step_min: f32,

    /// Largest per-press volume delta.
    #[serde(default = "default_step_max")]
    pub volume_step_max: f32,

    /// Fall back to the system output when nothing else plays audio.
    #[serde(default)]
    pub change_system_vol_if_no_audio: bool,

    /// Render the overlay window.
    #[serde(default = "default_true")]
    pub show_overlay: bool,

    /// Verbose logging and session index in the overlay label.
    #[serde(default)]
    pub debug: bool,

    /// Idle time before reverting to `default_process`.
    #[serde(default = "default_revert_delay")]
    pub revert_delay_secs: f32,

    /// Minimum time between accepted cycle presses.
    #[serde(default = "default_cycle_debounce")]
    pub cycle_debounce_secs: f32,

    /// Time the overlay stays visible after an update.
    #[serde(default = "default_overlay_timeout")]
    pub overlay_timeout_secs: f32,

    /// Every remaining string entry; `key_*` entries are hotkey bindings.
    #[serde(flatten)]
    pub bindings: BTreeMap<String, String>,
}

impl Settings {
    /// Iterate over the `key_*` entries.
    pub fn hotkey_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .filter(|(key, _)| key.starts_with("key_"))
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl Default for Settings {
    fn default() -> Self {
        let bindings = [
            ("key_quit", "f13"),
            ("key_cycle_audio_source", "f15"),
            ("key_currently_focused", "f16"),
            ("key_swap_to_system", "f17"),
            ("key_volume_up", "scan:-175"),
            ("key_volume_down", "scan:-174"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

        Self {
            default_process: default_process(),
            volume_step_min: default_step_min(),
            volume_step_max: default_step_max(),
            change_system_vol_if_no_audio: false,
            show_overlay: true,
            debug: false,
            revert_delay_secs: default_revert_delay(),
            cycle_debounce_secs: default_cycle_debounce(),
            overlay_timeout_secs: default_overlay_timeout(),
            bindings,
        }
    }
}

fn default_process() -> String {
    "chrome.exe".to_string()
}

fn default_step_min() -> f32 {
    0.05
}

fn default_step_max() -> f32 {
    0.10
}

fn default_true() -> bool {
    true
}

fn default_revert_delay() -> f32 {
    5.0
}

fn default_cycle_debounce() -> f32 {
    0.3
}

fn default_overlay_timeout() -> f32 {
    5.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_id_parse() {
        assert_eq!(TargetId::parse("_system"), TargetId::System);
        assert_eq!(
            TargetId::parse("chrome.exe"),
            TargetId::Process("chrome.exe".to_string())
        );
        assert_eq!(TargetId::System.display_name(), "System");
        assert_eq!(TargetId::System.to_string(), "_system");
    }

    #[test]
    fn test_target_id_process_match_is_case_sensitive() {
        let target = TargetId::parse("Discord.exe");
        assert!(target.is_process("Discord.exe"));
        assert!(!target.is_process("discord.exe"));
        assert!(!TargetId::System.is_process("_system"));
    }

    #[test]
    fn test_hotkey_action_setting_keys() {
        for action in HotkeyAction::ALL {
            assert_eq!(HotkeyAction::from_setting_key(action.setting_key()), Some(action));
        }
        assert_eq!(HotkeyAction::from_setting_key("key_unknown"), None);
    }

    #[test]
    fn test_display_update_for_target() {
        let update = DisplayUpdate::for_target(&TargetId::System, Some(0.25), 2);
        assert_eq!(update.label, "System");
        assert_eq!(update.level.text(), "25%");
        assert_eq!(update.level.percent(), 25);
        assert_eq!(update.debug_label(), "System 2");

        let silent = DisplayUpdate::for_target(&TargetId::parse("vlc.exe"), None, 0);
        assert_eq!(silent.level, DisplayLevel::NoAudio);
        assert_eq!(silent.level.text(), "No audio");
        assert_eq!(silent.level.percent(), 0);
    }

    #[test]
    fn test_display_level_percent_is_clamped() {
        assert_eq!(DisplayLevel::Volume(0.0).text(), "0%");
        assert_eq!(DisplayLevel::Volume(0.0).percent(), 0);
        assert_eq!(DisplayLevel::Volume(0.996).percent(), 100);
        assert_eq!(DisplayLevel::Volume(1.5).percent(), 100);
        assert_eq!(DisplayLevel::Volume(-0.2).percent(), 0);
    }

    #[test]
    fn test_settings_from_flat_table() {
        let text = r#"
            default_process = "spotify.exe"
            volume_step_min = 0.02
            volume_step_max = 0.2
            change_system_vol_if_no_audio = true
            key_quit = "f13"
            key_volume_up = "scan:-175"
        "#;

        let settings: Settings = toml::from_str(text).unwrap();
        assert_eq!(settings.default_process, "spotify.exe");
        assert!(settings.change_system_vol_if_no_audio);
        assert!(settings.show_overlay);
        assert!((settings.revert_delay_secs - 5.0).abs() < f32::EPSILON);

        let entries: Vec<_> = settings.hotkey_entries().collect();
        assert_eq!(entries, vec![("key_quit", "f13"), ("key_volume_up", "scan:-175")]);
    }

    #[test]
    fn test_settings_default_has_all_bindings() {
        let settings = Settings::default();
        assert_eq!(settings.hotkey_entries().count(), HotkeyAction::ALL.len());
    }
}
