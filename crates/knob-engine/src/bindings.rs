//! Hotkey binding table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use knob_ipc::{EngineCommand, HotkeyAction, KeyDisposition, KeyEvent, Settings};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::EngineResult;

/// Marks a hotkey value as a raw scan code, e.g. `scan:-175`.
pub const SCAN_CODE_PREFIX: &str = "scan:";

/// A key as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyBinding {
    /// A lowercase key name such as `f13`.
    Name(String),

    /// A raw scan code; negative for media keys.
    ScanCode(i32),
}

impl KeyBinding {
    /// Parse a configured value. Names are matched case-insensitively.
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        if let Some(code) = value.strip_prefix(SCAN_CODE_PREFIX) {
            return code
                .trim()
                .parse::<i32>()
                .map(Self::ScanCode)
                .map_err(|e| format!("invalid scan code: {e}"));
        }
        if value.is_empty() {
            return Err("empty key name".to_string());
        }
        Ok(Self::Name(value.to_lowercase()))
    }

    /// Returns true if this binding is a scan code.
    pub fn is_scan_code(&self) -> bool {
        matches!(self, Self::ScanCode(_))
    }
}

impl fmt::Display for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::ScanCode(code) => write!(f, "{SCAN_CODE_PREFIX}{code}"),
        }
    }
}

/// Built-in binding for an optional action.
fn default_binding(action: HotkeyAction) -> Option<KeyBinding> {
    match action {
        HotkeyAction::SwitchToFocused => Some(KeyBinding::ScanCode(103)),
        HotkeyAction::SwitchToSystem => Some(KeyBinding::ScanCode(104)),
        HotkeyAction::VolumeUp => Some(KeyBinding::ScanCode(-175)),
        HotkeyAction::VolumeDown => Some(KeyBinding::ScanCode(-174)),
        HotkeyAction::Quit | HotkeyAction::CycleSource => None,
    }
}

/// Maps key events to actions by scan code or by name.
#[derive(Debug, Clone, Default)]
pub struct HotkeyBindingTable {
    by_scan_code: HashMap<i32, HotkeyAction>,
    by_name: HashMap<String, HotkeyAction>,
    bindings: Vec<(HotkeyAction, KeyBinding)>,
}

impl HotkeyBindingTable {
    /// Build the table from the `key_*` settings.
    ///
    /// Quit and cycle-source must be configured; other actions fall back to
    /// built-in scan codes. Unknown `key_*` entries are ignored with a warning.
    pub fn from_settings(settings: &Settings) -> EngineResult<Self> {
        for (key, _) in settings.hotkey_entries() {
            if HotkeyAction::from_setting_key(key).is_none() {
                warn!(key, "Ignoring unknown hotkey setting");
            }
        }

        let mut table = Self::default();
        for action in HotkeyAction::ALL {
            let key = action.setting_key();
            let binding = match settings.bindings.get(key) {
                Some(value) => {
                    KeyBinding::parse(value).map_err(|reason| EngineError::InvalidBinding {
                        key: key.to_string(),
                        value: value.clone(),
                        reason,
                    })?
                }
                None => match default_binding(action) {
                    Some(binding) => {
                        debug!(key, %binding, "Using default hotkey");
                        binding
                    }
                    None => return Err(EngineError::MissingBinding(key)),
                },
            };
            table.insert(action, binding);
        }

        Ok(table)
    }

    /// Bind a key to an action. A key already bound keeps its first action.
    pub fn insert(&mut self, action: HotkeyAction, binding: KeyBinding) {
        let taken = match &binding {
            KeyBinding::ScanCode(code) => self.by_scan_code.get(code),
            KeyBinding::Name(name) => self.by_name.get(name),
        };
        if let Some(existing) = taken {
            warn!(%binding, ?existing, ?action, "Key already bound, ignoring");
            return;
        }

        match &binding {
            KeyBinding::ScanCode(code) => {
                self.by_scan_code.insert(*code, action);
            }
            KeyBinding::Name(name) => {
                self.by_name.insert(name.clone(), action);
            }
        }
        self.bindings.push((action, binding));
    }

    /// Action bound to a key event. Scan codes are checked before names.
    pub fn lookup(&self, event: &KeyEvent) -> Option<HotkeyAction> {
        self.by_scan_code
            .get(&event.scan_code)
            .or_else(|| {
                event
                    .name
                    .as_deref()
                    .and_then(|name| self.by_name.get(name))
            })
            .copied()
    }

    /// Key bound to an action.
    pub fn binding(&self, action: HotkeyAction) -> Option<&KeyBinding> {
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == action)
            .map(|(_, binding)| binding)
    }

    /// Number of bound keys.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Build a keyboard hook handler that forwards bound key presses to the
/// engine and suppresses them.
///
/// The handler never blocks: a full command queue drops the press.
pub fn key_dispatcher(
    bindings: Arc<HotkeyBindingTable>,
    commands: Sender<EngineCommand>,
) -> impl Fn(&KeyEvent) -> KeyDisposition + Send + Sync + 'static {
    move |event| {
        if !event.is_down() {
            return KeyDisposition::PassThrough;
        }
        let Some(action) = bindings.lookup(event) else {
            return KeyDisposition::PassThrough;
        };

        match commands.try_send(EngineCommand::Action(action)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(?action, "Command queue full, dropping key press"),
            Err(TrySendError::Disconnected(_)) => debug!(?action, "Engine stopped"),
        }
        KeyDisposition::Suppress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(entries: &[(&str, &str)]) -> Settings {
        let mut settings = Settings::default();
        settings.bindings = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        settings
    }

    #[test]
    fn test_parse_binding() {
        assert_eq!(KeyBinding::parse("F13"), Ok(KeyBinding::Name("f13".to_string())));
        assert_eq!(KeyBinding::parse("scan:-175"), Ok(KeyBinding::ScanCode(-175)));
        assert_eq!(KeyBinding::parse("scan:103"), Ok(KeyBinding::ScanCode(103)));
        assert!(KeyBinding::parse("scan:vol").is_err());
        assert!(KeyBinding::parse("").is_err());
        assert_eq!(KeyBinding::ScanCode(-174).to_string(), "scan:-174");
    }

    #[test]
    fn test_required_bindings() {
        let err = HotkeyBindingTable::from_settings(&settings(&[("key_cycle_audio_source", "f15")]))
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingBinding("key_quit")));

        let err = HotkeyBindingTable::from_settings(&settings(&[("key_quit", "f13")])).unwrap_err();
        assert!(matches!(err, EngineError::MissingBinding("key_cycle_audio_source")));
    }

    #[test]
    fn test_optional_bindings_use_defaults() {
        let table = HotkeyBindingTable::from_settings(&settings(&[
            ("key_quit", "f13"),
            ("key_cycle_audio_source", "f15"),
        ]))
        .unwrap();

        assert_eq!(table.len(), 6);
        assert_eq!(
            table.binding(HotkeyAction::VolumeUp),
            Some(&KeyBinding::ScanCode(-175))
        );
        assert_eq!(
            table.binding(HotkeyAction::SwitchToFocused),
            Some(&KeyBinding::ScanCode(103))
        );
    }

    #[test]
    fn test_lookup_by_scan_code_and_name() {
        let table = HotkeyBindingTable::from_settings(&settings(&[
            ("key_quit", "f13"),
            ("key_cycle_audio_source", "f15"),
            ("key_volume_up", "scan:-175"),
            ("key_volume_down", "scan:-174"),
        ]))
        .unwrap();

        assert_eq!(
            table.lookup(&KeyEvent::down(-175, Some("volume up"))),
            Some(HotkeyAction::VolumeUp)
        );
        assert_eq!(
            table.lookup(&KeyEvent::down(102, Some("f15"))),
            Some(HotkeyAction::CycleSource)
        );
        assert_eq!(table.lookup(&KeyEvent::down(30, Some("a"))), None);
        assert_eq!(table.lookup(&KeyEvent::down(-1, None)), None);
    }

    #[test]
    fn test_invalid_scan_code_is_fatal() {
        let err = HotkeyBindingTable::from_settings(&settings(&[
            ("key_quit", "f13"),
            ("key_cycle_audio_source", "scan:abc"),
        ]))
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidBinding { .. }));
    }

    #[test]
    fn test_duplicate_key_keeps_first_action() {
        let table = HotkeyBindingTable::from_settings(&settings(&[
            ("key_quit", "f13"),
            ("key_cycle_audio_source", "f13"),
        ]))
        .unwrap();
        assert_eq!(
            table.lookup(&KeyEvent::down(100, Some("f13"))),
            Some(HotkeyAction::Quit)
        );
        assert_eq!(table.binding(HotkeyAction::CycleSource), None);
    }

    #[test]
    fn test_key_dispatcher_forwards_and_suppresses() {
        let table = Arc::new(
            HotkeyBindingTable::from_settings(&settings(&[
                ("key_quit", "f13"),
                ("key_cycle_audio_source", "f15"),
            ]))
            .unwrap(),
        );
        let (tx, rx) = crossbeam_channel::bounded(1);
        let dispatch = key_dispatcher(table, tx);

        assert_eq!(
            dispatch(&KeyEvent::down(-175, None)),
            KeyDisposition::Suppress
        );
        assert_eq!(
            rx.try_recv(),
            Ok(EngineCommand::Action(HotkeyAction::VolumeUp))
        );

        assert_eq!(dispatch(&KeyEvent::up(-175, None)), KeyDisposition::PassThrough);
        assert_eq!(
            dispatch(&KeyEvent::down(30, Some("a"))),
            KeyDisposition::PassThrough
        );
        assert!(rx.try_recv().is_err());

        // full queue drops the press but still suppresses the key
        dispatch(&KeyEvent::down(-174, None));
        assert_eq!(
            dispatch(&KeyEvent::down(-174, None)),
            KeyDisposition::Suppress
        );
        assert_eq!(rx.len(), 1);
    }
}
