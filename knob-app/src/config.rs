//! Configuration file loading.
//!
//! The file is TOML with a single `[settings]` table. It lives next to the
//! executable unless a path is given on the command line, and is created
//! with defaults on first run.

use std::fs;
use std::path::{Path, PathBuf};

use knob_engine::EngineError;
use knob_ipc::Settings;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Debug log file name, written next to the configuration file.
pub const DEBUG_LOG_FILE_NAME: &str = "debug.log";

/// Contents written when no configuration file exists.
pub const DEFAULT_CONFIG: &str = r#"# knob configuration
#
# Hotkeys take a key name (f13, a, esc) or a raw scan code (scan:-175).
# Run knob-keys to find the values for your keyboard.

[settings]
# Process restored after a few seconds without hotkey activity; "_system" for the system volume.
default_process = "chrome.exe"

key_quit = "f13"
key_cycle_audio_source = "f15"
key_currently_focused = "f16"
key_swap_to_system = "f17"
key_volume_up = "scan:-175"
key_volume_down = "scan:-174"

volume_step_min = 0.05
volume_step_max = 0.10

change_system_vol_if_no_audio = false
show_overlay = true
debug = false
"#;

/// Errors that can occur while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or created.
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has mistyped values.
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The `[settings]` table is missing.
    #[error("No [settings] table in {0}")]
    MissingSettings(PathBuf),

    /// A value is out of range.
    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// A hotkey is missing or malformed.
    #[error(transparent)]
    Hotkeys(#[from] EngineError),
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    settings: Option<Settings>,
}

/// `config.toml` next to the running executable.
pub fn default_config_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap_or_default();
    path.set_file_name(CONFIG_FILE_NAME);
    path
}

/// `debug.log` next to the configuration file.
pub fn debug_log_path(config_path: &Path) -> PathBuf {
    config_path.with_file_name(DEBUG_LOG_FILE_NAME)
}

/// Load the settings, writing the defaults first if the file does not exist.
pub fn load_or_create(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        fs::write(path, DEFAULT_CONFIG).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "No configuration found, created defaults");
    } else {
        debug!(path = %path.display(), "Loading configuration");
    }

    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text, path)
}

/// Parse and validate configuration text. `path` is used for messages only.
pub fn parse(text: &str, path: &Path) -> Result<Settings, ConfigError> {
    let file: ConfigFile = toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = file
        .settings
        .ok_or_else(|| ConfigError::MissingSettings(path.to_path_buf()))?;
    validate(&settings)?;
    Ok(settings)
}

/// Check value ranges.
pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.default_process.trim().is_empty() {
        return Err(ConfigError::Invalid {
            key: "default_process",
            reason: "must not be empty".to_string(),
        });
    }

    let (min, max) = (settings.volume_step_min, settings.volume_step_max);
    if !(0.0..=1.0).contains(&min) {
        return Err(ConfigError::Invalid {
            key: "volume_step_min",
            reason: format!("{min} is outside 0.0..=1.0"),
        });
    }
    if !(0.0..=1.0).contains(&max) {
        return Err(ConfigError::Invalid {
            key: "volume_step_max",
            reason: format!("{max} is outside 0.0..=1.0"),
        });
    }
    if min > max {
        return Err(ConfigError::Invalid {
            key: "volume_step_min",
            reason: format!("{min} is larger than volume_step_max {max}"),
        });
    }

    for (key, value) in [
        ("revert_delay_secs", settings.revert_delay_secs),
        ("cycle_debounce_secs", settings.cycle_debounce_secs),
        ("overlay_timeout_secs", settings.overlay_timeout_secs),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::Invalid {
                key,
                reason: format!("{value} is not a non-negative number of seconds"),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    #[test]
    fn test_default_config_parses_to_defaults() {
        let settings = parse(DEFAULT_CONFIG, &path()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_missing_settings_table() {
        let err = parse("[other]\nkey = 1\n", &path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSettings(_)));
    }

    #[test]
    fn test_malformed_file() {
        let err = parse("[settings\n", &path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = parse("[settings]\nvolume_step_min = \"low\"\n", &path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_step_bounds_validated() {
        let err = parse(
            "[settings]\nvolume_step_min = 0.2\nvolume_step_max = 0.1\n",
            &path(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "volume_step_min",
                ..
            }
        ));

        let err = parse("[settings]\nvolume_step_max = 1.5\n", &path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "volume_step_max",
                ..
            }
        ));
    }

    #[test]
    fn test_negative_delay_rejected() {
        let err = parse("[settings]\nrevert_delay_secs = -1.0\n", &path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "revert_delay_secs",
                ..
            }
        ));
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = std::env::temp_dir().join(format!("knob-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join(CONFIG_FILE_NAME);
        let _ = fs::remove_file(&file);

        let settings = load_or_create(&file).unwrap();
        assert_eq!(settings.default_process, "chrome.exe");
        assert_eq!(fs::read_to_string(&file).unwrap(), DEFAULT_CONFIG);

        fs::write(&file, "[settings]\ndefault_process = \"_system\"\nkey_quit = \"f13\"\nkey_cycle_audio_source = \"f15\"\n").unwrap();
        let settings = load_or_create(&file).unwrap();
        assert_eq!(settings.default_process, "_system");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_debug_log_next_to_config() {
        let log = debug_log_path(Path::new("/opt/knob/config.toml"));
        assert_eq!(log, PathBuf::from("/opt/knob/debug.log"));
    }
}
