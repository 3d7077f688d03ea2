//! Global keyboard hook and foreground process lookup.

mod error;
mod focus;
mod hook;
mod keys;

pub use error::InputError;
pub use focus::{system_focus, FixedFocus, FocusProvider};
#[cfg(windows)]
pub use focus::WindowsFocus;
pub use hook::{install_keyboard_hook, KeyboardHookGuard};
pub use keys::{event_scan_code, key_name, MEDIA_VK_RANGE};

/// Result type for input operations.
pub type InputResult<T> = Result<T, InputError>;
