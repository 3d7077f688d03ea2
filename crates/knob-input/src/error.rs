//! Error types for the input module.

use thiserror::Error;

/// Errors that can occur while capturing keyboard input.
#[derive(Debug, Error)]
pub enum InputError {
    /// Windows API error.
    #[error("Windows API error: {message}")]
    WindowsApi {
        message: String,
        #[cfg(windows)]
        #[source]
        source: Option<windows::core::Error>,
    },

    /// A keyboard hook is already installed in this process.
    #[error("Keyboard hook already installed")]
    AlreadyInstalled,

    /// The hook thread could not be started.
    #[error("Failed to start hook thread: {0}")]
    Thread(#[from] std::io::Error),

    /// The hook thread exited before reporting its state.
    #[error("Hook thread exited during installation")]
    HookThreadExited,

    /// Global keyboard hooks are not available on this platform.
    #[error("Global keyboard hooks are only supported on Windows")]
    Unsupported,
}

#[cfg(windows)]
impl From<windows::core::Error> for InputError {
    fn from(err: windows::core::Error) -> Self {
        Self::WindowsApi {
            message: err.message().to_string(),
            source: Some(err),
        }
    }
}
