//! Error types for the audio module.

use thiserror::Error;

/// Errors that can occur during audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Windows API error.
    #[error("Windows API error: {message}")]
    WindowsApi {
        message: String,
        #[cfg(windows)]
        #[source]
        source: Option<windows::core::Error>,
    },

    /// The system output device could not be opened.
    #[error("System output endpoint unavailable: {0}")]
    EndpointUnavailable(String),

    /// A stream or endpoint handle is no longer valid.
    #[error("Audio handle invalidated: {0}")]
    HandleInvalidated(String),

    /// Session enumeration failed.
    #[error("Failed to enumerate audio sessions: {0}")]
    Enumeration(String),
}

#[cfg(windows)]
impl From<windows::core::Error> for AudioError {
    fn from(err: windows::core::Error) -> Self {
        Self::WindowsApi {
            message: err.message().to_string(),
            source: Some(err),
        }
    }
}
