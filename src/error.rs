//! Error taxonomy for the voice subsystem
//!
//! Every engine-level failure is converted into a [`VoiceError`] at the driver
//! boundary. Nothing below this layer is allowed to escape as a panic or an
//! unhandled `Result`; user-visible failures go through an [`ErrorSink`].

use thiserror::Error;

/// Failures surfaced to the user (or deliberately swallowed) by the voice layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    /// No speech engine exists in this environment; voice is disabled for the session
    #[error("Speech recognition is not supported in this environment")]
    UnsupportedEnvironment,

    /// The engine reported that microphone access was refused
    #[error("Microphone access denied. Please allow microphone access and try again.")]
    PermissionDenied,

    /// A start was requested before the microphone permission was granted
    #[error("Microphone permission required")]
    MicPermissionRequired,

    /// The provider gave up waiting for speech. Recovered by restarting, never shown.
    #[error("No speech detected")]
    NoSpeechTimeout,

    #[error("No microphone found. Please check your microphone connection.")]
    DeviceUnavailable,

    #[error("Network error occurred. Please check your internet connection.")]
    TransportError,

    /// The engine rejected an explicit start synchronously
    #[error("Failed to start voice recognition: {0}")]
    StartFailed(String),

    /// Too many consecutive re-initializations failed
    #[error("Voice recognition failed to restart {0} times in a row. Voice control is disabled.")]
    RestartExhausted(u32),

    /// Provider error code we have no dedicated handling for
    #[error("Speech recognition error: {0}")]
    Engine(String),
}

impl VoiceError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            VoiceError::UnsupportedEnvironment => ErrorKind::UnsupportedEnvironment,
            VoiceError::PermissionDenied => ErrorKind::PermissionDenied,
            VoiceError::MicPermissionRequired => ErrorKind::PermissionRequired,
            VoiceError::NoSpeechTimeout => ErrorKind::NoSpeechTimeout,
            VoiceError::DeviceUnavailable => ErrorKind::DeviceUnavailable,
            VoiceError::TransportError => ErrorKind::TransportError,
            VoiceError::StartFailed(_) => ErrorKind::StartFailed,
            VoiceError::RestartExhausted(_) => ErrorKind::RestartExhausted,
            VoiceError::Engine(_) => ErrorKind::Engine,
        }
    }

    /// Whether this error should ever reach the user
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, VoiceError::NoSpeechTimeout)
    }
}

/// Compact error classification, recorded on the recognition session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedEnvironment,
    PermissionDenied,
    PermissionRequired,
    NoSpeechTimeout,
    DeviceUnavailable,
    TransportError,
    StartFailed,
    RestartExhausted,
    /// Engine was aborted; always followed by an end event
    Aborted,
    Engine,
}

/// Synchronous rejection from an engine's start primitive
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine is already running. Callers treat this as a successful start.
    #[error("recognition has already started")]
    AlreadyStarted,

    #[error("{0}")]
    Rejected(String),
}

/// Failures from the microphone permission layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("permission query is not available")]
    QueryUnavailable,

    #[error("microphone access denied: {0}")]
    Denied(String),
}

/// Destination for user-facing voice errors (a toast, a status line, a log)
pub trait ErrorSink: Send + Sync {
    fn surface(&self, error: &VoiceError);
}
