//! Shared runtime state - centralized, thread-safe state accessible from all components
//!
//! One container holds every app-wide voice flag (mic permission, listening,
//! command mode, transcript, last error). All writes go through
//! [`RuntimeState::dispatch`], and every flag is stored so that a reader sees the
//! new value as soon as `dispatch` returns. Command mode in particular is never
//! cached by its readers.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{ErrorSink, VoiceError};

/// Whether non-activation phrases are actioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CommandMode {
    /// Only the wake phrase is recognized
    #[default]
    Idle = 0,
    /// Commands are actioned until a deactivation phrase
    Listening = 1,
}

impl From<u8> for CommandMode {
    fn from(v: u8) -> Self {
        match v {
            1 => CommandMode::Listening,
            _ => CommandMode::Idle,
        }
    }
}

impl fmt::Display for CommandMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandMode::Idle => write!(f, "Idle"),
            CommandMode::Listening => write!(f, "Command mode"),
        }
    }
}

/// Every state update the application can make
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateAction {
    SetMicPermission(bool),
    /// Turning listening off also leaves command mode and clears the transcript
    SetListening(bool),
    SetCommandMode(bool),
    SetTranscript(String),
    SetError(Option<String>),
    ClearError,
    /// User chose to continue without voice control
    DeclineVoice,
    /// Voice subsystem hit a fatal error and stays off for this session
    DisableVoice,
}

/// Application state container
///
/// Pass `Arc<RuntimeState>` to components that need to read or modify state.
pub struct RuntimeState {
    // ========================================================================
    // Voice flags
    // ========================================================================
    has_mic_permission: AtomicBool,
    /// Recognition is logically supposed to be running
    listening: AtomicBool,
    /// Current [`CommandMode`] (stored as u8)
    command_mode: AtomicU8,
    voice_declined: AtomicBool,
    voice_disabled: AtomicBool,

    // ========================================================================
    // Display state
    // ========================================================================
    transcript: Mutex<String>,
    error: Mutex<Option<String>>,
}

impl RuntimeState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            has_mic_permission: AtomicBool::new(false),
            listening: AtomicBool::new(false),
            command_mode: AtomicU8::new(CommandMode::Idle as u8),
            voice_declined: AtomicBool::new(false),
            voice_disabled: AtomicBool::new(false),
            transcript: Mutex::new(String::new()),
            error: Mutex::new(None),
        })
    }

    /// Apply a state update. The single write entry point.
    pub fn dispatch(&self, action: StateAction) {
        tracing::trace!(?action, "state dispatch");
        match action {
            StateAction::SetMicPermission(granted) => {
                self.has_mic_permission.store(granted, Ordering::SeqCst);
            }
            StateAction::SetListening(listening) => {
                self.listening.store(listening, Ordering::SeqCst);
                if !listening {
                    self.command_mode
                        .store(CommandMode::Idle as u8, Ordering::SeqCst);
                    lock(&self.transcript).clear();
                }
            }
            StateAction::SetCommandMode(active) => {
                let mode = if active {
                    CommandMode::Listening
                } else {
                    CommandMode::Idle
                };
                self.command_mode.store(mode as u8, Ordering::SeqCst);
            }
            StateAction::SetTranscript(text) => {
                *lock(&self.transcript) = text;
            }
            StateAction::SetError(message) => {
                *lock(&self.error) = message;
            }
            StateAction::ClearError => {
                *lock(&self.error) = None;
            }
            StateAction::DeclineVoice => {
                self.voice_declined.store(true, Ordering::SeqCst);
            }
            StateAction::DisableVoice => {
                self.voice_disabled.store(true, Ordering::SeqCst);
            }
        }
    }

    // ========================================================================
    // Readers
    // ========================================================================

    pub fn has_mic_permission(&self) -> bool {
        self.has_mic_permission.load(Ordering::SeqCst)
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn command_mode(&self) -> CommandMode {
        CommandMode::from(self.command_mode.load(Ordering::SeqCst))
    }

    pub fn is_command_mode(&self) -> bool {
        self.command_mode() == CommandMode::Listening
    }

    pub fn voice_declined(&self) -> bool {
        self.voice_declined.load(Ordering::SeqCst)
    }

    pub fn voice_disabled(&self) -> bool {
        self.voice_disabled.load(Ordering::SeqCst)
    }

    pub fn transcript(&self) -> String {
        lock(&self.transcript).clone()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.error).clone()
    }
}

impl ErrorSink for RuntimeState {
    fn surface(&self, error: &VoiceError) {
        self.dispatch(StateAction::SetError(Some(error.to_string())));
    }
}

impl fmt::Debug for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeState")
            .field("has_mic_permission", &self.has_mic_permission())
            .field("listening", &self.is_listening())
            .field("command_mode", &self.command_mode())
            .field("voice_declined", &self.voice_declined())
            .field("voice_disabled", &self.voice_disabled())
            .field("transcript", &self.transcript())
            .field("error", &self.error())
            .finish()
    }
}

/// Type alias for shared state
pub type SharedState = Arc<RuntimeState>;

// A panic while holding one of these locks cannot leave a half-written String behind
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
