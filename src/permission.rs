//! Microphone permission flow and the voice setup prompt

use crate::error::PermissionError;
use crate::state::{SharedState, StateAction};

/// Result of a permission query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// Not decided yet; asking will show the platform prompt
    Prompt,
}

/// An open capture stream obtained only to trigger the permission prompt
pub trait CaptureProbe {
    /// Release every track so the microphone indicator goes away
    fn stop_tracks(&mut self);
}

pub trait MicrophoneAccess: Send {
    fn query(&self) -> Result<PermissionStatus, PermissionError>;
    fn request(&mut self) -> Result<Box<dyn CaptureProbe>, PermissionError>;
}

/// What the setup prompt should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupPrompt {
    Hidden,
    /// Explain voice control and offer to enable it
    Offer,
    Granted,
    /// Access was refused; offer retry or continue without voice
    Denied,
    Error(String),
}

impl SetupPrompt {
    pub fn is_visible(&self) -> bool {
        !matches!(self, SetupPrompt::Hidden)
    }
}

pub struct PermissionGate {
    state: SharedState,
    prompt: SetupPrompt,
}

impl PermissionGate {
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            prompt: SetupPrompt::Hidden,
        }
    }

    pub fn prompt(&self) -> &SetupPrompt {
        &self.prompt
    }

    /// Query the current permission. Only `Granted` skips the prompt.
    pub fn check(&mut self, access: &dyn MicrophoneAccess) -> &SetupPrompt {
        if self.state.has_mic_permission() {
            self.prompt = SetupPrompt::Hidden;
            return &self.prompt;
        }

        self.prompt = match access.query() {
            Ok(PermissionStatus::Granted) => {
                self.state.dispatch(StateAction::SetMicPermission(true));
                SetupPrompt::Hidden
            }
            Ok(PermissionStatus::Denied) => SetupPrompt::Denied,
            Ok(PermissionStatus::Prompt) => SetupPrompt::Offer,
            Err(e) => {
                tracing::debug!("Permission query failed: {}", e);
                SetupPrompt::Offer
            }
        };
        &self.prompt
    }

    /// Ask for access by opening and immediately releasing a capture stream
    pub fn request(&mut self, access: &mut dyn MicrophoneAccess) -> &SetupPrompt {
        self.prompt = match access.request() {
            Ok(mut probe) => {
                probe.stop_tracks();
                self.state.dispatch(StateAction::SetMicPermission(true));
                self.state.dispatch(StateAction::ClearError);
                tracing::info!("Microphone access granted");
                SetupPrompt::Granted
            }
            Err(PermissionError::Denied(reason)) => {
                tracing::warn!("Microphone access denied: {}", reason);
                SetupPrompt::Denied
            }
            Err(e) => {
                tracing::warn!("Microphone request failed: {}", e);
                SetupPrompt::Error(e.to_string())
            }
        };
        &self.prompt
    }

    /// User chose to use the store without voice
    pub fn continue_without_voice(&mut self) {
        self.state.dispatch(StateAction::DeclineVoice);
        self.prompt = SetupPrompt::Hidden;
    }

    pub fn dismiss(&mut self) {
        self.prompt = SetupPrompt::Hidden;
    }
}
