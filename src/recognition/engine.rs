//! Speech-to-text engine boundary
//!
//! An engine is a continuous, interim-results recognizer that reports its
//! lifecycle asynchronously through [`EngineEvent`]s on a channel. It may end
//! on its own at any time.

use chrono::{DateTime, Utc};

use crate::config::RecognitionConfig;
use crate::error::{EngineError, VoiceError};

/// One recognized chunk in a result callback
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSegment {
    pub transcript: String,
    pub is_final: bool,
}

impl ResultSegment {
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            transcript: text.into(),
            is_final: true,
        }
    }

    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            transcript: text.into(),
            is_final: false,
        }
    }
}

/// Provider error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineErrorCode {
    /// `not-allowed`
    NotAllowed,
    /// `no-speech`
    NoSpeech,
    /// `audio-capture`
    AudioCapture,
    /// `network`
    Network,
    /// `aborted`
    Aborted,
    Other(String),
}

impl From<&str> for EngineErrorCode {
    fn from(code: &str) -> Self {
        match code.trim() {
            "not-allowed" | "service-not-allowed" => EngineErrorCode::NotAllowed,
            "no-speech" => EngineErrorCode::NoSpeech,
            "audio-capture" => EngineErrorCode::AudioCapture,
            "network" => EngineErrorCode::Network,
            "aborted" => EngineErrorCode::Aborted,
            other => EngineErrorCode::Other(other.to_string()),
        }
    }
}

impl EngineErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            EngineErrorCode::NotAllowed => "not-allowed",
            EngineErrorCode::NoSpeech => "no-speech",
            EngineErrorCode::AudioCapture => "audio-capture",
            EngineErrorCode::Network => "network",
            EngineErrorCode::Aborted => "aborted",
            EngineErrorCode::Other(code) => code,
        }
    }
}

/// Asynchronous engine callbacks
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Started,
    Result(Vec<ResultSegment>),
    Error(EngineErrorCode),
    /// The engine stopped emitting, whether or not we asked it to
    Ended,
}

/// A transcript forwarded to the command interpreter
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEvent {
    /// Collapse a result callback into one transcript.
    ///
    /// Final text wins whenever any non-empty final text is present; otherwise
    /// the interim text is reported as not final.
    pub fn from_segments(segments: &[ResultSegment]) -> Self {
        let mut final_text = String::new();
        let mut interim_text = String::new();
        for segment in segments {
            if segment.is_final {
                final_text.push_str(&segment.transcript);
            } else {
                interim_text.push_str(&segment.transcript);
            }
        }

        let is_final = !final_text.trim().is_empty();
        Self {
            text: if is_final { final_text } else { interim_text },
            is_final,
            timestamp: Utc::now(),
        }
    }
}

/// Options an engine is constructed with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub locale: String,
    pub continuous: bool,
    pub interim_results: bool,
    pub max_alternatives: u32,
}

impl From<&RecognitionConfig> for EngineSettings {
    fn from(config: &RecognitionConfig) -> Self {
        Self {
            locale: config.locale.clone(),
            continuous: config.continuous,
            interim_results: config.interim_results,
            max_alternatives: 1,
        }
    }
}

/// Handle to one constructed recognizer
pub trait SpeechEngine: Send {
    /// Begin recognizing. `Started` arrives later on the event channel.
    fn start(&mut self) -> Result<(), EngineError>;
    /// Stop gracefully; an `Ended` event follows
    fn stop(&mut self);
    /// Stop immediately, discarding pending results
    fn abort(&mut self);
    fn is_active(&self) -> bool;
}

/// Factory for engines
pub trait EngineProvider: Send {
    fn is_supported(&self) -> bool;

    /// Build a fresh engine that reports on `events`.
    ///
    /// Returns [`VoiceError::UnsupportedEnvironment`] when no speech engine exists.
    fn create(
        &self,
        settings: &EngineSettings,
        events: flume::Sender<EngineEvent>,
    ) -> Result<Box<dyn SpeechEngine>, VoiceError>;
}
