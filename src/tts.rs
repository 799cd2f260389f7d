use crate::config::SpeechConfig;

pub type SynthesisError = Box<dyn std::error::Error + Send + Sync>;

/// A voice offered by the synthesizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// BCP-47 tag, e.g. `en-US`
    pub lang: String,
    pub default: bool,
}

impl Voice {
    pub fn new(name: &str, lang: &str) -> Self {
        Self {
            name: name.to_string(),
            lang: lang.to_string(),
            default: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    /// `None` lets the engine pick its default
    pub voice: Option<Voice>,
}

pub trait SpeechSynthesizer: Send {
    /// Queue an utterance
    fn speak(&mut self, utterance: Utterance) -> Result<(), SynthesisError>;
    /// Drop anything queued or playing
    fn cancel(&mut self);
    /// Voices currently available. May be empty until the engine has loaded them.
    fn voices(&self) -> Vec<Voice>;
}

// ============================================================================
// Feedback Emitter - one spoken confirmation at a time
// ============================================================================

/// Speaks command confirmations.
///
/// A new utterance always cancels the previous one, so feedback never queues
/// up behind a stale response.
pub struct FeedbackEmitter {
    synth: Option<Box<dyn SpeechSynthesizer>>,
    voices: Vec<Voice>,
    config: SpeechConfig,
}

impl FeedbackEmitter {
    pub fn new(synth: Option<Box<dyn SpeechSynthesizer>>, config: SpeechConfig) -> Self {
        let mut emitter = Self {
            synth,
            voices: Vec::new(),
            config,
        };
        emitter.refresh_voices();
        emitter
    }

    /// No synthesizer at all; `speak` does nothing
    pub fn disabled(config: SpeechConfig) -> Self {
        Self::new(None, config)
    }

    pub fn is_available(&self) -> bool {
        self.synth.is_some()
    }

    /// Re-read the voice list (on a "voices changed" notification)
    pub fn refresh_voices(&mut self) {
        if let Some(synth) = &self.synth {
            self.voices = synth.voices();
            tracing::debug!(count = self.voices.len(), "Loaded synthesis voices");
        }
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn speak(&mut self, text: &str) {
        let Some(synth) = self.synth.as_mut() else {
            return;
        };

        synth.cancel();

        let voice = select_voice(&self.voices, &self.config).cloned();
        let utterance = Utterance {
            text: text.to_string(),
            rate: self.config.rate,
            pitch: self.config.pitch,
            volume: self.config.volume,
            voice,
        };

        if let Err(e) = synth.speak(utterance) {
            tracing::warn!("Speech synthesis failed: {}", e);
        }
    }

    pub fn cancel(&mut self) {
        if let Some(synth) = self.synth.as_mut() {
            synth.cancel();
        }
    }
}

/// Pick a voice, best first:
/// 1. language matches and name contains a preferred vendor
/// 2. name contains a preferred vendor
/// 3. language matches
/// 4. none (engine default)
pub fn select_voice<'a>(voices: &'a [Voice], config: &SpeechConfig) -> Option<&'a Voice> {
    let lang = config.voice_lang.to_lowercase();
    let is_lang = |v: &Voice| v.lang.to_lowercase().starts_with(&lang);
    let is_preferred = |v: &Voice| {
        config
            .preferred_voices
            .iter()
            .any(|vendor| v.name.contains(vendor.as_str()))
    };

    voices
        .iter()
        .find(|v| is_lang(*v) && is_preferred(*v))
        .or_else(|| voices.iter().find(|v| is_preferred(*v)))
        .or_else(|| voices.iter().find(|v| is_lang(*v)))
}
