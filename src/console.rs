//! Console implementations of every external collaborator
//!
//! Typed lines stand in for speech, and page effects and spoken feedback are
//! printed to the terminal. This lets the whole voice layer run without a
//! browser, microphone or speech engine.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::actions::{ElementRef, Navigator, Page, SECTION_ATTRIBUTE};
use crate::error::{EngineError, ErrorSink, PermissionError, VoiceError};
use crate::permission::{CaptureProbe, MicrophoneAccess, PermissionStatus};
use crate::recognition::{
    EngineErrorCode, EngineEvent, EngineProvider, EngineSettings, ResultSegment, SpeechEngine,
};
use crate::state::SharedState;
use crate::tts::{SpeechSynthesizer, SynthesisError, Utterance, Voice};
use crate::ui;

// ============================================================================
// Speech recognition
// ============================================================================

/// What a typed line turned into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fed {
    /// Delivered to the running engine
    Delivered,
    /// No engine is listening; the line was dropped
    NotListening,
    Empty,
}

#[derive(Default)]
struct Microphone {
    events: Option<flume::Sender<EngineEvent>>,
    active: bool,
    /// Spinner frame for interim lines
    frame: usize,
}

/// Routes typed lines to whichever console engine is currently running
#[derive(Clone, Default)]
pub struct ConsoleHub {
    inner: Arc<Mutex<Microphone>>,
}

impl ConsoleHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Microphone> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_listening(&self) -> bool {
        self.lock().active
    }

    /// Feed one typed line.
    ///
    /// `~text` is an interim result, `!end` ends the engine on its own,
    /// `!error <code>` reports an engine error (followed by an end, as real
    /// engines do). Anything else is a final transcript.
    pub fn feed(&self, line: &str) -> Fed {
        let line = line.trim();
        if line.is_empty() {
            return Fed::Empty;
        }

        let mut mic = self.lock();
        let Some(events) = mic.events.clone().filter(|_| mic.active) else {
            return Fed::NotListening;
        };

        if line == "!end" {
            mic.active = false;
            events.send(EngineEvent::Ended).ok();
        } else if let Some(code) = line.strip_prefix("!error") {
            mic.active = false;
            let code = EngineErrorCode::from(code.trim());
            events.send(EngineEvent::Error(code)).ok();
            events.send(EngineEvent::Ended).ok();
        } else if let Some(text) = line.strip_prefix('~') {
            mic.frame += 1;
            ui::show_interim(text.trim(), mic.frame);
            events
                .send(EngineEvent::Result(vec![ResultSegment::interim(text.trim())]))
                .ok();
        } else {
            events
                .send(EngineEvent::Result(vec![ResultSegment::final_text(line)]))
                .ok();
        }
        Fed::Delivered
    }
}

pub struct ConsoleProvider {
    hub: ConsoleHub,
    supported: bool,
}

impl ConsoleProvider {
    pub fn new(hub: ConsoleHub) -> Self {
        Self {
            hub,
            supported: true,
        }
    }

    /// A provider for an environment without any speech engine
    pub fn unsupported(hub: ConsoleHub) -> Self {
        Self {
            hub,
            supported: false,
        }
    }
}

impl EngineProvider for ConsoleProvider {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(
        &self,
        settings: &EngineSettings,
        events: flume::Sender<EngineEvent>,
    ) -> Result<Box<dyn SpeechEngine>, VoiceError> {
        if !self.supported {
            return Err(VoiceError::UnsupportedEnvironment);
        }
        tracing::debug!(locale = %settings.locale, "Console engine created");
        Ok(Box::new(ConsoleEngine {
            hub: self.hub.clone(),
            events,
        }))
    }
}

pub struct ConsoleEngine {
    hub: ConsoleHub,
    events: flume::Sender<EngineEvent>,
}

impl SpeechEngine for ConsoleEngine {
    fn start(&mut self) -> Result<(), EngineError> {
        let mut mic = self.hub.lock();
        if mic.active {
            return Err(EngineError::AlreadyStarted);
        }
        mic.active = true;
        mic.events = Some(self.events.clone());
        self.events
            .send(EngineEvent::Started)
            .map_err(|e| EngineError::Rejected(e.to_string()))
    }

    fn stop(&mut self) {
        let mut mic = self.hub.lock();
        if mic.active {
            mic.active = false;
            self.events.send(EngineEvent::Ended).ok();
        }
    }

    fn abort(&mut self) {
        let mut mic = self.hub.lock();
        if mic.active {
            mic.active = false;
            self.events
                .send(EngineEvent::Error(EngineErrorCode::Aborted))
                .ok();
            self.events.send(EngineEvent::Ended).ok();
        }
    }

    fn is_active(&self) -> bool {
        self.hub.lock().active
    }
}

// ============================================================================
// Speech synthesis
// ============================================================================

#[derive(Default)]
pub struct ConsoleSynthesizer;

impl SpeechSynthesizer for ConsoleSynthesizer {
    fn speak(&mut self, utterance: Utterance) -> Result<(), SynthesisError> {
        ui::speak(&utterance.text);
        Ok(())
    }

    fn cancel(&mut self) {}

    fn voices(&self) -> Vec<Voice> {
        vec![Voice {
            name: "Console English".into(),
            lang: "en-US".into(),
            default: true,
        }]
    }
}

// ============================================================================
// Page and navigation
// ============================================================================

/// A pretend storefront page
pub struct ConsolePage {
    ids: HashSet<String>,
    categories: HashSet<String>,
    height: i32,
    scroll_top: i32,
}

impl ConsolePage {
    pub fn new(ids: impl IntoIterator<Item = String>, categories: impl IntoIterator<Item = String>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            categories: categories.into_iter().collect(),
            height: 4800,
            scroll_top: 0,
        }
    }

    pub fn scroll_top(&self) -> i32 {
        self.scroll_top
    }
}

impl Page for ConsolePage {
    fn scroll_by(&mut self, delta: i32) {
        self.scroll_top = (self.scroll_top + delta).clamp(0, self.height);
        ui::page_effect(&format!("scrolled to {}px", self.scroll_top));
    }

    fn scroll_to(&mut self, top: i32) {
        self.scroll_top = top.clamp(0, self.height);
        ui::page_effect(&format!("scrolled to {}px", self.scroll_top));
    }

    fn document_height(&self) -> i32 {
        self.height
    }

    fn find_by_id(&self, id: &str) -> Option<ElementRef> {
        self.ids.contains(id).then(|| ElementRef(format!("#{id}")))
    }

    fn find_by_attribute(&self, name: &str, value: &str) -> Option<ElementRef> {
        (name == SECTION_ATTRIBUTE && self.categories.contains(value))
            .then(|| ElementRef(format!("[{name}=\"{value}\"]")))
    }

    fn find_search_field(&self) -> Option<ElementRef> {
        Some(ElementRef("input[name=\"search\"]".into()))
    }

    fn scroll_into_view(&mut self, element: &ElementRef) {
        ui::page_effect(&format!("scrolled {} into view", element.0));
    }

    fn focus(&mut self, element: &ElementRef) {
        ui::page_effect(&format!("focused {}", element.0));
    }

    fn set_value(&mut self, _element: &ElementRef, value: &str) {
        ui::page_effect(&format!("search box = {value:?}"));
    }

    fn submit_enclosing_form(&mut self, _element: &ElementRef) -> bool {
        ui::page_effect("submitted search form");
        true
    }
}

#[derive(Default)]
pub struct ConsoleNavigator {
    path: String,
}

impl ConsoleNavigator {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Navigator for ConsoleNavigator {
    fn navigate(&mut self, path: &str) {
        self.path = path.to_string();
        ui::page_effect(&format!("navigated to {path}"));
    }
}

// ============================================================================
// Permission and errors
// ============================================================================

pub struct ConsoleMicrophone {
    deny: bool,
}

impl ConsoleMicrophone {
    pub fn new(deny: bool) -> Self {
        Self { deny }
    }
}

struct ConsoleProbe;

impl CaptureProbe for ConsoleProbe {
    fn stop_tracks(&mut self) {}
}

impl MicrophoneAccess for ConsoleMicrophone {
    fn query(&self) -> Result<PermissionStatus, PermissionError> {
        Ok(if self.deny {
            PermissionStatus::Denied
        } else {
            PermissionStatus::Prompt
        })
    }

    fn request(&mut self) -> Result<Box<dyn CaptureProbe>, PermissionError> {
        if self.deny {
            Err(PermissionError::Denied("blocked by --deny-mic".into()))
        } else {
            Ok(Box::new(ConsoleProbe))
        }
    }
}

/// Records the error in shared state and prints it
pub struct ConsoleErrorSink {
    state: SharedState,
}

impl ConsoleErrorSink {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }
}

impl ErrorSink for ConsoleErrorSink {
    fn surface(&self, error: &VoiceError) {
        self.state.surface(error);
        ui::error(&error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecognitionConfig;

    fn engine(hub: &ConsoleHub) -> (Box<dyn SpeechEngine>, flume::Receiver<EngineEvent>) {
        let (tx, rx) = flume::unbounded();
        let provider = ConsoleProvider::new(hub.clone());
        let settings = EngineSettings::from(&RecognitionConfig::default());
        (provider.create(&settings, tx).unwrap(), rx)
    }

    #[test]
    fn test_lines_dropped_until_started() {
        let hub = ConsoleHub::new();
        let (mut engine, rx) = engine(&hub);
        assert_eq!(hub.feed("listen now"), Fed::NotListening);

        engine.start().unwrap();
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::Started);
        assert_eq!(hub.feed("listen now"), Fed::Delivered);
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::Result(vec![ResultSegment::final_text("listen now")])
        );
        assert_eq!(hub.feed("   "), Fed::Empty);
    }

    #[test]
    fn test_second_start_reports_already_started() {
        let hub = ConsoleHub::new();
        let (mut engine, _rx) = engine(&hub);
        engine.start().unwrap();
        assert_eq!(engine.start(), Err(EngineError::AlreadyStarted));
    }

    #[test]
    fn test_control_lines() {
        let hub = ConsoleHub::new();
        let (mut engine, rx) = engine(&hub);
        engine.start().unwrap();
        rx.try_recv().unwrap();

        hub.feed("~scroll");
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::Result(vec![ResultSegment::interim("scroll")])
        );

        hub.feed("!error network");
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::Error(EngineErrorCode::Network)
        );
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::Ended);
        assert!(!engine.is_active());

        engine.start().unwrap();
        rx.try_recv().unwrap();
        hub.feed("!end");
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::Ended);
    }

    #[test]
    fn test_stop_emits_end_once() {
        let hub = ConsoleHub::new();
        let (mut engine, rx) = engine(&hub);
        engine.start().unwrap();
        rx.try_recv().unwrap();
        engine.stop();
        engine.stop();
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::Ended);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsupported_provider() {
        let (tx, _rx) = flume::unbounded();
        let provider = ConsoleProvider::unsupported(ConsoleHub::new());
        let settings = EngineSettings::from(&RecognitionConfig::default());
        assert!(!provider.is_supported());
        assert!(matches!(
            provider.create(&settings, tx),
            Err(VoiceError::UnsupportedEnvironment)
        ));
    }

    #[test]
    fn test_page_section_lookup() {
        let page = ConsolePage::new(["electronics".to_string()], ["home-kitchen".to_string()]);
        assert!(page.find_by_id("electronics").is_some());
        assert!(page.find_by_attribute(SECTION_ATTRIBUTE, "home-kitchen").is_some());
        assert!(page.find_by_attribute("data-id", "home-kitchen").is_none());
        assert!(page.find_by_id("sports").is_none());
    }
}
