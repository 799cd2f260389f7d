//! Recording fakes for every external collaborator of the voice layer

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use voicecart::actions::{ActionBindings, ElementRef, Navigator, Page};
use voicecart::bus::CommandBus;
use voicecart::config::Config;
use voicecart::error::{EngineError, ErrorSink, VoiceError};
use voicecart::recognition::{
    EngineEvent, EngineProvider, EngineSettings, RecognitionDriver, ResultSegment, SpeechEngine,
};
use voicecart::tts::{FeedbackEmitter, SpeechSynthesizer, SynthesisError, Utterance, Voice};
use voicecart::{CommandInterpreter, RuntimeState, SharedState, VoiceController};

// ============================================================================
// Speech engine
// ============================================================================

#[derive(Default)]
pub struct EngineLog {
    pub created: usize,
    pub starts: usize,
    pub stops: usize,
    pub aborts: usize,
    pub active: bool,
    /// Every start after this many succeeds fails with `Rejected`
    pub reject_after: Option<usize>,
    pub events: Option<flume::Sender<EngineEvent>>,
}

#[derive(Clone, Default)]
pub struct Engines(Arc<Mutex<EngineLog>>);

impl Engines {
    pub fn log(&self) -> MutexGuard<'_, EngineLog> {
        self.0.lock().unwrap()
    }

    pub fn starts(&self) -> usize {
        self.log().starts
    }

    pub fn stops(&self) -> usize {
        self.log().stops
    }

    pub fn reject_after(&self, successful: usize) {
        self.log().reject_after = Some(successful);
    }

    /// The engine ends on its own, as providers do after silence
    pub fn end_by_itself(&self) {
        let mut log = self.log();
        log.active = false;
        if let Some(events) = &log.events {
            events.send(EngineEvent::Ended).unwrap();
        }
    }

    pub fn emit(&self, event: EngineEvent) {
        if let Some(events) = &self.log().events {
            events.send(event).unwrap();
        }
    }

    pub fn say(&self, text: &str) {
        self.emit(EngineEvent::Result(vec![ResultSegment::final_text(text)]));
    }
}

pub struct MockProvider {
    engines: Engines,
    supported: bool,
}

impl MockProvider {
    pub fn new(engines: &Engines) -> Self {
        Self {
            engines: engines.clone(),
            supported: true,
        }
    }

    pub fn unsupported(engines: &Engines) -> Self {
        Self {
            engines: engines.clone(),
            supported: false,
        }
    }
}

impl EngineProvider for MockProvider {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(
        &self,
        _settings: &EngineSettings,
        events: flume::Sender<EngineEvent>,
    ) -> Result<Box<dyn SpeechEngine>, VoiceError> {
        if !self.supported {
            return Err(VoiceError::UnsupportedEnvironment);
        }
        let mut log = self.engines.log();
        log.created += 1;
        log.events = Some(events);
        Ok(Box::new(MockEngine {
            engines: self.engines.clone(),
        }))
    }
}

pub struct MockEngine {
    engines: Engines,
}

impl SpeechEngine for MockEngine {
    fn start(&mut self) -> Result<(), EngineError> {
        let mut log = self.engines.log();
        if log.active {
            return Err(EngineError::AlreadyStarted);
        }
        if log.reject_after.is_some_and(|n| log.starts >= n) {
            return Err(EngineError::Rejected("engine refused to start".into()));
        }
        log.starts += 1;
        log.active = true;
        if let Some(events) = &log.events {
            events.send(EngineEvent::Started).unwrap();
        }
        Ok(())
    }

    fn stop(&mut self) {
        let mut log = self.engines.log();
        log.stops += 1;
        if log.active {
            log.active = false;
            if let Some(events) = &log.events {
                events.send(EngineEvent::Ended).unwrap();
            }
        }
    }

    fn abort(&mut self) {
        let mut log = self.engines.log();
        log.aborts += 1;
        log.active = false;
    }

    fn is_active(&self) -> bool {
        self.engines.log().active
    }
}

// ============================================================================
// Page, navigation, synthesis, errors
// ============================================================================

#[derive(Default)]
pub struct PageLog {
    pub scroll_deltas: Vec<i32>,
    pub scroll_top: i32,
    pub revealed: Vec<String>,
    pub focused: Vec<String>,
    pub search_value: Option<String>,
    pub paths: Vec<String>,
    pub utterances: Vec<String>,
    pub errors: Vec<VoiceError>,
}

#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<PageLog>>);

impl Recorder {
    pub fn log(&self) -> MutexGuard<'_, PageLog> {
        self.0.lock().unwrap()
    }

    pub fn utterances(&self) -> Vec<String> {
        self.log().utterances.clone()
    }
}

pub struct MockPage {
    recorder: Recorder,
    ids: Vec<String>,
}

impl Page for MockPage {
    fn scroll_by(&mut self, delta: i32) {
        let mut log = self.recorder.log();
        log.scroll_deltas.push(delta);
        log.scroll_top += delta;
    }

    fn scroll_to(&mut self, top: i32) {
        self.recorder.log().scroll_top = top;
    }

    fn document_height(&self) -> i32 {
        3000
    }

    fn find_by_id(&self, id: &str) -> Option<ElementRef> {
        self.ids
            .iter()
            .any(|known| known == id)
            .then(|| ElementRef(id.to_string()))
    }

    fn find_by_attribute(&self, _name: &str, _value: &str) -> Option<ElementRef> {
        None
    }

    fn find_search_field(&self) -> Option<ElementRef> {
        Some(ElementRef("search".into()))
    }

    fn scroll_into_view(&mut self, element: &ElementRef) {
        self.recorder.log().revealed.push(element.0.clone());
    }

    fn focus(&mut self, element: &ElementRef) {
        self.recorder.log().focused.push(element.0.clone());
    }

    fn set_value(&mut self, _element: &ElementRef, value: &str) {
        self.recorder.log().search_value = Some(value.to_string());
    }

    fn submit_enclosing_form(&mut self, _element: &ElementRef) -> bool {
        true
    }
}

pub struct MockNavigator(Recorder);

impl Navigator for MockNavigator {
    fn navigate(&mut self, path: &str) {
        self.0.log().paths.push(path.to_string());
    }
}

pub struct MockSynth(Recorder);

impl SpeechSynthesizer for MockSynth {
    fn speak(&mut self, utterance: Utterance) -> Result<(), SynthesisError> {
        self.0.log().utterances.push(utterance.text);
        Ok(())
    }

    fn cancel(&mut self) {}

    fn voices(&self) -> Vec<Voice> {
        vec![Voice::new("Google US English", "en-US")]
    }
}

pub struct MockSink(Recorder);

impl ErrorSink for MockSink {
    fn surface(&self, error: &VoiceError) {
        self.0.log().errors.push(error.clone());
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub state: SharedState,
    pub engines: Engines,
    pub recorder: Recorder,
    pub engine_rx: flume::Receiver<EngineEvent>,
}

impl Harness {
    /// Deliver every queued engine event to the driver
    pub fn pump_driver(&self, driver: &mut RecognitionDriver) {
        while let Ok(event) = self.engine_rx.try_recv() {
            driver.handle_engine_event(event);
        }
    }

    pub fn pump(&self, controller: &mut VoiceController) {
        while let Ok(event) = self.engine_rx.try_recv() {
            controller.handle_engine_event(event);
        }
    }

    pub fn errors(&self) -> Vec<VoiceError> {
        self.recorder.log().errors.clone()
    }
}

pub fn driver_with(
    config: &Config,
    provider: impl FnOnce(&Engines) -> MockProvider,
) -> (Harness, RecognitionDriver) {
    let state = RuntimeState::new();
    let engines = Engines::default();
    let recorder = Recorder::default();
    let (engine_tx, engine_rx) = flume::unbounded();

    let driver = RecognitionDriver::new(
        Box::new(provider(&engines)),
        &config.recognition,
        engine_tx,
        state.clone(),
        Arc::new(MockSink(recorder.clone())),
    );

    (
        Harness {
            state,
            engines,
            recorder,
            engine_rx,
        },
        driver,
    )
}

pub fn driver() -> (Harness, RecognitionDriver) {
    driver_with(&Config::default(), MockProvider::new)
}

/// A controller over mock collaborators. The microphone permission is not granted yet.
pub fn controller() -> (Harness, VoiceController) {
    let config = Config::default();
    let (harness, driver) = driver_with(&config, MockProvider::new);

    let page = MockPage {
        recorder: harness.recorder.clone(),
        ids: config.sections.iter().map(|s| s.id.clone()).collect(),
    };
    let bindings = ActionBindings::new(
        Box::new(page),
        Box::new(MockNavigator(harness.recorder.clone())),
        Arc::new(Mutex::new(CommandBus::new())),
        config.scroll.clone(),
    );
    let feedback = FeedbackEmitter::new(
        Some(Box::new(MockSynth(harness.recorder.clone()))),
        config.speech.clone(),
    );
    let interpreter = CommandInterpreter::new(&config, harness.state.clone());

    let controller = VoiceController::new(
        driver,
        interpreter,
        bindings,
        feedback,
        harness.state.clone(),
        config.recognition.auto_start_delay(),
    );
    (harness, controller)
}
