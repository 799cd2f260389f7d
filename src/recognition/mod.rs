//! Continuous speech recognition with automatic recovery

pub mod driver;
pub mod engine;
pub mod session;
pub mod supervisor;

pub use driver::RecognitionDriver;
pub use engine::{
    EngineErrorCode, EngineEvent, EngineProvider, EngineSettings, ResultSegment, SpeechEngine,
    TranscriptEvent,
};
pub use session::{Effect, RecognitionSession, StartOrigin, Trigger};
pub use supervisor::{Supervisor, TimerFired};
