//! Recognition driver - keeps one continuous listening session alive
//!
//! The driver owns the engine handle, the [`RecognitionSession`] state machine
//! and the [`Supervisor`] timers. Every public call and every engine event is
//! turned into a [`Trigger`]; the session decides, the driver executes.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::time::Instant;

use crate::config::RecognitionConfig;
use crate::error::{EngineError, ErrorSink, VoiceError};
use crate::recognition::engine::{
    EngineEvent, EngineProvider, EngineSettings, SpeechEngine, TranscriptEvent,
};
use crate::recognition::session::{Effect, RecognitionSession, Trigger};
use crate::recognition::supervisor::{Supervisor, TimerFired};
use crate::state::{SharedState, StateAction};

pub struct RecognitionDriver {
    provider: Box<dyn EngineProvider>,
    settings: EngineSettings,
    engine: Option<Box<dyn SpeechEngine>>,
    /// Handed to every engine we build
    events: flume::Sender<EngineEvent>,
    session: RecognitionSession,
    supervisor: Supervisor,
    state: SharedState,
    sink: Arc<dyn ErrorSink>,
}

impl RecognitionDriver {
    pub fn new(
        provider: Box<dyn EngineProvider>,
        config: &RecognitionConfig,
        events: flume::Sender<EngineEvent>,
        state: SharedState,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            provider,
            settings: EngineSettings::from(config),
            engine: None,
            events,
            session: RecognitionSession::new(config.max_reinit_attempts),
            supervisor: Supervisor::new(
                config.restart_delay(),
                config.reinit_delay(),
                config.keep_alive_interval(),
            ),
            state,
            sink,
        }
    }

    // ========================================================================
    // Public API
    // ========================================================================

    pub fn start_recognition(&mut self) {
        if !self.state.has_mic_permission() {
            tracing::debug!("Start requested without microphone permission");
            self.surface(VoiceError::MicPermissionRequired);
            return;
        }
        self.apply(Trigger::Start);
    }

    /// Authoritative cancellation point. Idempotent.
    pub fn stop_recognition(&mut self) {
        self.apply(Trigger::Stop);
    }

    pub fn toggle_recognition(&mut self) {
        if self.session.wants_listening() {
            self.stop_recognition();
        } else {
            self.start_recognition();
        }
    }

    /// Feed one engine callback. Returns the transcript for result events.
    pub fn handle_engine_event(&mut self, event: EngineEvent) -> Option<TranscriptEvent> {
        match event {
            EngineEvent::Started => {
                tracing::debug!("Engine started");
                self.apply(Trigger::EngineStarted);
                None
            }
            EngineEvent::Ended => {
                tracing::debug!("Engine ended");
                self.apply(Trigger::EngineEnded);
                None
            }
            EngineEvent::Error(code) => {
                tracing::debug!(code = code.as_str(), "Engine error");
                self.apply(Trigger::EngineError(code));
                None
            }
            EngineEvent::Result(segments) => {
                let transcript = TranscriptEvent::from_segments(&segments);
                self.state
                    .dispatch(StateAction::SetTranscript(transcript.text.clone()));
                Some(transcript)
            }
        }
    }

    /// Run every timer that is due now
    pub fn poll_timers(&mut self) {
        let now = Instant::now();
        for fired in self.supervisor.poll(now) {
            let trigger = match fired {
                TimerFired::Restart => Trigger::RestartDue,
                TimerFired::Reinit => Trigger::ReinitDue,
                TimerFired::KeepAlive => Trigger::KeepAliveTick {
                    engine_alive: self.engine_active(),
                },
            };
            self.apply(trigger);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.supervisor.next_deadline()
    }

    pub fn session(&self) -> &RecognitionSession {
        &self.session
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn is_supported(&self) -> bool {
        self.provider.is_supported()
    }

    fn engine_active(&self) -> bool {
        self.engine.as_ref().is_some_and(|engine| engine.is_active())
    }

    // ========================================================================
    // Effect execution
    // ========================================================================

    fn apply(&mut self, trigger: Trigger) {
        let mut pending = VecDeque::from([trigger]);
        while let Some(trigger) = pending.pop_front() {
            for effect in self.session.apply(trigger) {
                if let Some(follow_up) = self.execute(effect) {
                    pending.push_back(follow_up);
                }
            }
        }
    }

    fn execute(&mut self, effect: Effect) -> Option<Trigger> {
        match effect {
            Effect::StartEngine => return self.start_engine(),
            Effect::StopEngine => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.stop();
                }
            }
            Effect::DiscardEngine => {
                if let Some(mut engine) = self.engine.take() {
                    engine.abort();
                }
            }
            Effect::ScheduleRestart => self.supervisor.schedule_restart(Instant::now()),
            Effect::EnsureRestart => self.supervisor.ensure_restart(Instant::now()),
            Effect::ScheduleReinit => self.supervisor.schedule_reinit(Instant::now()),
            Effect::CancelRestarts => self.supervisor.cancel_restarts(),
            Effect::ArmKeepAlive => self.supervisor.arm_keep_alive(Instant::now()),
            Effect::DisarmKeepAlive => self.supervisor.disarm_keep_alive(),
            Effect::SetListening(listening) => {
                self.state.dispatch(StateAction::SetListening(listening));
            }
            Effect::RevokePermission => {
                self.state.dispatch(StateAction::SetMicPermission(false));
            }
            Effect::DisableVoice => self.state.dispatch(StateAction::DisableVoice),
            Effect::Surface(error) => self.surface(error),
        }
        None
    }

    fn start_engine(&mut self) -> Option<Trigger> {
        if self.engine.is_none() {
            if !self.provider.is_supported() {
                return Some(Trigger::EngineUnavailable);
            }
            match self.provider.create(&self.settings, self.events.clone()) {
                Ok(engine) => {
                    tracing::debug!(locale = %self.settings.locale, "Created speech engine");
                    self.engine = Some(engine);
                }
                Err(VoiceError::UnsupportedEnvironment) => {
                    return Some(Trigger::EngineUnavailable);
                }
                Err(e) => {
                    return Some(Trigger::StartRejected(EngineError::Rejected(e.to_string())));
                }
            }
        }

        let engine = self.engine.as_mut()?;
        match engine.start() {
            Ok(()) => None,
            Err(e) => Some(Trigger::StartRejected(e)),
        }
    }

    fn surface(&self, error: VoiceError) {
        if !error.is_user_facing() {
            return;
        }
        tracing::warn!("{}", error);
        self.sink.surface(&error);
    }
}
