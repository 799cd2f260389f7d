//! Recognition session state machine
//!
//! The session tracks one logical continuous-listening attempt. Transitions are
//! pure: [`RecognitionSession::apply`] takes a [`Trigger`] (an explicit call, an
//! engine callback or a timer) and returns the [`Effect`]s the driver must carry
//! out. Nothing here touches the engine, timers or shared state directly, so the
//! lifecycle races can be tested without a speech engine.
//!
//! Two guard flags carry the correctness of the whole lifecycle:
//! - `starting` is set while an engine start is outstanding; a second start is a no-op.
//! - `should_stop` is set by an explicit stop; while it is set no restart is scheduled.

use crate::error::{EngineError, ErrorKind, VoiceError};
use crate::recognition::engine::EngineErrorCode;

/// Who asked for the outstanding engine start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOrigin {
    /// `start_recognition`
    Explicit,
    /// Debounced restart, keep-alive or re-initialization
    Restart,
}

/// Inputs to the session
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// Explicit start request (permission already checked)
    Start,
    /// Explicit stop request
    Stop,
    /// The provider could not construct an engine at all
    EngineUnavailable,
    EngineStarted,
    EngineEnded,
    EngineError(EngineErrorCode),
    /// The engine's start primitive failed synchronously
    StartRejected(EngineError),
    /// Debounced restart timer fired
    RestartDue,
    /// Re-initialization backoff fired
    ReinitDue,
    /// Periodic liveness check
    KeepAliveTick { engine_alive: bool },
}

/// Work the driver performs on behalf of the session
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Call the engine's start primitive, building an engine first if none exists
    StartEngine,
    StopEngine,
    /// Drop the engine handle so the next start builds a fresh one
    DiscardEngine,
    /// Debounced restart; replaces any pending restart
    ScheduleRestart,
    /// Debounced restart, only if none is pending yet
    EnsureRestart,
    /// Backoff before starting a fresh engine
    ScheduleReinit,
    /// Cancel pending restart and re-initialization timers
    CancelRestarts,
    ArmKeepAlive,
    DisarmKeepAlive,
    SetListening(bool),
    RevokePermission,
    DisableVoice,
    Surface(VoiceError),
}

/// One continuous listening attempt
#[derive(Debug, Clone)]
pub struct RecognitionSession {
    /// The engine reported it is running
    active: bool,
    /// An engine start call is outstanding
    starting: bool,
    /// Explicitly stopped; suppresses every auto-restart path
    should_stop: bool,
    /// Logically supposed to be listening
    intent: bool,
    origin: Option<StartOrigin>,
    last_error: Option<ErrorKind>,
    failed_reinits: u32,
    max_reinit_attempts: u32,
    /// Fatal: no engine, or restarts exhausted
    disabled: bool,
}

impl RecognitionSession {
    pub fn new(max_reinit_attempts: u32) -> Self {
        Self {
            active: false,
            starting: false,
            should_stop: false,
            intent: false,
            origin: None,
            last_error: None,
            failed_reinits: 0,
            max_reinit_attempts: max_reinit_attempts.max(1),
            disabled: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_starting(&self) -> bool {
        self.starting
    }

    pub fn should_stop(&self) -> bool {
        self.should_stop
    }

    /// Whether the session is logically supposed to be listening
    pub fn wants_listening(&self) -> bool {
        self.intent
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    pub fn failed_reinits(&self) -> u32 {
        self.failed_reinits
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// All auto-restart paths share this guard
    fn may_restart(&self) -> bool {
        self.intent && !self.should_stop && !self.starting && !self.disabled
    }

    /// Process a trigger and return the effects to execute, in order
    pub fn apply(&mut self, trigger: Trigger) -> Vec<Effect> {
        match trigger {
            Trigger::Start => self.start(),
            Trigger::Stop => self.stop(),
            Trigger::EngineUnavailable => self.engine_unavailable(),
            Trigger::EngineStarted => self.engine_started(),
            Trigger::EngineEnded => self.engine_ended(),
            Trigger::EngineError(code) => self.engine_error(code),
            Trigger::StartRejected(error) => self.start_rejected(error),
            Trigger::RestartDue | Trigger::ReinitDue => self.restart(),
            Trigger::KeepAliveTick { engine_alive } => {
                if !engine_alive && self.may_restart() {
                    tracing::info!("Keep-alive found recognition inactive, restarting");
                    vec![Effect::EnsureRestart]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn start(&mut self) -> Vec<Effect> {
        if self.disabled {
            tracing::debug!("Start ignored: voice recognition disabled");
            return Vec::new();
        }
        if self.starting {
            tracing::debug!("Start ignored: start already in flight");
            return Vec::new();
        }
        if self.active && self.intent && !self.should_stop {
            tracing::debug!("Start ignored: already listening");
            return Vec::new();
        }

        self.should_stop = false;
        self.starting = true;
        self.intent = true;
        self.origin = Some(StartOrigin::Explicit);
        self.last_error = None;
        self.failed_reinits = 0;

        vec![
            Effect::CancelRestarts,
            Effect::SetListening(true),
            Effect::ArmKeepAlive,
            Effect::StartEngine,
        ]
    }

    fn stop(&mut self) -> Vec<Effect> {
        self.should_stop = true;
        self.intent = false;
        self.active = false;
        self.starting = false;
        self.origin = None;

        vec![
            Effect::StopEngine,
            Effect::CancelRestarts,
            Effect::DisarmKeepAlive,
            Effect::SetListening(false),
        ]
    }

    /// Leave the listening intent without marking an explicit stop
    fn abandon(&mut self) -> Vec<Effect> {
        self.intent = false;
        self.starting = false;
        self.origin = None;

        vec![
            Effect::CancelRestarts,
            Effect::DisarmKeepAlive,
            Effect::SetListening(false),
        ]
    }

    fn engine_unavailable(&mut self) -> Vec<Effect> {
        let first_report = !self.disabled;
        self.disabled = true;
        self.last_error = Some(ErrorKind::UnsupportedEnvironment);

        let mut effects = self.abandon();
        if first_report {
            effects.push(Effect::DisableVoice);
            effects.push(Effect::Surface(VoiceError::UnsupportedEnvironment));
        }
        effects
    }

    fn engine_started(&mut self) -> Vec<Effect> {
        self.starting = false;
        self.origin = None;

        if self.should_stop || !self.intent {
            // Came up after we stopped it
            self.active = false;
            return vec![Effect::StopEngine];
        }

        self.active = true;
        self.failed_reinits = 0;
        Vec::new()
    }

    fn engine_ended(&mut self) -> Vec<Effect> {
        self.active = false;

        if self.starting {
            // The outstanding start ended without a started callback. Clear the
            // guard so the keep-alive check can recover the session later.
            self.starting = false;
            self.origin = None;
            return Vec::new();
        }

        if self.may_restart() {
            vec![Effect::ScheduleRestart]
        } else {
            Vec::new()
        }
    }

    fn engine_error(&mut self, code: EngineErrorCode) -> Vec<Effect> {
        match code {
            EngineErrorCode::NotAllowed => {
                self.last_error = Some(ErrorKind::PermissionDenied);
                let mut effects = vec![Effect::RevokePermission];
                effects.extend(self.stop());
                effects.push(Effect::Surface(VoiceError::PermissionDenied));
                effects
            }
            EngineErrorCode::NoSpeech => {
                self.last_error = Some(ErrorKind::NoSpeechTimeout);
                if self.may_restart() {
                    vec![Effect::ScheduleRestart]
                } else {
                    Vec::new()
                }
            }
            EngineErrorCode::AudioCapture => {
                self.last_error = Some(ErrorKind::DeviceUnavailable);
                let mut effects = self.abandon();
                effects.push(Effect::Surface(VoiceError::DeviceUnavailable));
                effects
            }
            EngineErrorCode::Network => {
                self.last_error = Some(ErrorKind::TransportError);
                let mut effects = vec![Effect::Surface(VoiceError::TransportError)];
                if self.may_restart() {
                    effects.push(Effect::ScheduleRestart);
                }
                effects
            }
            EngineErrorCode::Aborted => {
                self.last_error = Some(ErrorKind::Aborted);
                Vec::new()
            }
            EngineErrorCode::Other(code) => {
                self.last_error = Some(ErrorKind::Engine);
                vec![Effect::Surface(VoiceError::Engine(code))]
            }
        }
    }

    fn restart(&mut self) -> Vec<Effect> {
        if !self.may_restart() {
            return Vec::new();
        }
        self.starting = true;
        self.origin = Some(StartOrigin::Restart);
        vec![Effect::StartEngine]
    }

    fn start_rejected(&mut self, error: EngineError) -> Vec<Effect> {
        let origin = self.origin.take();
        self.starting = false;

        let message = match error {
            EngineError::AlreadyStarted => {
                tracing::debug!("Engine already running, treating start as success");
                self.active = true;
                return Vec::new();
            }
            EngineError::Rejected(message) => message,
        };

        match origin {
            Some(StartOrigin::Restart) => {
                self.failed_reinits += 1;
                tracing::warn!(
                    attempt = self.failed_reinits,
                    max = self.max_reinit_attempts,
                    "Recognition restart failed: {}",
                    message
                );

                if self.failed_reinits >= self.max_reinit_attempts {
                    self.disabled = true;
                    self.should_stop = true;
                    self.active = false;
                    self.last_error = Some(ErrorKind::RestartExhausted);
                    let mut effects = vec![Effect::StopEngine, Effect::DiscardEngine];
                    effects.extend(self.abandon());
                    effects.push(Effect::DisableVoice);
                    effects.push(Effect::Surface(VoiceError::RestartExhausted(
                        self.failed_reinits,
                    )));
                    effects
                } else {
                    vec![Effect::DiscardEngine, Effect::ScheduleReinit]
                }
            }
            Some(StartOrigin::Explicit) | None => {
                self.last_error = Some(ErrorKind::StartFailed);
                let mut effects = self.abandon();
                effects.push(Effect::Surface(VoiceError::StartFailed(message)));
                effects
            }
        }
    }
}

impl Default for RecognitionSession {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listening_session() -> RecognitionSession {
        let mut session = RecognitionSession::new(3);
        session.apply(Trigger::Start);
        session.apply(Trigger::EngineStarted);
        session
    }

    #[test]
    fn test_start_issues_one_engine_start() {
        let mut session = RecognitionSession::new(3);
        let effects = session.apply(Trigger::Start);
        assert_eq!(
            effects.iter().filter(|e| **e == Effect::StartEngine).count(),
            1
        );
        assert!(effects.contains(&Effect::SetListening(true)));
        assert!(effects.contains(&Effect::ArmKeepAlive));
        assert!(session.is_starting());
        assert!(!session.is_active());
    }

    #[test]
    fn test_second_start_while_starting_is_noop() {
        let mut session = RecognitionSession::new(3);
        session.apply(Trigger::Start);
        assert!(session.apply(Trigger::Start).is_empty());
    }

    #[test]
    fn test_started_clears_starting() {
        let session = listening_session();
        assert!(session.is_active());
        assert!(!session.is_starting());
        assert!(session.wants_listening());
    }

    #[test]
    fn test_spontaneous_end_schedules_restart() {
        let mut session = listening_session();
        let effects = session.apply(Trigger::EngineEnded);
        assert_eq!(effects, vec![Effect::ScheduleRestart]);
        assert!(!session.is_active());
    }

    #[test]
    fn test_end_after_stop_does_not_restart() {
        let mut session = listening_session();
        let effects = session.apply(Trigger::Stop);
        assert!(effects.contains(&Effect::StopEngine));
        assert!(effects.contains(&Effect::CancelRestarts));
        assert!(effects.contains(&Effect::DisarmKeepAlive));
        assert!(session.should_stop());

        assert!(session.apply(Trigger::EngineEnded).is_empty());
        assert!(session.apply(Trigger::RestartDue).is_empty());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut session = listening_session();
        let first = session.apply(Trigger::Stop);
        let second = session.apply(Trigger::Stop);
        assert_eq!(first, second);
        assert!(!session.is_active());
        assert!(!session.is_starting());
    }

    #[test]
    fn test_restart_due_starts_engine() {
        let mut session = listening_session();
        session.apply(Trigger::EngineEnded);
        assert_eq!(session.apply(Trigger::RestartDue), vec![Effect::StartEngine]);
        assert!(session.is_starting());
        // A second timer firing while the restart is in flight does nothing
        assert!(session.apply(Trigger::RestartDue).is_empty());
    }

    #[test]
    fn test_already_started_counts_as_success() {
        let mut session = listening_session();
        session.apply(Trigger::EngineEnded);
        session.apply(Trigger::RestartDue);
        let effects = session.apply(Trigger::StartRejected(EngineError::AlreadyStarted));
        assert!(effects.is_empty());
        assert!(session.is_active());
        assert!(!session.is_starting());
    }

    #[test]
    fn test_failed_restart_schedules_reinit() {
        let mut session = listening_session();
        session.apply(Trigger::EngineEnded);
        session.apply(Trigger::RestartDue);
        let effects =
            session.apply(Trigger::StartRejected(EngineError::Rejected("busy".into())));
        assert_eq!(effects, vec![Effect::DiscardEngine, Effect::ScheduleReinit]);
        assert_eq!(session.failed_reinits(), 1);
    }

    #[test]
    fn test_reinit_attempts_are_bounded() {
        let mut session = listening_session();
        session.apply(Trigger::EngineEnded);

        let mut last = Vec::new();
        for _ in 0..3 {
            assert_eq!(session.apply(Trigger::ReinitDue), vec![Effect::StartEngine]);
            last = session.apply(Trigger::StartRejected(EngineError::Rejected("busy".into())));
        }

        assert!(session.is_disabled());
        assert!(last.contains(&Effect::DisableVoice));
        assert!(last.contains(&Effect::Surface(VoiceError::RestartExhausted(3))));
        assert!(session.apply(Trigger::ReinitDue).is_empty());
        assert!(session.apply(Trigger::Start).is_empty());
    }

    #[test]
    fn test_started_resets_failure_counter() {
        let mut session = listening_session();
        session.apply(Trigger::EngineEnded);
        session.apply(Trigger::RestartDue);
        session.apply(Trigger::StartRejected(EngineError::Rejected("busy".into())));
        session.apply(Trigger::ReinitDue);
        session.apply(Trigger::EngineStarted);
        assert_eq!(session.failed_reinits(), 0);
    }

    #[test]
    fn test_explicit_start_failure_surfaces() {
        let mut session = RecognitionSession::new(3);
        session.apply(Trigger::Start);
        let effects =
            session.apply(Trigger::StartRejected(EngineError::Rejected("blocked".into())));
        assert!(effects.contains(&Effect::Surface(VoiceError::StartFailed("blocked".into()))));
        assert!(effects.contains(&Effect::SetListening(false)));
        assert!(!session.is_starting());
        assert!(!session.wants_listening());
        assert_eq!(session.last_error(), Some(ErrorKind::StartFailed));
    }

    #[test]
    fn test_permission_denied_forces_stop() {
        let mut session = listening_session();
        let effects = session.apply(Trigger::EngineError(EngineErrorCode::NotAllowed));
        assert_eq!(effects.first(), Some(&Effect::RevokePermission));
        assert!(effects.contains(&Effect::StopEngine));
        assert!(effects.contains(&Effect::Surface(VoiceError::PermissionDenied)));
        assert!(session.should_stop());
        assert!(session.apply(Trigger::EngineEnded).is_empty());
    }

    #[test]
    fn test_no_speech_restarts_silently() {
        let mut session = listening_session();
        let effects = session.apply(Trigger::EngineError(EngineErrorCode::NoSpeech));
        assert_eq!(effects, vec![Effect::ScheduleRestart]);
        assert_eq!(session.last_error(), Some(ErrorKind::NoSpeechTimeout));
    }

    #[test]
    fn test_device_unavailable_does_not_restart() {
        let mut session = listening_session();
        let effects = session.apply(Trigger::EngineError(EngineErrorCode::AudioCapture));
        assert!(effects.contains(&Effect::Surface(VoiceError::DeviceUnavailable)));
        assert!(!effects.contains(&Effect::ScheduleRestart));
        assert!(session.apply(Trigger::EngineEnded).is_empty());
        assert!(!session.should_stop());
    }

    #[test]
    fn test_network_error_surfaces_and_restarts() {
        let mut session = listening_session();
        let effects = session.apply(Trigger::EngineError(EngineErrorCode::Network));
        assert_eq!(
            effects,
            vec![
                Effect::Surface(VoiceError::TransportError),
                Effect::ScheduleRestart
            ]
        );
    }

    #[test]
    fn test_unknown_error_surfaces_generic_message() {
        let mut session = listening_session();
        let effects =
            session.apply(Trigger::EngineError(EngineErrorCode::Other("bad-grammar".into())));
        assert_eq!(
            effects,
            vec![Effect::Surface(VoiceError::Engine("bad-grammar".into()))]
        );
    }

    #[test]
    fn test_aborted_is_silent() {
        let mut session = listening_session();
        assert!(session.apply(Trigger::EngineError(EngineErrorCode::Aborted)).is_empty());
    }

    #[test]
    fn test_keep_alive_respects_should_stop() {
        let mut session = listening_session();
        session.apply(Trigger::Stop);
        assert!(session
            .apply(Trigger::KeepAliveTick { engine_alive: false })
            .is_empty());
    }

    #[test]
    fn test_keep_alive_restarts_dead_engine() {
        let mut session = listening_session();
        assert!(session
            .apply(Trigger::KeepAliveTick { engine_alive: true })
            .is_empty());
        assert_eq!(
            session.apply(Trigger::KeepAliveTick { engine_alive: false }),
            vec![Effect::EnsureRestart]
        );
    }

    #[test]
    fn test_engine_unavailable_reported_once() {
        let mut session = RecognitionSession::new(3);
        session.apply(Trigger::Start);
        let first = session.apply(Trigger::EngineUnavailable);
        assert!(first.contains(&Effect::Surface(VoiceError::UnsupportedEnvironment)));
        let second = session.apply(Trigger::EngineUnavailable);
        assert!(!second
            .iter()
            .any(|e| matches!(e, Effect::Surface(_))));
        assert!(session.apply(Trigger::Start).is_empty());
    }

    #[test]
    fn test_started_after_stop_stops_engine_again() {
        let mut session = RecognitionSession::new(3);
        session.apply(Trigger::Start);
        session.apply(Trigger::Stop);
        assert_eq!(session.apply(Trigger::EngineStarted), vec![Effect::StopEngine]);
        assert!(!session.is_active());
    }

    #[test]
    fn test_end_during_start_clears_guard_without_restart() {
        let mut session = RecognitionSession::new(3);
        session.apply(Trigger::Start);
        assert!(session.apply(Trigger::EngineEnded).is_empty());
        assert!(!session.is_starting());
        assert_eq!(
            session.apply(Trigger::KeepAliveTick { engine_alive: false }),
            vec![Effect::EnsureRestart]
        );
    }
}
