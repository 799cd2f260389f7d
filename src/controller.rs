//! Voice controller - the single event loop that ties the voice layer together
//!
//! Engine events, control commands and timer deadlines all land here and are
//! handled one at a time, so the session, command mode and timers are only
//! ever touched from this loop.

use std::time::Duration;

use tokio::time::Instant;

use crate::actions::{ActionBindings, ActionOutcome, PageAction};
use crate::interpreter::{CommandInterpreter, CommandResult};
use crate::recognition::{EngineEvent, RecognitionDriver, TranscriptEvent};
use crate::state::{SharedState, StateAction};
use crate::tts::FeedbackEmitter;

/// Requests from the UI (buttons, keyboard, the permission prompt)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    Toggle,
    /// The synthesizer's voice list changed
    VoicesChanged,
    /// Microphone access was just granted
    PermissionGranted,
    Shutdown,
}

pub struct VoiceController {
    driver: RecognitionDriver,
    interpreter: CommandInterpreter,
    bindings: ActionBindings,
    feedback: FeedbackEmitter,
    state: SharedState,
    auto_start_delay: Duration,
    auto_start_at: Option<Instant>,
}

impl VoiceController {
    pub fn new(
        driver: RecognitionDriver,
        interpreter: CommandInterpreter,
        bindings: ActionBindings,
        feedback: FeedbackEmitter,
        state: SharedState,
        auto_start_delay: Duration,
    ) -> Self {
        Self {
            driver,
            interpreter,
            bindings,
            feedback,
            state,
            auto_start_delay,
            auto_start_at: None,
        }
    }

    pub fn driver(&self) -> &RecognitionDriver {
        &self.driver
    }

    pub fn interpreter(&self) -> &CommandInterpreter {
        &self.interpreter
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn auto_start_pending(&self) -> bool {
        self.auto_start_at.is_some()
    }

    // ========================================================================
    // Event handling
    // ========================================================================

    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        if let Some(transcript) = self.driver.handle_engine_event(event) {
            self.handle_transcript(&transcript);
        }
    }

    /// Interpret one transcript and carry out the result
    pub fn handle_transcript(&mut self, transcript: &TranscriptEvent) -> CommandResult {
        let result = self
            .interpreter
            .process(&transcript.text, transcript.is_final);

        match &result {
            CommandResult::Ignored => {}
            CommandResult::Activated { announcement } => {
                self.feedback.speak(announcement);
            }
            CommandResult::Deactivated { announcement } => {
                self.feedback.speak(announcement);
                self.driver.stop_recognition();
            }
            CommandResult::Handled {
                rule,
                action,
                response,
            } => {
                tracing::info!(rule = %rule, "Voice command");
                let outcome = action.as_ref().map(|a| (a, self.bindings.perform(a)));
                let speech = match outcome {
                    Some((PageAction::Dispatch { command, argument }, ActionOutcome::NotFound)) => {
                        not_found_response(command, argument)
                    }
                    _ => response.clone(),
                };
                if let Some(text) = speech {
                    self.feedback.speak(&text);
                }
            }
            CommandResult::NotUnderstood(text) => {
                tracing::info!(transcript = %transcript.text, "Command not understood");
                self.feedback.speak(text);
            }
        }

        result
    }

    /// Returns false when the loop should exit
    pub fn handle_control(&mut self, command: ControlCommand) -> bool {
        tracing::debug!(?command, "Control command");
        match command {
            ControlCommand::Start => self.driver.start_recognition(),
            ControlCommand::Stop => {
                self.auto_start_at = None;
                self.driver.stop_recognition();
            }
            ControlCommand::Toggle => self.driver.toggle_recognition(),
            ControlCommand::VoicesChanged => self.feedback.refresh_voices(),
            ControlCommand::PermissionGranted => {
                self.state.dispatch(StateAction::SetMicPermission(true));
                self.schedule_auto_start();
            }
            ControlCommand::Shutdown => {
                self.auto_start_at = None;
                self.driver.stop_recognition();
                self.feedback.cancel();
                return false;
            }
        }
        true
    }

    /// Start listening shortly after permission is granted
    pub fn schedule_auto_start(&mut self) {
        self.auto_start_at = Some(Instant::now() + self.auto_start_delay);
    }

    pub fn poll_timers(&mut self) {
        let now = Instant::now();
        if self.auto_start_at.is_some_and(|at| at <= now) {
            self.auto_start_at = None;
            if self.state.is_listening() || self.state.voice_declined() {
                tracing::debug!("Auto-start skipped");
            } else {
                tracing::info!("Auto-starting voice recognition");
                self.driver.start_recognition();
            }
        }
        self.driver.poll_timers();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.driver.next_deadline(), self.auto_start_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    /// Run until a `Shutdown` command arrives or the control channel closes
    pub async fn run(
        &mut self,
        engine_rx: flume::Receiver<EngineEvent>,
        control_rx: flume::Receiver<ControlCommand>,
    ) {
        loop {
            let deadline = self.next_deadline();
            let timer = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;

                command = control_rx.recv_async() => {
                    match command {
                        Ok(command) => {
                            if !self.handle_control(command) {
                                break;
                            }
                        }
                        Err(_) => {
                            self.driver.stop_recognition();
                            break;
                        }
                    }
                }

                Ok(event) = engine_rx.recv_async() => {
                    self.handle_engine_event(event);
                }

                _ = timer, if deadline.is_some() => {
                    self.poll_timers();
                }
            }
        }
        tracing::info!("Voice controller stopped");
    }
}

fn not_found_response(command: &str, argument: &str) -> Option<String> {
    match command {
        "enter" => Some("Select a product first".to_string()),
        _ if !argument.is_empty() => Some(format!("I couldn't find {argument}")),
        _ => None,
    }
}
