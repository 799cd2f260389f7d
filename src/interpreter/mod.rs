//! Command interpreter - turns final transcripts into page actions
//!
//! Two states, kept in the shared [`RuntimeState`](crate::state::RuntimeState):
//! 1. Idle - only the activation phrases do anything
//! 2. Command mode - deactivation phrases first, then the ordered rule table,
//!    then a spoken "not understood" fallback
//!
//! The interpreter only decides. Running the action, speaking the response and
//! stopping recognition is left to the caller.

pub mod rules;

use crate::actions::PageAction;
use crate::config::Config;
use crate::fuzzy::clean_for_matching;
use crate::state::{SharedState, StateAction};

pub use rules::{ActionRef, CommandRule, Matcher, Response};

pub const ACTIVATED: &str = "Voice commands activated. I'm listening for your commands.";
pub const DEACTIVATED: &str = "Voice commands deactivated.";
pub const NOT_UNDERSTOOD: &str =
    "I didn't understand that command. Say \"help\" to hear available commands.";

/// Result of interpreting one transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Interim result, or idle and not an activation phrase
    Ignored,

    /// Entered command mode
    Activated { announcement: String },

    /// Left command mode. The caller must stop recognition.
    Deactivated { announcement: String },

    /// A rule matched. Either part may be absent (e.g. "search for" with no term).
    Handled {
        rule: String,
        action: Option<PageAction>,
        response: Option<String>,
    },

    /// Command mode, nothing matched
    NotUnderstood(String),
}

impl CommandResult {
    /// Text to speak for this result, if any
    pub fn response(&self) -> Option<&str> {
        match self {
            CommandResult::Ignored => None,
            CommandResult::Activated { announcement }
            | CommandResult::Deactivated { announcement } => Some(announcement),
            CommandResult::Handled { response, .. } => response.as_deref(),
            CommandResult::NotUnderstood(text) => Some(text),
        }
    }

    pub fn action(&self) -> Option<&PageAction> {
        match self {
            CommandResult::Handled { action, .. } => action.as_ref(),
            _ => None,
        }
    }
}

pub struct CommandInterpreter {
    activation: Vec<String>,
    deactivation: Vec<String>,
    rules: Vec<CommandRule>,
    state: SharedState,
}

impl CommandInterpreter {
    pub fn new(config: &Config, state: SharedState) -> Self {
        let rules = rules::compile(
            config.commands.enable_builtin,
            &config.scroll,
            &config.sections,
            &config.commands.custom,
        );
        tracing::debug!(rules = rules.len(), "Compiled command table");

        Self {
            activation: phrase_list(&config.commands.activation),
            deactivation: phrase_list(&config.commands.deactivation),
            rules,
            state,
        }
    }

    pub fn rules(&self) -> &[CommandRule] {
        &self.rules
    }

    pub fn activation_phrases(&self) -> &[String] {
        &self.activation
    }

    pub fn deactivation_phrases(&self) -> &[String] {
        &self.deactivation
    }

    /// Interpret one transcript. Never fails.
    pub fn process(&self, text: &str, is_final: bool) -> CommandResult {
        if !is_final {
            return CommandResult::Ignored;
        }

        let command = normalize(text);
        if command.is_empty() {
            return CommandResult::Ignored;
        }
        tracing::debug!(command = %command, "Processing voice command");

        // Activation works in any state
        if matches_any(&self.activation, &command) {
            self.state.dispatch(StateAction::SetCommandMode(true));
            tracing::info!("Command mode on");
            return CommandResult::Activated {
                announcement: ACTIVATED.to_string(),
            };
        }

        // Read at the moment of processing, never cached
        let command_mode = self.state.is_command_mode();

        if command_mode && matches_any(&self.deactivation, &command) {
            self.state.dispatch(StateAction::SetCommandMode(false));
            tracing::info!("Command mode off");
            return CommandResult::Deactivated {
                announcement: DEACTIVATED.to_string(),
            };
        }

        for rule in &self.rules {
            if rule.requires_command_mode && !command_mode {
                continue;
            }
            if rule.matches(&command) {
                return evaluate(rule, &command);
            }
        }

        if !command_mode {
            return CommandResult::Ignored;
        }
        CommandResult::NotUnderstood(NOT_UNDERSTOOD.to_string())
    }
}

fn evaluate(rule: &CommandRule, command: &str) -> CommandResult {
    let action = match &rule.action {
        ActionRef::Fixed(action) => Some(action.clone()),
        ActionRef::Extract(extract) => match extract(command) {
            Some(action) => Some(action),
            None => {
                tracing::debug!(rule = %rule.name, "Rule matched with nothing to extract");
                return CommandResult::Handled {
                    rule: rule.name.clone(),
                    action: None,
                    response: None,
                };
            }
        },
        ActionRef::SpeakOnly => None,
    };

    CommandResult::Handled {
        rule: rule.name.clone(),
        action,
        response: Some(rule.response.render(command)),
    }
}

/// Lowercase, trim, and drop trailing punctuation
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim_end()
        .to_string()
}

fn phrase_list(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|p| clean_for_matching(p).trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Punctuation inside the utterance ("listen, now") should not block a phrase
fn matches_any(phrases: &[String], command: &str) -> bool {
    let cleaned = clean_for_matching(command);
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    phrases
        .iter()
        .any(|phrase| command.contains(phrase.as_str()) || cleaned.contains(phrase.as_str()))
}
