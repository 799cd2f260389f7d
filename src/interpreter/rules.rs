//! The ordered command table
//!
//! Rules are compiled once at startup from the built-ins and the config file
//! and never change afterwards. The first rule whose matcher fits wins.

use std::fmt;

use crate::actions::{PageAction, ScrollEdge};
use crate::config::{CustomCommand, ScrollConfig, SectionConfig};

pub const HELP_TEXT: &str = "You can say: scroll up, scroll down, go to electronics, search for products, stop listening, or ask for help.";

/// How a rule recognizes a (normalized) transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Phrase appears anywhere in the transcript
    Contains(String),
    /// Transcript is exactly the phrase
    Exact(String),
}

impl Matcher {
    pub fn contains(phrase: &str) -> Self {
        Matcher::Contains(phrase.to_lowercase())
    }

    pub fn exact(phrase: &str) -> Self {
        Matcher::Exact(phrase.to_lowercase())
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            Matcher::Contains(phrase) => text.contains(phrase.as_str()),
            Matcher::Exact(phrase) => text == phrase,
        }
    }

    pub fn phrase(&self) -> &str {
        match self {
            Matcher::Contains(phrase) | Matcher::Exact(phrase) => phrase,
        }
    }
}

/// Pulls an action out of the transcript. `None` means the rule matched but
/// there is nothing to do, and nothing is spoken either.
pub type Extractor = fn(&str) -> Option<PageAction>;

#[derive(Clone)]
pub enum ActionRef {
    Fixed(PageAction),
    Extract(Extractor),
    /// Spoken response only
    SpeakOnly,
}

#[derive(Clone)]
pub enum Response {
    Fixed(String),
    Dynamic(fn(&str) -> String),
}

impl Response {
    pub fn render(&self, transcript: &str) -> String {
        match self {
            Response::Fixed(text) => text.clone(),
            Response::Dynamic(render) => render(transcript),
        }
    }
}

#[derive(Clone)]
pub struct CommandRule {
    pub name: String,
    pub matchers: Vec<Matcher>,
    pub requires_command_mode: bool,
    pub action: ActionRef,
    pub response: Response,
}

impl CommandRule {
    fn new(name: impl Into<String>, matchers: Vec<Matcher>, action: ActionRef, response: Response) -> Self {
        Self {
            name: name.into(),
            matchers,
            requires_command_mode: true,
            action,
            response,
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(text))
    }
}

impl fmt::Debug for CommandRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRule")
            .field("name", &self.name)
            .field("matchers", &self.matchers)
            .field("requires_command_mode", &self.requires_command_mode)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for CommandRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrases: Vec<String> = self
            .matchers
            .iter()
            .map(|m| match m {
                Matcher::Contains(p) => format!("\"{p}\""),
                Matcher::Exact(p) => format!("={p}"),
            })
            .collect();
        write!(f, "{:<16} {}", self.name, phrases.join(", "))
    }
}

// ============================================================================
// Table assembly
// ============================================================================

/// Compile the full rule table in priority order
pub fn compile(
    builtin: bool,
    scroll: &ScrollConfig,
    sections: &[SectionConfig],
    custom: &[CustomCommand],
) -> Vec<CommandRule> {
    let mut rules = Vec::new();
    if builtin {
        rules.extend(motion_rules(scroll));
    }
    rules.extend(section_rules(sections));
    if builtin {
        rules.extend(page_rules());
        rules.push(search_rule());
        rules.extend(catalog_rules());
    }
    rules.extend(custom_rules(custom));
    if builtin {
        rules.push(help_rule());
    }
    rules
}

fn motion_rules(scroll: &ScrollConfig) -> Vec<CommandRule> {
    vec![
        CommandRule::new(
            "scroll-down",
            vec![Matcher::contains("scroll down")],
            ActionRef::Fixed(PageAction::ScrollBy(scroll.step)),
            Response::Fixed("Scrolling down".into()),
        ),
        CommandRule::new(
            "scroll-up",
            vec![Matcher::contains("scroll up")],
            ActionRef::Fixed(PageAction::ScrollBy(-scroll.step)),
            Response::Fixed("Scrolling up".into()),
        ),
        CommandRule::new(
            "top",
            vec![Matcher::contains("go to top"), Matcher::contains("scroll to top")],
            ActionRef::Fixed(PageAction::ScrollTo(ScrollEdge::Top)),
            Response::Fixed("Going to top of page".into()),
        ),
        CommandRule::new(
            "bottom",
            vec![Matcher::contains("go to bottom"), Matcher::contains("scroll to bottom")],
            ActionRef::Fixed(PageAction::ScrollTo(ScrollEdge::Bottom)),
            Response::Fixed("Going to bottom of page".into()),
        ),
    ]
}

fn section_rules(sections: &[SectionConfig]) -> Vec<CommandRule> {
    sections
        .iter()
        .filter(|section| !section.phrases.is_empty())
        .map(|section| {
            CommandRule::new(
                format!("section:{}", section.id),
                section.phrases.iter().map(|p| Matcher::contains(p)).collect(),
                ActionRef::Fixed(PageAction::FocusSection(section.id.clone())),
                Response::Fixed(format!("Going to {} section", section.label())),
            )
        })
        .collect()
}

fn page_rules() -> Vec<CommandRule> {
    vec![
        CommandRule::new(
            "home-page",
            vec![Matcher::contains("go home"), Matcher::contains("go to home page")],
            ActionRef::Fixed(PageAction::Navigate("/".into())),
            Response::Fixed("Going to home page".into()),
        ),
        CommandRule::new(
            "admin",
            vec![Matcher::contains("admin dashboard"), Matcher::contains("go to admin")],
            ActionRef::Fixed(PageAction::Navigate("/admin".into())),
            Response::Fixed("Going to admin dashboard".into()),
        ),
    ]
}

fn search_rule() -> CommandRule {
    CommandRule::new(
        "search",
        vec![Matcher::contains("search for")],
        ActionRef::Extract(|text| search_term(text).map(|term| PageAction::Search(term.to_string()))),
        Response::Dynamic(|text| format!("Searching for {}", search_term(text).unwrap_or_default())),
    )
}

fn catalog_rules() -> Vec<CommandRule> {
    vec![
        CommandRule::new(
            "select",
            vec![Matcher::contains("select")],
            ActionRef::Extract(|text| {
                let name = text_after(text, "select")?;
                Some(PageAction::Dispatch {
                    command: "select".into(),
                    argument: name.to_string(),
                })
            }),
            Response::Dynamic(|text| format!("Selecting {}", text_after(text, "select").unwrap_or_default())),
        ),
        CommandRule::new(
            "enter",
            vec![
                Matcher::exact("enter"),
                Matcher::exact("open"),
                Matcher::contains("view details"),
            ],
            ActionRef::Fixed(PageAction::Dispatch {
                command: "enter".into(),
                argument: String::new(),
            }),
            Response::Fixed("Opening product details".into()),
        ),
        CommandRule::new(
            "exit",
            vec![
                Matcher::exact("exit"),
                Matcher::exact("close"),
                Matcher::contains("close details"),
            ],
            ActionRef::Fixed(PageAction::Dispatch {
                command: "exit".into(),
                argument: String::new(),
            }),
            Response::Fixed("Closing product details".into()),
        ),
    ]
}

fn help_rule() -> CommandRule {
    CommandRule::new(
        "help",
        vec![Matcher::contains("help"), Matcher::contains("what can i say")],
        ActionRef::SpeakOnly,
        Response::Fixed(HELP_TEXT.into()),
    )
}

fn custom_rules(custom: &[CustomCommand]) -> Vec<CommandRule> {
    custom
        .iter()
        .filter_map(|c| {
            let Some((action, response)) = parse_action(&c.action) else {
                tracing::warn!(phrase = %c.phrase, action = %c.action, "Ignoring custom command with unknown action");
                return None;
            };
            Some(CommandRule::new(
                format!("custom:{}", c.phrase.to_lowercase()),
                vec![Matcher::contains(&c.phrase)],
                action,
                response,
            ))
        })
        .collect()
}

/// Parse an action string from config
fn parse_action(action: &str) -> Option<(ActionRef, Response)> {
    let (kind, value) = action.split_once(':')?;
    let value = value.trim();

    match kind.trim() {
        "navigate" if value.starts_with('/') => Some((
            ActionRef::Fixed(PageAction::Navigate(value.to_string())),
            Response::Fixed(format!("Going to {value}")),
        )),
        "section" if !value.is_empty() => Some((
            ActionRef::Fixed(PageAction::FocusSection(value.to_string())),
            Response::Fixed(format!("Going to {value} section")),
        )),
        "scroll" => {
            let delta: i32 = value.parse().ok()?;
            let response = if delta < 0 { "Scrolling up" } else { "Scrolling down" };
            Some((
                ActionRef::Fixed(PageAction::ScrollBy(delta)),
                Response::Fixed(response.into()),
            ))
        }
        "search" if !value.is_empty() => Some((
            ActionRef::Fixed(PageAction::Search(value.to_string())),
            Response::Fixed(format!("Searching for {value}")),
        )),
        "say" if !value.is_empty() => Some((ActionRef::SpeakOnly, Response::Fixed(value.to_string()))),
        _ => None,
    }
}

// ============================================================================
// Extraction helpers
// ============================================================================

/// Everything after the first occurrence of `phrase`, trimmed. `None` if empty.
pub fn text_after<'a>(text: &'a str, phrase: &str) -> Option<&'a str> {
    let start = text.find(phrase)? + phrase.len();
    let rest = text[start..].trim();
    (!rest.is_empty()).then_some(rest)
}

/// Search term in "... search for <term>"
pub fn search_term(text: &str) -> Option<&str> {
    text_after(text, "search for")
}
