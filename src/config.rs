use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "voicecart.toml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default = "default_sections")]
    pub sections: Vec<SectionConfig>,
    #[serde(default)]
    pub scroll: ScrollConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recognition: RecognitionConfig::default(),
            speech: SpeechConfig::default(),
            commands: CommandsConfig::default(),
            sections: default_sections(),
            scroll: ScrollConfig::default(),
        }
    }
}

// ============================================================================
// Recognition Config
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecognitionConfig {
    /// BCP-47 locale handed to the speech engine
    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_true")]
    pub continuous: bool,

    #[serde(default = "default_true")]
    pub interim_results: bool,

    /// Debounce before restarting an engine that ended on its own
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,

    /// Backoff before building a fresh engine after a failed restart
    #[serde(default = "default_reinit_delay_ms")]
    pub reinit_delay_ms: u64,

    /// Liveness check interval while listening
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Consecutive failed re-initializations before voice is disabled
    #[serde(default = "default_max_reinit_attempts")]
    pub max_reinit_attempts: u32,

    /// Delay between the mic permission being granted and listening starting
    #[serde(default = "default_auto_start_delay_ms")]
    pub auto_start_delay_ms: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            continuous: true,
            interim_results: true,
            restart_delay_ms: default_restart_delay_ms(),
            reinit_delay_ms: default_reinit_delay_ms(),
            keep_alive_secs: default_keep_alive_secs(),
            max_reinit_attempts: default_max_reinit_attempts(),
            auto_start_delay_ms: default_auto_start_delay_ms(),
        }
    }
}

impl RecognitionConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn reinit_delay(&self) -> Duration {
        Duration::from_millis(self.reinit_delay_ms)
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn auto_start_delay(&self) -> Duration {
        Duration::from_millis(self.auto_start_delay_ms)
    }

    /// Reject timings the recognition timers cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_KEEP_ALIVE_SECS).contains(&self.keep_alive_secs),
            "keep_alive_secs must be between 1 and {MAX_KEEP_ALIVE_SECS}, got {}",
            self.keep_alive_secs
        );
        for (name, value) in [
            ("restart_delay_ms", self.restart_delay_ms),
            ("reinit_delay_ms", self.reinit_delay_ms),
            ("auto_start_delay_ms", self.auto_start_delay_ms),
        ] {
            ensure!(
                value <= MAX_DELAY_MS,
                "{name} must be at most {MAX_DELAY_MS}, got {value}"
            );
        }
        ensure!(
            self.max_reinit_attempts >= 1,
            "max_reinit_attempts must be at least 1"
        );
        Ok(())
    }
}

const MAX_KEEP_ALIVE_SECS: u64 = 3600;
const MAX_DELAY_MS: u64 = 600_000;

fn default_locale() -> String {
    "en-US".into()
}

fn default_true() -> bool {
    true
}

fn default_restart_delay_ms() -> u64 {
    500
}

fn default_reinit_delay_ms() -> u64 {
    1000
}

fn default_keep_alive_secs() -> u64 {
    10
}

fn default_max_reinit_attempts() -> u32 {
    5
}

fn default_auto_start_delay_ms() -> u64 {
    1000
}

// ============================================================================
// Speech Feedback Config
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpeechConfig {
    #[serde(default = "default_rate")]
    pub rate: f32,

    #[serde(default = "default_pitch")]
    pub pitch: f32,

    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Substrings of voice names considered higher quality, in preference order
    #[serde(default = "default_preferred_voices")]
    pub preferred_voices: Vec<String>,

    /// Language prefix a preferred voice should have
    #[serde(default = "default_voice_lang")]
    pub voice_lang: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            pitch: default_pitch(),
            volume: default_volume(),
            preferred_voices: default_preferred_voices(),
            voice_lang: default_voice_lang(),
        }
    }
}

fn default_rate() -> f32 {
    0.9
}

fn default_pitch() -> f32 {
    1.0
}

fn default_volume() -> f32 {
    0.8
}

fn default_preferred_voices() -> Vec<String> {
    vec!["Google".to_string(), "Microsoft".to_string()]
}

fn default_voice_lang() -> String {
    "en".into()
}

// ============================================================================
// Commands Config
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CommandsConfig {
    /// Wake phrases, recognized in any state
    #[serde(default = "default_activation")]
    pub activation: Vec<String>,

    /// Phrases that leave command mode and stop recognition
    #[serde(default = "default_deactivation")]
    pub deactivation: Vec<String>,

    /// Enable built-in navigation commands
    #[serde(default = "default_true")]
    pub enable_builtin: bool,

    /// Custom command mappings
    #[serde(default)]
    pub custom: Vec<CustomCommand>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            activation: default_activation(),
            deactivation: default_deactivation(),
            enable_builtin: true,
            custom: Vec::new(),
        }
    }
}

/// `action` is one of `navigate:/path`, `section:id`, `scroll:<delta>`,
/// `search:<term>` or `say:<text>`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomCommand {
    pub phrase: String,
    pub action: String,
}

fn default_activation() -> Vec<String> {
    vec!["listen now".to_string(), "start listening".to_string()]
}

fn default_deactivation() -> Vec<String> {
    vec!["stop listening".to_string(), "stop commands".to_string()]
}

// ============================================================================
// Page Config
// ============================================================================

/// A page section reachable by voice ("go to electronics")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SectionConfig {
    /// Element id, also matched against `data-category`
    pub id: String,
    pub phrases: Vec<String>,
    /// Spoken name, defaults to the id
    #[serde(default)]
    pub label: Option<String>,
}

impl SectionConfig {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

fn default_sections() -> Vec<SectionConfig> {
    ["electronics", "fashion", "home", "sports"]
        .into_iter()
        .map(|id| SectionConfig {
            id: id.to_string(),
            phrases: vec![format!("go to {id}"), format!("show {id}")],
            label: None,
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScrollConfig {
    /// Pixels per "scroll up" / "scroll down"
    #[serde(default = "default_scroll_step")]
    pub step: i32,

    /// Scroll distance when a requested section cannot be found
    #[serde(default = "default_section_fallback")]
    pub section_fallback: i32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            step: default_scroll_step(),
            section_fallback: default_section_fallback(),
        }
    }
}

fn default_scroll_step() -> i32 {
    300
}

fn default_section_fallback() -> i32 {
    400
}

impl Config {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists, or defaults.
    ///
    /// An explicitly named file must exist. A file that exists but does not
    /// parse is always an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    return Ok(Config::default());
                }
                fallback
            }
        };

        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config
            .recognition
            .validate()
            .context("invalid [recognition] settings")?;
        Ok(config)
    }

    /// Effective configuration, as it would be written in the config file
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing config")
    }
}
