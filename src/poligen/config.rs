//! Configuration for PoliGen.
//!
//! [`PoliGenConfig`] is a plain struct: build it by hand, start from
//! `PoliGenConfig::default()`, or read the environment with
//! [`PoliGenConfig::from_env`]. An `OAI_CONFIG_LIST`-style JSON array can be
//! parsed with [`LlmConfig::from_config_list_json`].
//!
//! # Example
//!
//! ```rust
//! use poligen::PoliGenConfig;
//!
//! let config = PoliGenConfig {
//!     api_key: Some("sk-test".into()),
//!     ..PoliGenConfig::default()
//! };
//! assert_eq!(config.llm.model, "gpt-4-turbo-preview");
//! assert_eq!(config.max_round, 10);
//! ```

use std::error::Error;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::bridge::HUMAN_INPUT_TIMEOUT;
use crate::group_chat::{SpeakerSelection, DEFAULT_MAX_ROUND};

/// Environment variable holding the OpenAI credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable overriding the model name.
pub const MODEL_ENV: &str = "POLIGEN_MODEL";
/// Environment variable selecting `auto` or `round_robin` speaker selection.
pub const SPEAKER_SELECTION_ENV: &str = "POLIGEN_SPEAKER_SELECTION";

/// LLM request settings shared by every participant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    /// Credential carried by a config list entry. Takes part in credential resolution.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout", with = "secs")]
    pub request_timeout: Duration,
    #[serde(default = "default_retry_wait_time", with = "secs")]
    pub retry_wait_time: Duration,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_retry_wait_time() -> Duration {
    Duration::from_secs(10)
}

mod secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4-turbo-preview".to_string(),
            api_key: None,
            base_url: None,
            request_timeout: default_request_timeout(),
            retry_wait_time: default_retry_wait_time(),
        }
    }
}

impl LlmConfig {
    /// Parse a JSON config list (`[{"model": "...", "api_key": "..."}, ...]`)
    /// and return its first entry.
    pub fn from_config_list_json(json: &str) -> Result<Self, ConfigError> {
        let list: Vec<LlmConfig> =
            serde_json::from_str(json).map_err(|e| ConfigError::InvalidConfigList(e.to_string()))?;
        list.into_iter().next().ok_or(ConfigError::EmptyConfigList)
    }
}

/// Global settings of a PoliGen deployment.
#[derive(Debug, Clone)]
pub struct PoliGenConfig {
    /// Credential supplied by the hosting session. Wins over the environment.
    pub api_key: Option<String>,
    pub llm: LlmConfig,
    pub max_round: usize,
    pub human_input_timeout: Duration,
    /// Per-participant history budget in tokens.
    pub max_tokens: usize,
    pub speaker_selection: SpeakerSelection,
}

impl Default for PoliGenConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            llm: LlmConfig::default(),
            max_round: DEFAULT_MAX_ROUND,
            human_input_timeout: HUMAN_INPUT_TIMEOUT,
            max_tokens: 8_192,
            speaker_selection: SpeakerSelection::RoundRobin,
        }
    }
}

impl PoliGenConfig {
    /// Defaults overridden by `OPENAI_API_KEY`, `POLIGEN_MODEL` and
    /// `POLIGEN_SPEAKER_SELECTION` when they are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self {
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()),
            ..Self::default()
        };
        if let Ok(model) = std::env::var(MODEL_ENV) {
            config.llm.model = model;
        }
        if let Ok(selection) = std::env::var(SPEAKER_SELECTION_ENV) {
            config.speaker_selection = parse_speaker_selection(&selection)?;
        }
        Ok(config)
    }

    /// The API credential: the session value, then the config list entry, then
    /// the environment.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        self.api_key
            .clone()
            .or_else(|| self.llm.api_key.clone())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }
}

/// Parse `auto` / `round_robin` (case-insensitive).
pub fn parse_speaker_selection(value: &str) -> Result<SpeakerSelection, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "auto" => Ok(SpeakerSelection::Auto),
        "round_robin" | "round-robin" => Ok(SpeakerSelection::RoundRobin),
        other => Err(ConfigError::InvalidValue {
            key: SPEAKER_SELECTION_ENV,
            value: other.to_string(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingApiKey,
    InvalidConfigList(String),
    EmptyConfigList,
    InvalidValue { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingApiKey => write!(
                f,
                "No OpenAI API key: set it on the session or in {}",
                API_KEY_ENV
            ),
            ConfigError::InvalidConfigList(e) => write!(f, "Invalid config list: {}", e),
            ConfigError::EmptyConfigList => write!(f, "Config list is empty"),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value '{}' for {}", value, key)
            }
        }
    }
}

impl Error for ConfigError {}
