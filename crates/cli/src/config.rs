//! Configuration loading from voice-chat.toml.

use runtime::Settings;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chat skill settings.
    #[serde(default)]
    pub skill: Settings,

    /// Logging configuration.
    #[serde(default)]
    pub log: LogConfig,
}

/// Logging configuration.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default `tracing` filter; `RUST_LOG` takes precedence.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Create a default configuration.
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Fill a missing API key from `key`, typically the environment.
    pub fn with_fallback_key(mut self, key: Option<String>) -> Self {
        if !self.skill.is_configured() {
            if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
                self.skill.api_key = Some(key);
            }
        }
        self
    }

    /// Render the settings as TOML with the API key masked.
    pub fn redacted(&self) -> Result<String, ConfigError> {
        let mut skill = self.skill.clone();
        if skill.api_key.is_some() {
            skill.api_key = Some("********".to_string());
        }
        let shown = Config {
            skill,
            log: LogConfig {
                filter: self.log.filter.clone(),
            },
        };
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
