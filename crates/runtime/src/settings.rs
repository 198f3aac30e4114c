//! Skill settings.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PERSONA: &str = "You are a helpful voice assistant with a friendly tone \
    and fun sense of humor. You respond in 40 words or fewer.";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_NAME: &str = "Gemini Chat";
pub const DEFAULT_PRIORITY: u8 = 85;

/// Settings for the chat skill.
///
/// Every field has a default, so a partial TOML table only overrides what it
/// names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// System instruction sent with every request.
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Model to use.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name the assistant is announced as in dialogs.
    #[serde(default = "default_name")]
    pub name: String,

    /// Speak an "asking" confirmation before the model answers.
    #[serde(default = "default_confirmation")]
    pub confirmation: bool,

    /// API key. Without one the skill does not answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Fallback priority reported to the host.
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_persona() -> String {
    DEFAULT_PERSONA.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_confirmation() -> bool {
    true
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            persona: default_persona(),
            model: default_model(),
            name: default_name(),
            confirmation: default_confirmation(),
            api_key: None,
            priority: default_priority(),
        }
    }
}

impl Settings {
    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// The API key, if one is set and non-empty.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    /// Whether the skill can answer at all.
    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }
}
