//! Event types for the session log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An opaque identifier for a conversation session.
///
/// The host decides what a session id looks like; no format is assumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random session id, for hosts that do not supply one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A recognized user utterance.
    User,
    /// A fragment of synthesized assistant speech.
    Assistant,
}

/// An event in a session log.
///
/// `id` and `timestamp` identify the event in trace output; ordering is the
/// position in the log, never the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    /// Utterance or speech fragment. Empty strings are kept; `None` means the
    /// notification carried no text at all.
    pub text: Option<String>,
}

impl Event {
    pub fn new(role: Role, text: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            text: text.map(str::to_owned),
        }
    }

    pub fn user(text: &str) -> Self {
        Self::new(Role::User, Some(text))
    }

    pub fn assistant(text: &str) -> Self {
        Self::new(Role::Assistant, Some(text))
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_is_opaque() {
        let id = SessionId::from("default");
        assert_eq!(id.as_str(), "default");
        assert_eq!(id.to_string(), "default");
        assert_eq!(SessionId::new(String::new()).as_str(), "");
    }

    #[test]
    fn generated_session_ids_differ() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn event_serializes_lowercase_role() {
        let event = Event::assistant("It is sunny");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["text"], "It is sunny");
    }

    #[test]
    fn absent_text_is_not_empty_text() {
        let absent = Event::new(Role::User, None);
        let empty = Event::user("");
        assert_eq!(absent.text(), None);
        assert_eq!(empty.text(), Some(""));
    }
}
