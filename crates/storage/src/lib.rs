//! In-memory session event log for the voice-chat fallback.
//!
//! Every user utterance and every fragment of assistant speech is appended to
//! a per-session log. The log is the only source of conversation context: the
//! runtime replays it to rebuild question/answer history before each model
//! call.
//!
//! # Core Concepts
//!
//! ## EventStore
//!
//! The [`EventStore`] maps each [`SessionId`] to its [`EventLog`]. It is an
//! explicit, cloneable handle rather than global state, so every consumer is
//! handed the store it should use. Two recording operations feed it:
//!
//! - [`EventStore::record_user_utterance`] creates the session log on first use.
//! - [`EventStore::record_assistant_speech`] only appends to an existing log;
//!   speech for a session that never had a user utterance is dropped.
//!
//! Neither operation can fail.
//!
//! ## EventLog
//!
//! An [`EventLog`] is append-only. Readers take a [`snapshot`](EventStore::snapshot),
//! a consistent copy that later appends do not affect.
//!
//! Logs are kept for the lifetime of the store; nothing is evicted.
//!
//! # Example
//!
//! ```
//! use storage::{EventStore, Role, SessionId};
//!
//! let store = EventStore::new();
//! let session = SessionId::from("living-room");
//!
//! // Dropped: no utterance recorded yet for this session.
//! store.record_assistant_speech(&session, Some("stray"));
//!
//! store.record_user_utterance(&session, Some("What's the weather?"));
//! store.record_assistant_speech(&session, Some("It is sunny"));
//!
//! let log = store.snapshot(&session).unwrap();
//! assert_eq!(log.len(), 2);
//! assert_eq!(log.events()[1].role, Role::Assistant);
//! ```

mod event;
mod store;

pub use event::{Event, Role, SessionId};
pub use store::{EventLog, EventStore};
