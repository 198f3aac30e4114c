//! Voice-chat runtime: history reconstruction, chat backends, and the
//! fallback skill.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **History**: [`reconstruct`] replays a session's event log into ordered
//!   [`QaPair`]s, merging answers that were spoken in several fragments.
//! - **ChatBackend**: a trait abstracting chat model providers, built per
//!   request by a [`Connector`]. [`GeminiBackend`] streams replies from
//!   Google Gemini.
//! - **Speaker**: the boundary to text-to-speech. Whatever is spoken is
//!   expected to come back as assistant speech for the session.
//! - **ChatSkill**: handles the host's utterance, speak and fallback
//!   notifications.
//!
//! # Example
//!
//! ```no_run
//! use runtime::{ChatSkill, GeminiConnector, Settings, Speaker};
//! use storage::{EventStore, SessionId};
//!
//! struct Console;
//!
//! impl Speaker for Console {
//!     fn speak(&self, _session: &SessionId, utterance: &str) {
//!         println!("{utterance}");
//!     }
//! }
//!
//! # async fn example() -> runtime::Result<()> {
//! let settings = Settings::default().with_api_key("AIza...");
//! let skill = ChatSkill::new(EventStore::new(), settings, GeminiConnector, Console);
//!
//! let session = SessionId::generate();
//! skill.handle_utterance(&session, &["What's the weather?".to_string()]);
//! skill.handle_fallback(&session, "What's the weather?")?.await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
pub mod history;
mod settings;
mod skill;
mod speech;

// Chat backends
pub use backend::{
    ChatBackend, ChatRequest, ChatResponse, Connector, GeminiBackend, GeminiBackendBuilder,
    GeminiConnector, TextSink, Usage,
};

// Error types
pub use error::{Error, Result};

// History reconstruction
pub use history::{reconstruct, session_history, QaPair};

// Settings
pub use settings::{Settings, DEFAULT_MODEL, DEFAULT_NAME, DEFAULT_PERSONA, DEFAULT_PRIORITY};

// Speech output
pub use speech::{split_utterances, Dialog, Speaker, UtteranceBuffer};

// Skill
pub use skill::ChatSkill;
