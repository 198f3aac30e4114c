//! Chat backend abstraction.
//!
//! A backend answers one question given the reconstructed conversation so
//! far. Replies are streamed so the first sentence can be spoken before the
//! rest has arrived. Backends are built per request by a [`Connector`], so
//! edited settings (a rotated key, a different model) apply to the next
//! question.

mod gemini;

pub use gemini::{GeminiBackend, GeminiBackendBuilder, GeminiConnector};

use crate::history::QaPair;
use crate::settings::Settings;
use crate::Result;
use std::future::Future;

/// Request to send to a chat backend.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    /// Prior turns, oldest first.
    pub history: &'a [QaPair],
    /// The new question.
    pub question: &'a str,
    pub system: Option<&'a str>,
}

/// Response from a chat backend.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Usage,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Receives reply text as it arrives.
pub type TextSink<'s> = &'s mut (dyn FnMut(&str) + Send);

/// Trait for chat backends.
pub trait ChatBackend: Send + Sync {
    /// Send a chat request and stream the reply into `on_text`.
    ///
    /// Text handed to the sink before an error is already delivered; the
    /// error only says the reply ended early.
    fn chat_stream(
        &self,
        request: ChatRequest<'_>,
        on_text: TextSink<'_>,
    ) -> impl Future<Output = Result<Usage>> + Send;

    /// Send a chat request and get the whole response.
    fn chat(
        &self,
        request: ChatRequest<'_>,
    ) -> impl Future<Output = Result<ChatResponse>> + Send {
        async move {
            let mut content = String::new();
            let usage = self
                .chat_stream(request, &mut |text: &str| content.push_str(text))
                .await?;
            Ok(ChatResponse { content, usage })
        }
    }
}

/// Builds a backend from the current settings.
pub trait Connector: Send + Sync + 'static {
    type Backend: ChatBackend + 'static;

    fn connect(&self, settings: &Settings) -> Result<Self::Backend>;
}
