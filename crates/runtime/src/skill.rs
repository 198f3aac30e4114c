//! The fallback chat skill.
//!
//! Wires the host's three notifications to the session log and the chat
//! backend:
//!
//! - a recognized utterance is recorded as a user event;
//! - spoken assistant text is recorded as a speech fragment;
//! - an unanswered utterance is forwarded to the model in the background, with
//!   the session's reconstructed history as context. The reply is spoken
//!   sentence by sentence while it streams in.

use crate::backend::{ChatBackend, ChatRequest, Connector, TextSink, Usage};
use crate::history::{session_history, QaPair};
use crate::settings::Settings;
use crate::speech::{Dialog, Speaker, UtteranceBuffer};
use crate::{Error, Result};
use std::sync::{Arc, PoisonError, RwLock};
use storage::{EventStore, SessionId};
use tokio::task::JoinHandle;

/// A chat skill bound to one event store, connector and speaker.
///
/// Cloning is cheap; clones share all state.
pub struct ChatSkill<C, S> {
    inner: Arc<Inner<C, S>>,
}

struct Inner<C, S> {
    store: EventStore,
    settings: RwLock<Settings>,
    connector: C,
    speaker: S,
}

impl<C, S> Clone for ChatSkill<C, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector, S: Speaker> ChatSkill<C, S> {
    pub fn new(store: EventStore, settings: Settings, connector: C, speaker: S) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                settings: RwLock::new(settings),
                connector,
                speaker,
            }),
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.inner.store
    }

    /// A copy of the current settings.
    pub fn settings(&self) -> Settings {
        self.inner
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the settings. Applies from the next question on.
    pub fn update_settings(&self, settings: Settings) {
        *self
            .inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Fallback priority to register with the host.
    pub fn priority(&self) -> u8 {
        self.settings().priority
    }

    /// The skill will try any utterance.
    pub fn can_answer(&self, _utterance: &str) -> bool {
        true
    }

    /// A recognized utterance arrived. Only the first transcription is kept.
    pub fn handle_utterance(&self, session_id: &SessionId, utterances: &[String]) {
        let Some(utterance) = utterances.first() else {
            tracing::debug!(session = %session_id, "utterance notification without text");
            return;
        };
        self.inner
            .store
            .record_user_utterance(session_id, Some(utterance.as_str()));
    }

    /// The assistant spoke, whoever asked for it.
    pub fn handle_speak(&self, session_id: &SessionId, utterance: Option<&str>) {
        self.inner
            .store
            .record_assistant_speech(session_id, utterance);
    }

    /// The host found no other handler for `utterance`.
    ///
    /// Returns [`Error::NotConfigured`] without speaking when no API key is
    /// set. Otherwise the answer is produced on a background task so the
    /// caller is never held up by the network.
    pub fn handle_fallback(
        &self,
        session_id: &SessionId,
        utterance: &str,
    ) -> Result<JoinHandle<()>> {
        let settings = self.settings();
        if !settings.is_configured() {
            tracing::error!("chat skill not configured yet, set api_key in the settings");
            return Err(Error::NotConfigured);
        }

        if settings.confirmation {
            self.inner
                .speaker
                .speak_dialog(session_id, Dialog::Asking, &settings.name);
        }

        let skill = self.clone();
        let session_id = session_id.clone();
        let utterance = utterance.to_string();
        Ok(tokio::spawn(async move {
            skill.answer(&session_id, &utterance).await;
        }))
    }

    /// Ask the model and speak its reply as it streams in, or the error
    /// dialog if nothing could be spoken.
    ///
    /// Sentences already spoken stay spoken when the stream breaks; only an
    /// unfinished trailing sentence is lost.
    pub async fn answer(&self, session_id: &SessionId, utterance: &str) {
        let settings = self.settings();
        let history = session_history(&self.inner.store, session_id);
        let speaker = &self.inner.speaker;

        let mut buffer = UtteranceBuffer::new();
        let mut spoken = 0usize;
        let mut speak_ready = |text: &str| {
            for part in buffer.push(text) {
                spoken += 1;
                speaker.speak(session_id, &part);
            }
        };
        let result = self
            .ask(&settings, &history, utterance, &mut speak_ready)
            .await;

        match result {
            Ok(usage) => {
                for part in buffer.finish() {
                    spoken += 1;
                    speaker.speak(session_id, &part);
                }
                tracing::info!(
                    session = %session_id,
                    turns = history.len(),
                    utterances = spoken,
                    tokens = usage.total_tokens(),
                    "chat answered"
                );
            }
            Err(e) => tracing::error!(
                session = %session_id,
                utterances = spoken,
                error = %e,
                "chat request failed"
            ),
        }

        if spoken == 0 {
            speaker.speak_dialog(session_id, Dialog::Error, &settings.name);
        }
    }

    async fn ask(
        &self,
        settings: &Settings,
        history: &[QaPair],
        question: &str,
        on_text: TextSink<'_>,
    ) -> Result<Usage> {
        let backend = self.inner.connector.connect(settings)?;
        backend
            .chat_stream(
                ChatRequest {
                    history,
                    question,
                    system: Some(&settings.persona),
                },
                on_text,
            )
            .await
    }
}
