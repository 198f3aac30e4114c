//! Conversation history reconstruction.
//!
//! Turns a session's flat event log back into question/answer turns. A single
//! answer may have been spoken as several fragments; those are merged. A new
//! utterance always starts a fresh question, so a question that never got an
//! answer is discarded instead of pairing with a later reply.

use storage::{EventLog, EventStore, Role, SessionId};

/// Separator placed between merged speech fragments.
pub const FRAGMENT_SEPARATOR: &str = ". ";

/// One reconstructed turn: a question and its merged answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

impl QaPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

impl<Q: Into<String>, A: Into<String>> From<(Q, A)> for QaPair {
    fn from((question, answer): (Q, A)) -> Self {
        Self::new(question, answer)
    }
}

/// Replay a log into ordered question/answer pairs.
///
/// Pure: the log is only read, and the same log always yields the same pairs.
pub fn reconstruct(log: &EventLog) -> Vec<QaPair> {
    let mut pairs = Vec::new();
    let mut question: Option<String> = None;
    let mut answer: Option<String> = None;

    for event in log {
        match event.role {
            Role::User => {
                if let (Some(q), Some(a)) = (question.take(), answer.take()) {
                    pairs.push(QaPair::new(q, a));
                }
                answer = None;
                question = event.text.clone();
            }
            Role::Assistant => {
                let Some(text) = event.text() else {
                    continue;
                };
                match answer.as_mut() {
                    None => answer = Some(text.to_owned()),
                    Some(merged) => {
                        merged.push_str(FRAGMENT_SEPARATOR);
                        merged.push_str(text);
                    }
                }
            }
        }
    }

    // A trailing question with no speech after it is still in flight.
    if let (Some(q), Some(a)) = (question, answer) {
        pairs.push(QaPair::new(q, a));
    }
    pairs
}

/// Reconstruct the history of one session. Unknown sessions have no history.
pub fn session_history(store: &EventStore, session_id: &SessionId) -> Vec<QaPair> {
    store
        .snapshot(session_id)
        .map(|log| reconstruct(&log))
        .unwrap_or_default()
}
