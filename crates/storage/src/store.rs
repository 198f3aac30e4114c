//! In-memory, per-session event store.

use crate::{Event, Role, SessionId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// An ordered, append-only sequence of events for one session.
///
/// There is no way to remove or reorder events; the only mutation is
/// [`EventStore`]-internal `append`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

type SharedLog = Arc<Mutex<EventLog>>;

/// Process-wide mapping from session id to its event log.
///
/// Cloning the store clones the handle; all clones see the same sessions.
/// Appends and snapshots of one session serialize on that session's mutex, so
/// a snapshot never observes a partially recorded event.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    sessions: Arc<RwLock<HashMap<SessionId, SharedLog>>>,
}

impl EventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user utterance, creating the session log if it is unseen.
    pub fn record_user_utterance(&self, session_id: &SessionId, text: Option<&str>) {
        let log = self.log_or_create(session_id);
        append(&log, session_id, Event::new(Role::User, text));
    }

    /// Record a fragment of assistant speech.
    ///
    /// Speech for a session that has no recorded user utterance is dropped.
    pub fn record_assistant_speech(&self, session_id: &SessionId, text: Option<&str>) {
        let Some(log) = self.log(session_id) else {
            tracing::debug!(session = %session_id, "dropping speech for unknown session");
            return;
        };
        append(&log, session_id, Event::new(Role::Assistant, text));
    }

    /// Take a consistent copy of a session's log.
    pub fn snapshot(&self, session_id: &SessionId) -> Option<EventLog> {
        self.log(session_id).map(|log| lock(&log).clone())
    }

    /// Whether a log exists for the session.
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.read().contains_key(session_id)
    }

    /// Number of sessions with a log.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn log(&self, session_id: &SessionId) -> Option<SharedLog> {
        self.read().get(session_id).cloned()
    }

    fn log_or_create(&self, session_id: &SessionId) -> SharedLog {
        if let Some(log) = self.log(session_id) {
            return log;
        }
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(session_id.clone())
            .or_insert_with(|| {
                tracing::debug!(session = %session_id, "new session log");
                SharedLog::default()
            })
            .clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SessionId, SharedLog>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn append(log: &SharedLog, session_id: &SessionId, event: Event) {
    tracing::debug!(
        session = %session_id,
        event = %event.id,
        at = %event.timestamp,
        role = ?event.role,
        "event recorded"
    );
    lock(log).append(event);
}

// Logs are append-only, so the data behind a poisoned lock is still valid.
fn lock(log: &SharedLog) -> std::sync::MutexGuard<'_, EventLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(log: &EventLog) -> Vec<(Role, Option<&str>)> {
        log.iter().map(|e| (e.role, e.text())).collect()
    }

    #[test]
    fn first_utterance_creates_log() {
        let store = EventStore::new();
        let sid = SessionId::from("kitchen");
        assert!(!store.contains(&sid));

        store.record_user_utterance(&sid, Some("What time is it?"));

        assert!(store.contains(&sid));
        let log = store.snapshot(&sid).unwrap();
        assert_eq!(texts(&log), vec![(Role::User, Some("What time is it?"))]);
    }

    #[test]
    fn empty_utterance_is_recorded() {
        let store = EventStore::new();
        let sid = SessionId::from("s");
        store.record_user_utterance(&sid, Some(""));
        store.record_user_utterance(&sid, None);

        let log = store.snapshot(&sid).unwrap();
        assert_eq!(texts(&log), vec![(Role::User, Some("")), (Role::User, None)]);
    }

    #[test]
    fn orphan_speech_is_dropped() {
        let store = EventStore::new();
        let sid = SessionId::from("s");

        store.record_assistant_speech(&sid, Some("x"));

        assert!(!store.contains(&sid));
        assert!(store.snapshot(&sid).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn speech_after_utterance_is_appended() {
        let store = EventStore::new();
        let sid = SessionId::from("s");
        store.record_user_utterance(&sid, Some("Q1"));
        store.record_assistant_speech(&sid, Some("A1"));

        let log = store.snapshot(&sid).unwrap();
        assert_eq!(
            texts(&log),
            vec![(Role::User, Some("Q1")), (Role::Assistant, Some("A1"))]
        );
    }

    #[test]
    fn log_only_grows_and_keeps_order() {
        let store = EventStore::new();
        let sid = SessionId::from("s");
        let mut previous = EventLog::new();

        for i in 0..10 {
            if i % 3 == 0 {
                store.record_user_utterance(&sid, Some(format!("q{i}").as_str()));
            } else {
                store.record_assistant_speech(&sid, Some(format!("a{i}").as_str()));
            }
            let current = store.snapshot(&sid).unwrap();
            assert!(current.len() >= previous.len());
            assert_eq!(&current.events()[..previous.len()], previous.events());
            previous = current;
        }
        assert_eq!(previous.len(), 10);
    }

    #[test]
    fn recorded_events_are_identified_in_order() {
        let store = EventStore::new();
        let sid = SessionId::from("s");
        store.record_user_utterance(&sid, Some("Q1"));
        store.record_assistant_speech(&sid, Some("A1"));
        store.record_assistant_speech(&sid, Some("A2"));

        let log = store.snapshot(&sid).unwrap();
        let events = log.events();
        assert_ne!(events[0].id, events[1].id);
        assert_ne!(events[1].id, events[2].id);
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn sessions_are_isolated() {
        let store = EventStore::new();
        let a = SessionId::from("a");
        let b = SessionId::from("b");
        store.record_user_utterance(&a, Some("hello"));
        store.record_assistant_speech(&b, Some("stray"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot(&a).unwrap().len(), 1);
        assert!(store.snapshot(&b).is_none());
    }

    #[test]
    fn snapshot_is_detached_from_later_appends() {
        let store = EventStore::new();
        let sid = SessionId::from("s");
        store.record_user_utterance(&sid, Some("Q1"));
        let snapshot = store.snapshot(&sid).unwrap();

        store.record_assistant_speech(&sid, Some("A1"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.snapshot(&sid).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let store = EventStore::new();
        let sid = SessionId::from("shared");
        store.record_user_utterance(&sid, Some("start"));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                let sid = sid.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.record_assistant_speech(&sid, Some(format!("{t}-{i}").as_str()));
                        let _ = store.snapshot(&sid);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.snapshot(&sid).unwrap().len(), 1 + 8 * 50);
    }
}
