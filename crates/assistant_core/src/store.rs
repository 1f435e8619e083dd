//! Canonical in-memory state of the assistant widget.
//!
//! Controllers share one [`SessionStore`] behind a [`SharedStore`] and only
//! mutate it through the setters here, which keep every sequence valid.

use std::{collections::HashMap, sync::Arc};

use shared::domain::{ActiveSession, Message, Session, SessionId};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::FailureKind;

pub type SharedStore = Arc<Mutex<SessionStore>>;

/// Either a literal next value or a function of the previous one.
///
/// `Replace(None)` stands for "the source produced no sequence" and is
/// stored as empty.
pub enum Update<T> {
    Replace(Option<Vec<T>>),
    Apply(Box<dyn FnOnce(Vec<T>) -> Vec<T> + Send>),
}

impl<T> Update<T> {
    pub fn apply(f: impl FnOnce(Vec<T>) -> Vec<T> + Send + 'static) -> Self {
        Self::Apply(Box::new(f))
    }

    fn resolve(self, previous: Vec<T>) -> Vec<T> {
        match self {
            Self::Replace(next) => next.unwrap_or_default(),
            Self::Apply(f) => f(previous),
        }
    }
}

impl<T> From<Vec<T>> for Update<T> {
    fn from(value: Vec<T>) -> Self {
        Self::Replace(Some(value))
    }
}

impl<T> From<Option<Vec<T>>> for Update<T> {
    fn from(value: Option<Vec<T>>) -> Self {
        Self::Replace(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    pub active: ActiveSession,
    pub is_sending: bool,
    pub last_error: Option<FailureKind>,
    pub search_term: String,
}

/// Identifies the conversation a request was issued against.
///
/// The epoch advances whenever the active conversation changes, so a
/// response tagged with an older epoch belongs to a conversation the user
/// has left even if the session id is the same.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationTag {
    pub active: ActiveSession,
    pub epoch: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub sessions: Vec<Session>,
    pub messages: Vec<Message>,
    pub ui: UiState,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Vec<Session>,
    messages: Vec<Message>,
    ui: UiState,
    epoch: u64,
    in_flight: HashMap<ConversationTag, Uuid>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn active(&self) -> &ActiveSession {
        &self.ui.active
    }

    pub fn set_sessions(&mut self, next: impl Into<Update<Session>>) {
        let previous = std::mem::take(&mut self.sessions);
        self.sessions = next.into().resolve(previous);
    }

    /// Full replacement of the active conversation's messages.
    pub fn set_messages(&mut self, next: impl Into<Update<Message>>) {
        let previous = std::mem::take(&mut self.messages);
        self.messages = next.into().resolve(previous);
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Puts `session` at the head of the list, replacing any entry with the same id.
    pub fn prepend_session(&mut self, session: Session) {
        self.sessions.retain(|existing| existing.id != session.id);
        self.sessions.insert(0, session);
    }

    pub fn remove_session(&mut self, id: &SessionId) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|session| &session.id != id);
        self.sessions.len() != before
    }

    pub fn find_session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|session| &session.id == id)
    }

    pub fn set_active(&mut self, active: ActiveSession) {
        self.ui.active = active;
        self.epoch += 1;
        self.refresh_sending();
    }

    /// Switches to the sentinel with an empty conversation.
    pub fn reset_to_new(&mut self) {
        self.set_active(ActiveSession::New);
        self.messages.clear();
    }

    pub fn tag(&self) -> ConversationTag {
        ConversationTag {
            active: self.ui.active.clone(),
            epoch: self.epoch,
        }
    }

    pub fn is_current(&self, tag: &ConversationTag) -> bool {
        self.epoch == tag.epoch && self.ui.active == tag.active
    }

    pub fn set_error(&mut self, kind: FailureKind) {
        self.ui.last_error = Some(kind);
    }

    pub fn clear_error(&mut self) {
        self.ui.last_error = None;
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.ui.search_term = term.into();
    }

    /// Registers an in-flight send for the conversation `target` was taken
    /// from; `false` when one is already pending there.
    pub fn begin_send(&mut self, target: &ConversationTag, request_id: Uuid) -> bool {
        if self.in_flight.contains_key(target) {
            return false;
        }
        self.in_flight.insert(target.clone(), request_id);
        self.refresh_sending();
        true
    }

    pub fn finish_send(&mut self, target: &ConversationTag, request_id: Uuid) {
        if self.in_flight.get(target) == Some(&request_id) {
            self.in_flight.remove(target);
        }
        self.refresh_sending();
    }

    pub fn is_sending_to(&self, target: &ConversationTag) -> bool {
        self.in_flight.contains_key(target)
    }

    /// `is_sending` only reflects the conversation on screen.
    fn refresh_sending(&mut self) {
        let current = self.tag();
        self.ui.is_sending = self.in_flight.contains_key(&current);
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            sessions: self.sessions.clone(),
            messages: self.messages.clone(),
            ui: self.ui.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::Mode;

    use super::*;

    fn session(id: &str) -> Session {
        Session {
            id: SessionId::new(id),
            title: id.to_string(),
            mode: Mode::General,
            created_at: None,
            messages: Vec::new(),
        }
    }

    #[test]
    fn missing_sequences_are_stored_as_empty() {
        let mut store = SessionStore::new();
        store.set_sessions(vec![session("a")]);
        store.set_sessions(None::<Vec<Session>>);
        assert!(store.sessions().is_empty());

        store.push_message(Message::user("hi"));
        store.set_messages(None::<Vec<Message>>);
        assert!(store.messages().is_empty());
    }

    #[test]
    fn updater_receives_previous_sequence() {
        let mut store = SessionStore::new();
        store.set_sessions(vec![session("a")]);
        store.set_sessions(Update::apply(|mut previous| {
            previous.push(session("b"));
            previous
        }));
        let ids: Vec<&str> = store.sessions().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn prepend_replaces_duplicate_ids() {
        let mut store = SessionStore::new();
        store.set_sessions(vec![session("a"), session("b")]);
        let mut renamed = session("b");
        renamed.title = "renamed".into();
        store.prepend_session(renamed);

        assert_eq!(store.sessions().len(), 2);
        assert_eq!(store.sessions()[0].title, "renamed");
    }

    #[test]
    fn tag_goes_stale_when_conversation_changes() {
        let mut store = SessionStore::new();
        let tag = store.tag();
        assert!(store.is_current(&tag));

        store.reset_to_new();
        assert!(!store.is_current(&tag), "same sentinel, new conversation");
    }

    #[test]
    fn in_flight_guard_is_per_conversation() {
        let mut store = SessionStore::new();
        store.set_active(ActiveSession::Existing(SessionId::new("a")));
        let first = Uuid::new_v4();
        let target = store.tag();

        assert!(store.begin_send(&target, first));
        assert!(!store.begin_send(&target, Uuid::new_v4()));
        assert!(store.ui().is_sending);

        store.reset_to_new();
        let fresh = store.tag();
        assert!(!store.ui().is_sending, "left conversation's send is not shown");
        assert!(store.begin_send(&fresh, Uuid::new_v4()));
        assert!(store.ui().is_sending);

        store.finish_send(&target, first);
        assert!(!store.is_sending_to(&target));
        assert!(store.ui().is_sending, "current conversation still pending");
    }

    #[test]
    fn each_new_conversation_has_its_own_guard() {
        let mut store = SessionStore::new();
        let abandoned = store.tag();
        assert!(store.begin_send(&abandoned, Uuid::new_v4()));

        store.reset_to_new();
        assert_eq!(store.active(), &ActiveSession::New);
        let fresh = store.tag();
        assert!(store.begin_send(&fresh, Uuid::new_v4()));
    }
}
