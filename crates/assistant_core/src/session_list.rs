//! Fetch/create/select/delete over the session list, plus client-side
//! search and recency grouping.

use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use shared::domain::{ActiveSession, Session, SessionId};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    error::FailureKind,
    recency::{filter_by_title, group_by_recency, RecencyGroups},
    store::SharedStore,
    transport::{AssistantTransport, IdentityProvider},
    ClientEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    AlreadyActive,
    Loaded { messages: usize },
    /// The session no longer exists; the sentinel is active instead.
    FellBack,
    /// The user moved on before the messages arrived.
    Discarded,
}

pub struct SessionListController {
    transport: Arc<dyn AssistantTransport>,
    store: SharedStore,
    identity: Arc<dyn IdentityProvider>,
    events: broadcast::Sender<ClientEvent>,
}

impl SessionListController {
    pub fn new(
        transport: Arc<dyn AssistantTransport>,
        store: SharedStore,
        identity: Arc<dyn IdentityProvider>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            transport,
            store,
            identity,
            events,
        }
    }

    /// Replaces the session list. On failure the list is emptied rather than
    /// left stale.
    pub async fn fetch(&self) -> Result<usize, FailureKind> {
        let scope = self.identity.current_scope();
        let result = self.transport.list_sessions(scope.as_deref()).await;

        let mut store = self.store.lock().await;
        match result {
            Ok(sessions) => {
                let count = sessions.len();
                store.set_sessions(sessions);
                let orphaned = match store.active() {
                    ActiveSession::Existing(id) => store.find_session(id).is_none(),
                    ActiveSession::New => false,
                };
                if orphaned {
                    warn!(active = %store.active(), "sessions: active session missing from list");
                    store.reset_to_new();
                }
                let active = store.active().clone();
                drop(store);

                info!(count, "sessions: list refreshed");
                self.emit(ClientEvent::SessionsChanged);
                if orphaned {
                    self.emit(ClientEvent::ActiveSessionChanged(active));
                    self.emit(ClientEvent::MessagesChanged);
                }
                Ok(count)
            }
            Err(err) => {
                let kind = err.kind();
                store.set_sessions(None::<Vec<Session>>);
                if kind.is_surfaced() {
                    store.set_error(kind);
                }
                drop(store);

                warn!(kind = %kind, error = %err, "sessions: list fetch failed");
                self.emit(ClientEvent::SessionsChanged);
                if kind.is_surfaced() {
                    self.emit(ClientEvent::Failure(kind));
                }
                Err(kind)
            }
        }
    }

    pub async fn select(&self, id: &SessionId) -> Result<SelectOutcome, FailureKind> {
        let tag = {
            let mut store = self.store.lock().await;
            if store.active().is(id) {
                return Ok(SelectOutcome::AlreadyActive);
            }
            store.set_active(ActiveSession::Existing(id.clone()));
            store.clear_error();
            store.set_messages(Vec::new());
            store.tag()
        };
        self.emit(ClientEvent::ActiveSessionChanged(tag.active.clone()));
        self.emit(ClientEvent::MessagesChanged);

        let result = self.transport.get_session(id).await;

        let mut store = self.store.lock().await;
        if !store.is_current(&tag) {
            warn!(session_id = %id, "sessions: discarding stale session load");
            return Ok(SelectOutcome::Discarded);
        }
        match result {
            Ok(detail) => {
                let count = detail.messages.len();
                store.set_messages(detail.messages);
                drop(store);

                info!(session_id = %id, messages = count, "sessions: session loaded");
                self.emit(ClientEvent::MessagesChanged);
                Ok(SelectOutcome::Loaded { messages: count })
            }
            Err(err) if err.kind() == FailureKind::NotFound => {
                store.remove_session(id);
                store.reset_to_new();
                drop(store);

                warn!(session_id = %id, "sessions: selected session is gone, starting new");
                self.emit(ClientEvent::SessionsChanged);
                self.emit(ClientEvent::ActiveSessionChanged(ActiveSession::New));
                Ok(SelectOutcome::FellBack)
            }
            Err(err) => {
                let kind = err.kind();
                if kind.is_surfaced() {
                    store.set_error(kind);
                }
                drop(store);

                warn!(session_id = %id, kind = %kind, error = %err, "sessions: session load failed");
                if kind.is_surfaced() {
                    self.emit(ClientEvent::Failure(kind));
                }
                Err(kind)
            }
        }
    }

    /// Starts a fresh conversation locally; the server learns of it on the first send.
    pub async fn create(&self) {
        self.store.lock().await.reset_to_new();
        self.emit(ClientEvent::ActiveSessionChanged(ActiveSession::New));
        self.emit(ClientEvent::MessagesChanged);
    }

    pub async fn delete(&self, id: &SessionId) -> Result<(), FailureKind> {
        let result = self.transport.delete_session(id).await;

        let mut store = self.store.lock().await;
        match result {
            Ok(()) => {}
            Err(err) if err.kind() == FailureKind::NotFound => {
                warn!(session_id = %id, "sessions: delete of absent session, removing locally");
            }
            Err(err) => {
                let kind = err.kind();
                if kind.is_surfaced() {
                    store.set_error(kind);
                }
                drop(store);

                warn!(session_id = %id, kind = %kind, error = %err, "sessions: delete failed");
                if kind.is_surfaced() {
                    self.emit(ClientEvent::Failure(kind));
                }
                return Err(kind);
            }
        }

        store.remove_session(id);
        let was_active = store.active().is(id);
        if was_active {
            store.reset_to_new();
        }
        drop(store);

        info!(session_id = %id, was_active, "sessions: session deleted");
        self.emit(ClientEvent::SessionsChanged);
        if was_active {
            self.emit(ClientEvent::ActiveSessionChanged(ActiveSession::New));
            self.emit(ClientEvent::MessagesChanged);
        }
        Ok(())
    }

    /// Filters titles client-side and remembers the term.
    pub async fn search(&self, term: &str) -> Vec<Session> {
        let mut store = self.store.lock().await;
        store.set_search_term(term);
        filter_by_title(store.sessions(), term)
    }

    /// Sessions matching the remembered search term.
    pub async fn visible(&self) -> Vec<Session> {
        let store = self.store.lock().await;
        filter_by_title(store.sessions(), &store.ui().search_term)
    }

    pub async fn grouped<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> RecencyGroups {
        group_by_recency(&self.visible().await, now)
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/session_list_tests.rs"]
mod tests;
