//! Send/receive for the active conversation.
//!
//! A submit appends the user's message before any network call and the
//! message is never rolled back. The assistant side is applied when the
//! call resolves: a reply is appended, a created session replaces the local
//! sequence, and a failure appends a synthesized assistant message so the
//! log stays readable. Responses for a conversation the user has since left
//! are discarded.

use std::sync::Arc;

use shared::{
    domain::{ActiveSession, Message, Mode, Session, SessionId},
    protocol::SendMessageRequest,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    classifier::ModeClassifier,
    error::FailureKind,
    store::{ConversationTag, SessionStore, SharedStore},
    transport::{AssistantTransport, TransportError},
    ClientEvent,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input; nothing changed and nothing was sent.
    Ignored,
    /// A send for the same session is still in flight.
    Busy,
    Created(SessionId),
    Replied,
    Failed(FailureKind),
    /// The response arrived after the user switched conversations.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaLabels {
    pub domain: String,
    pub general: String,
}

impl PersonaLabels {
    pub fn label(&self, mode: Mode) -> &str {
        match mode {
            Mode::Domain => &self.domain,
            Mode::General => &self.general,
        }
    }
}

pub struct ConversationController {
    transport: Arc<dyn AssistantTransport>,
    store: SharedStore,
    classifier: Arc<dyn ModeClassifier>,
    labels: PersonaLabels,
    events: broadcast::Sender<ClientEvent>,
}

impl ConversationController {
    pub fn new(
        transport: Arc<dyn AssistantTransport>,
        store: SharedStore,
        classifier: Arc<dyn ModeClassifier>,
        labels: PersonaLabels,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            transport,
            store,
            classifier,
            labels,
            events,
        }
    }

    /// Persona header for a draft that has not been sent yet.
    pub async fn persona_for_draft(&self, draft: &str) -> &str {
        let mode = {
            let store = self.store.lock().await;
            self.classifier.classify(draft, store.messages())
        };
        self.labels.label(mode)
    }

    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        if text.trim().is_empty() {
            return SubmitOutcome::Ignored;
        }

        let request_id = Uuid::new_v4();
        let (tag, mode) = {
            let mut store = self.store.lock().await;
            let tag = store.tag();
            if !store.begin_send(&tag, request_id) {
                debug!(target_session = %tag.active, "conversation: send already in flight");
                return SubmitOutcome::Busy;
            }
            let mode = self.classifier.classify(text, store.messages());
            store.push_message(Message::user(text));
            (tag, mode)
        };
        self.emit(ClientEvent::MessagesChanged);
        self.emit(ClientEvent::SendStateChanged { is_sending: true });

        let request = SendMessageRequest {
            message: text.to_string(),
            mode,
        };
        debug!(
            %request_id,
            target_session = %tag.active,
            mode = %mode,
            "conversation: dispatching message"
        );

        let outcome = match &tag.active {
            ActiveSession::New => {
                let result = self.transport.create_session(&request).await;
                self.apply_created(&tag, request_id, result).await
            }
            ActiveSession::Existing(id) => {
                let result = self.transport.send_message(id, &request).await;
                self.apply_reply(&tag, request_id, result).await
            }
        };

        let is_sending = self.store.lock().await.ui().is_sending;
        self.emit(ClientEvent::SendStateChanged { is_sending });
        outcome
    }

    async fn apply_created(
        &self,
        tag: &ConversationTag,
        request_id: Uuid,
        result: Result<Session, TransportError>,
    ) -> SubmitOutcome {
        let mut store = self.store.lock().await;
        store.finish_send(tag, request_id);

        let session = match result {
            Ok(session) => session,
            Err(err) => {
                let outcome = self.record_failure(&mut store, tag, &err);
                drop(store);
                self.emit_failure(&outcome);
                return outcome;
            }
        };

        let id = session.id.clone();
        let current = store.is_current(tag);
        // The session exists server-side either way, so it always joins the list.
        store.prepend_session(session.clone());
        if !current {
            drop(store);
            warn!(session_id = %id, "conversation: created session arrived after navigation");
            self.emit(ClientEvent::SessionsChanged);
            return SubmitOutcome::Discarded;
        }

        // Server copy is authoritative for a new session, unless it came back
        // without messages, in which case the optimistic user message stays.
        if !session.messages.is_empty() {
            store.set_messages(session.messages);
        }
        store.set_active(ActiveSession::Existing(id.clone()));
        store.clear_error();
        let active = store.active().clone();
        drop(store);

        info!(session_id = %id, "conversation: session created");
        self.emit(ClientEvent::SessionsChanged);
        self.emit(ClientEvent::ActiveSessionChanged(active));
        self.emit(ClientEvent::MessagesChanged);
        SubmitOutcome::Created(id)
    }

    async fn apply_reply(
        &self,
        tag: &ConversationTag,
        request_id: Uuid,
        result: Result<String, TransportError>,
    ) -> SubmitOutcome {
        let mut store = self.store.lock().await;
        store.finish_send(tag, request_id);

        let answer = match result {
            Ok(answer) => answer,
            Err(err) => {
                let outcome = self.record_failure(&mut store, tag, &err);
                drop(store);
                self.emit_failure(&outcome);
                return outcome;
            }
        };

        if !store.is_current(tag) {
            drop(store);
            warn!(target_session = %tag.active, "conversation: discarding stale reply");
            return SubmitOutcome::Discarded;
        }

        store.push_message(Message::assistant(answer));
        store.clear_error();
        drop(store);

        debug!(target_session = %tag.active, "conversation: reply appended");
        self.emit(ClientEvent::MessagesChanged);
        SubmitOutcome::Replied
    }

    fn record_failure(
        &self,
        store: &mut SessionStore,
        tag: &ConversationTag,
        err: &TransportError,
    ) -> SubmitOutcome {
        let kind = err.kind();
        warn!(
            target_session = %tag.active,
            kind = %kind,
            error = %err,
            "conversation: send failed"
        );
        if !store.is_current(tag) {
            return SubmitOutcome::Discarded;
        }
        store.push_message(Message::assistant(kind.user_message()));
        if kind.is_surfaced() {
            store.set_error(kind);
        }
        SubmitOutcome::Failed(kind)
    }

    fn emit_failure(&self, outcome: &SubmitOutcome) {
        if let SubmitOutcome::Failed(kind) = outcome {
            self.emit(ClientEvent::MessagesChanged);
            if kind.is_surfaced() {
                self.emit(ClientEvent::Failure(*kind));
            }
        }
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/conversation_tests.rs"]
mod tests;
