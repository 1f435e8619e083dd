use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use shared::{
    domain::{Message, Mode, Sender, Session, SessionId},
    error::ApiError,
    protocol::{SendMessageRequest, SessionDetail},
};
use tokio::sync::Notify;

use crate::{
    transport::{AnonymousIdentity, AssistantTransport, IdentityProvider, TransportError},
    AllowListSanitizer, AssistantClient, KeywordClassifier, PersonaLabels,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(Option<String>),
    Get(SessionId),
    Create(SendMessageRequest),
    Send(SessionId, SendMessageRequest),
    Delete(SessionId),
}

/// Holds the next transport call in flight until released.
#[derive(Clone, Default)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// In-memory transport answering from per-call queues.
#[derive(Default)]
pub struct ScriptedTransport {
    lists: Mutex<VecDeque<Result<Vec<Session>, TransportError>>>,
    details: Mutex<VecDeque<Result<SessionDetail, TransportError>>>,
    creates: Mutex<VecDeque<Result<Session, TransportError>>>,
    replies: Mutex<VecDeque<Result<String, TransportError>>>,
    deletes: Mutex<VecDeque<Result<(), TransportError>>>,
    calls: Mutex<Vec<Call>>,
    gate: Mutex<Option<Gate>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_list(&self, result: Result<Vec<Session>, TransportError>) {
        self.lists.lock().expect("lists").push_back(result);
    }

    pub fn push_detail(&self, result: Result<SessionDetail, TransportError>) {
        self.details.lock().expect("details").push_back(result);
    }

    pub fn push_create(&self, result: Result<Session, TransportError>) {
        self.creates.lock().expect("creates").push_back(result);
    }

    pub fn push_reply(&self, result: Result<String, TransportError>) {
        self.replies.lock().expect("replies").push_back(result);
    }

    pub fn push_delete(&self, result: Result<(), TransportError>) {
        self.deletes.lock().expect("deletes").push_back(result);
    }

    pub fn hold_next(&self) -> Gate {
        let gate = Gate::default();
        *self.gate.lock().expect("gate") = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls").clone()
    }

    async fn record(&self, call: Call) {
        self.calls.lock().expect("calls").push(call);
        let gate = self.gate.lock().expect("gate").take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }
}

fn pop<T>(queue: &Mutex<VecDeque<Result<T, TransportError>>>) -> Result<T, TransportError> {
    queue
        .lock()
        .expect("queue")
        .pop_front()
        .unwrap_or_else(|| Err(TransportError::Request("no scripted response".into())))
}

#[async_trait]
impl AssistantTransport for ScriptedTransport {
    async fn list_sessions(&self, scope: Option<&str>) -> Result<Vec<Session>, TransportError> {
        self.record(Call::List(scope.map(str::to_string))).await;
        pop(&self.lists)
    }

    async fn get_session(&self, id: &SessionId) -> Result<SessionDetail, TransportError> {
        self.record(Call::Get(id.clone())).await;
        pop(&self.details)
    }

    async fn create_session(
        &self,
        request: &SendMessageRequest,
    ) -> Result<Session, TransportError> {
        self.record(Call::Create(request.clone())).await;
        pop(&self.creates)
    }

    async fn send_message(
        &self,
        id: &SessionId,
        request: &SendMessageRequest,
    ) -> Result<String, TransportError> {
        self.record(Call::Send(id.clone(), request.clone())).await;
        pop(&self.replies)
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), TransportError> {
        self.record(Call::Delete(id.clone())).await;
        pop(&self.deletes)
    }
}

pub fn client_with(transport: Arc<ScriptedTransport>) -> AssistantClient {
    client_with_identity(transport, Arc::new(AnonymousIdentity))
}

pub fn client_with_identity(
    transport: Arc<ScriptedTransport>,
    identity: Arc<dyn IdentityProvider>,
) -> AssistantClient {
    AssistantClient::new_with_dependencies(
        transport,
        Arc::new(KeywordClassifier::default()),
        identity,
        Arc::new(AllowListSanitizer),
        PersonaLabels {
            domain: "Portfolio AI".into(),
            general: "General Assistant".into(),
        },
    )
}

pub fn session(id: &str, title: &str) -> Session {
    Session {
        id: SessionId::new(id),
        title: title.to_string(),
        mode: Mode::General,
        created_at: None,
        messages: Vec::new(),
    }
}

pub fn message(from: Sender, text: &str) -> Message {
    Message {
        from,
        text: text.to_string(),
        timestamp: None,
    }
}

pub fn status_error(status: u16) -> TransportError {
    TransportError::Status {
        status,
        error: ApiError::from_response(status, ""),
    }
}

/// Puts `client` into an existing session `id` holding `history`.
pub async fn enter_session(client: &AssistantClient, id: &str, history: Vec<Message>) {
    let store = client.store();
    let mut store = store.lock().await;
    store.prepend_session(session(id, id));
    store.set_active(SessionId::new(id).into());
    store.set_messages(history);
}
