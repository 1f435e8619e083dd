use std::sync::Arc;

use shared::domain::{ActiveSession, Message};
use tokio::sync::broadcast;

pub mod classifier;
pub mod config;
pub mod conversation;
pub mod error;
pub mod recency;
pub mod sanitize;
pub mod session_list;
pub mod store;
pub mod transport;

pub use classifier::{KeywordClassifier, ModeClassifier};
pub use config::{load_settings, ClientSettings, ConfigError};
pub use conversation::{ConversationController, PersonaLabels, SubmitOutcome};
pub use error::FailureKind;
pub use recency::RecencyGroups;
pub use sanitize::{AllowListSanitizer, MarkupSanitizer};
pub use session_list::{SelectOutcome, SessionListController};
pub use store::{SessionStore, SharedStore, StoreSnapshot, UiState};
pub use transport::{
    AnonymousIdentity, AssistantTransport, HttpTransport, IdentityProvider, StaticIdentity,
    TransportError,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Notifications for the presentation layer, sent after each store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    SessionsChanged,
    MessagesChanged,
    ActiveSessionChanged(ActiveSession),
    SendStateChanged { is_sending: bool },
    Failure(FailureKind),
}

/// Both controllers over one store, with the sanitizer used for rendering.
pub struct AssistantClient {
    store: SharedStore,
    conversation: ConversationController,
    sessions: SessionListController,
    sanitizer: Arc<dyn MarkupSanitizer>,
    events: broadcast::Sender<ClientEvent>,
}

impl AssistantClient {
    pub fn new(transport: Arc<dyn AssistantTransport>, settings: &ClientSettings) -> Self {
        Self::new_with_dependencies(
            transport,
            Arc::new(KeywordClassifier::from_settings(settings)),
            Arc::new(AnonymousIdentity),
            Arc::new(AllowListSanitizer),
            PersonaLabels {
                domain: settings.domain_persona_label.clone(),
                general: settings.general_persona_label.clone(),
            },
        )
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ConfigError> {
        let transport = HttpTransport::from_settings(settings)?;
        Ok(Self::new(Arc::new(transport), settings))
    }

    pub fn new_with_dependencies(
        transport: Arc<dyn AssistantTransport>,
        classifier: Arc<dyn ModeClassifier>,
        identity: Arc<dyn IdentityProvider>,
        sanitizer: Arc<dyn MarkupSanitizer>,
        labels: PersonaLabels,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = SessionStore::shared();
        Self {
            conversation: ConversationController::new(
                Arc::clone(&transport),
                Arc::clone(&store),
                classifier,
                labels,
                events.clone(),
            ),
            sessions: SessionListController::new(
                transport,
                Arc::clone(&store),
                identity,
                events.clone(),
            ),
            store,
            sanitizer,
            events,
        }
    }

    pub fn conversation(&self) -> &ConversationController {
        &self.conversation
    }

    pub fn sessions(&self) -> &SessionListController {
        &self.sessions
    }

    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    /// Called when the widget opens: loads the session list. The sentinel is
    /// active until the user picks a session.
    pub async fn open(&self) -> Result<usize, FailureKind> {
        self.sessions.fetch().await
    }

    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        self.conversation.submit(text).await
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.store.lock().await.snapshot()
    }

    pub async fn dismiss_error(&self) {
        self.store.lock().await.clear_error();
    }

    /// Display-safe markup for `message`.
    pub fn render(&self, message: &Message) -> String {
        self.sanitizer.sanitize(&message.text)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
