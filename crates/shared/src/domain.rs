use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder active-session value for a conversation not yet created server-side.
pub const NEW_SESSION_SENTINEL: &str = "new";

pub const UNTITLED_SESSION: &str = "Untitled Chat";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The conversation currently shown. Exactly one is active at any time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ActiveSession {
    #[default]
    New,
    Existing(SessionId),
}

impl ActiveSession {
    pub fn from_raw(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw == NEW_SESSION_SENTINEL {
            Self::New
        } else {
            Self::Existing(SessionId::new(raw))
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::New)
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::New => None,
            Self::Existing(id) => Some(id),
        }
    }

    pub fn is(&self, id: &SessionId) -> bool {
        self.session_id() == Some(id)
    }
}

impl From<SessionId> for ActiveSession {
    fn from(value: SessionId) -> Self {
        Self::Existing(value)
    }
}

impl fmt::Display for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str(NEW_SESSION_SENTINEL),
            Self::Existing(id) => id.fmt(f),
        }
    }
}

/// Assistant persona selected for answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Domain,
    #[default]
    General,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::General => "general",
        }
    }

    /// Older backends report the domain mode under the persona's own name,
    /// so anything that is not `general` counts as domain.
    pub fn from_wire(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("general") {
            Self::General
        } else {
            Self::Domain
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    #[serde(alias = "bot")]
    Assistant,
}

impl Sender {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "assistant" | "bot" => Some(Self::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub from: Sender,
    /// Assistant text may carry a constrained markup subset and must be
    /// sanitized before display.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            from: Sender::User,
            text: text.into(),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            from: Sender::Assistant,
            text: text.into(),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn is_from_assistant(&self) -> bool {
        self.from == Sender::Assistant
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Session {
    pub fn display_title(&self) -> &str {
        let title = self.title.trim();
        if title.is_empty() {
            UNTITLED_SESSION
        } else {
            title
        }
    }
}
