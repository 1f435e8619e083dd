//! I/O boundary to the assistant service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use shared::{
    domain::{Session, SessionId},
    error::ApiError,
    protocol::{
        decode_answer, decode_session, decode_session_detail, decode_session_list,
        SendMessageRequest, SessionDetail,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
    config::{ClientSettings, ConfigError},
    error::FailureKind,
};

pub const DEFAULT_SESSIONS_PATH: &str = "chats";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("assistant service returned {status}: {error}")]
    Status { status: u16, error: ApiError },
    #[error("request timed out")]
    Timeout,
    #[error("failed to reach assistant service: {0}")]
    Connect(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Status { status, .. } => match status {
                402 => FailureKind::CreditExhausted,
                404 => FailureKind::NotFound,
                408 => FailureKind::Timeout,
                429 => FailureKind::RateLimited,
                500..=599 => FailureKind::ServerError,
                _ => FailureKind::TransportFailure,
            },
            Self::Timeout => FailureKind::Timeout,
            Self::Malformed(_) => FailureKind::MalformedResponse,
            Self::Connect(_) | Self::Request(_) => FailureKind::TransportFailure,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// The five calls the assistant service exposes.
#[async_trait]
pub trait AssistantTransport: Send + Sync {
    /// Sessions visible to `scope`; malformed bodies decode to an empty list.
    async fn list_sessions(&self, scope: Option<&str>) -> Result<Vec<Session>, TransportError>;
    async fn get_session(&self, id: &SessionId) -> Result<SessionDetail, TransportError>;
    /// Creates a session seeded with the first message; the response carries
    /// the full message sequence including the assistant's reply.
    async fn create_session(&self, request: &SendMessageRequest)
        -> Result<Session, TransportError>;
    async fn send_message(
        &self,
        id: &SessionId,
        request: &SendMessageRequest,
    ) -> Result<String, TransportError>;
    async fn delete_session(&self, id: &SessionId) -> Result<(), TransportError>;
}

/// Supplies the current-user scope for session list fetches.
pub trait IdentityProvider: Send + Sync {
    fn current_scope(&self) -> Option<String>;
}

pub struct AnonymousIdentity;

impl IdentityProvider for AnonymousIdentity {
    fn current_scope(&self) -> Option<String> {
        None
    }
}

pub struct StaticIdentity(pub String);

impl IdentityProvider for StaticIdentity {
    fn current_scope(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

pub struct HttpTransport {
    http: Client,
    base_url: Url,
    sessions_path: String,
    auth_token: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self {
            http,
            base_url,
            sessions_path: DEFAULT_SESSIONS_PATH.to_string(),
            auth_token: None,
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ConfigError> {
        let mut transport = Self::new(settings.base_url()?, settings.request_timeout())?;
        transport.sessions_path = settings.sessions_path.trim_matches('/').to_string();
        transport.auth_token = settings.auth_token.clone();
        Ok(transport)
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn endpoint(&self, trailing: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                TransportError::Request(format!("base url {} cannot hold a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(self.sessions_path.split('/').filter(|segment| !segment.is_empty()))
            .extend(trailing);
        Ok(url)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, TransportError> {
        let request = match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            error: ApiError::from_response(status.as_u16(), &body),
        })
    }

    async fn read_json(response: Response) -> Result<Value, TransportError> {
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|err| TransportError::Malformed(err.to_string()))
    }

    /// Used where an unreadable body degrades to empty data.
    async fn read_json_or_null(response: Response) -> Result<Value, TransportError> {
        match Self::read_json(response).await {
            Err(TransportError::Malformed(reason)) => {
                debug!(%reason, "transport: treating malformed body as empty");
                Ok(Value::Null)
            }
            other => other,
        }
    }
}

#[async_trait]
impl AssistantTransport for HttpTransport {
    async fn list_sessions(&self, scope: Option<&str>) -> Result<Vec<Session>, TransportError> {
        let mut request = self.http.get(self.endpoint(&[])?);
        if let Some(scope) = scope {
            request = request.query(&[("user", scope)]);
        }
        let response = self.execute(request).await?;
        let value = Self::read_json_or_null(response).await?;
        Ok(decode_session_list(&value))
    }

    async fn get_session(&self, id: &SessionId) -> Result<SessionDetail, TransportError> {
        let request = self.http.get(self.endpoint(&[id.as_str()])?);
        let response = self.execute(request).await?;
        let value = Self::read_json_or_null(response).await?;
        Ok(decode_session_detail(&value))
    }

    async fn create_session(
        &self,
        request: &SendMessageRequest,
    ) -> Result<Session, TransportError> {
        let builder = self.http.post(self.endpoint(&[])?).json(request);
        let response = self.execute(builder).await?;
        let value = Self::read_json(response).await?;
        decode_session(&value)
            .ok_or_else(|| TransportError::Malformed("created session has no id".into()))
    }

    async fn send_message(
        &self,
        id: &SessionId,
        request: &SendMessageRequest,
    ) -> Result<String, TransportError> {
        let builder = self
            .http
            .post(self.endpoint(&[id.as_str(), "messages"])?)
            .json(request);
        let response = self.execute(builder).await?;
        let value = Self::read_json(response).await?;
        decode_answer(&value)
            .ok_or_else(|| TransportError::Malformed("reply has no answer".into()))
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), TransportError> {
        let request = self.http.delete(self.endpoint(&[id.as_str()])?);
        self.execute(request).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
