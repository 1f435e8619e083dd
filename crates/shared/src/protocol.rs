//! Request bodies and lenient response decoding for the assistant service.
//!
//! Responses are decoded from `serde_json::Value` rather than typed structs:
//! the service wraps lists inconsistently and older deployments use other
//! field names, and a malformed payload must degrade to empty data instead
//! of failing the whole call.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Message, Mode, Sender, Session, SessionId};

/// Keys a session list may be wrapped under.
pub const LIST_WRAPPER_KEYS: &[&str] = &["sessions", "chats", "data", "items"];
const OBJECT_WRAPPER_KEYS: &[&str] = &["session", "chat", "data"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
}

/// Body of `GET session/{id}`. `messages` is always a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionDetail {
    pub id: Option<SessionId>,
    pub title: Option<String>,
    pub messages: Vec<Message>,
}

pub fn decode_session_list(value: &Value) -> Vec<Session> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match LIST_WRAPPER_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
        {
            Some(items) => items,
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    items.iter().filter_map(decode_session).collect()
}

/// Decodes one session object; `None` when no usable id is present.
pub fn decode_session(value: &Value) -> Option<Session> {
    let object = unwrap_object(value)?;
    let id = object
        .get("id")
        .or_else(|| object.get("_id"))
        .and_then(decode_id)?;
    Some(Session {
        id,
        title: object
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        mode: object
            .get("mode")
            .and_then(Value::as_str)
            .map(Mode::from_wire)
            .unwrap_or_default(),
        created_at: object
            .get("createdAt")
            .or_else(|| object.get("created_at"))
            .and_then(parse_timestamp),
        messages: decode_messages(object.get("messages")),
    })
}

pub fn decode_session_detail(value: &Value) -> SessionDetail {
    let Some(object) = unwrap_object(value) else {
        return SessionDetail::default();
    };
    SessionDetail {
        id: object
            .get("id")
            .or_else(|| object.get("_id"))
            .and_then(decode_id),
        title: object
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string),
        messages: decode_messages(object.get("messages")),
    }
}

/// Anything that is not an array decodes to an empty sequence; entries
/// without a recognizable sender or string text are skipped.
pub fn decode_messages(value: Option<&Value>) -> Vec<Message> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items.iter().filter_map(decode_message).collect()
}

fn decode_message(value: &Value) -> Option<Message> {
    let object = value.as_object()?;
    let from = object
        .get("from")
        .or_else(|| object.get("role"))
        .and_then(Value::as_str)
        .and_then(Sender::from_wire)?;
    let text = object.get("text").and_then(Value::as_str)?.to_string();
    Some(Message {
        from,
        text,
        timestamp: object.get("timestamp").and_then(parse_timestamp),
    })
}

/// Accepts `{"answer": "..."}`, the same wrapped under `data`, or a bare string.
pub fn decode_answer(value: &Value) -> Option<String> {
    match value {
        Value::String(answer) => Some(answer.clone()),
        Value::Object(map) => map
            .get("answer")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| map.get("data").and_then(decode_answer)),
        _ => None,
    }
}

/// RFC 3339 strings or integer epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

fn decode_id(value: &Value) -> Option<SessionId> {
    let raw = match value {
        Value::String(raw) => raw.trim().to_string(),
        Value::Number(number) => number.to_string(),
        // Mongo extended JSON: {"$oid": "..."}
        Value::Object(map) => map.get("$oid")?.as_str()?.trim().to_string(),
        _ => return None,
    };
    if raw.is_empty() {
        None
    } else {
        Some(SessionId(raw))
    }
}

fn unwrap_object(value: &Value) -> Option<&serde_json::Map<String, Value>> {
    let object = value.as_object()?;
    if object.contains_key("id") || object.contains_key("_id") || object.contains_key("messages")
    {
        return Some(object);
    }
    OBJECT_WRAPPER_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_object))
        .or(Some(object))
}
