//! Classification of a single framed line from the chat stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Prefix that marks a framed event line
pub const DATA_PREFIX: &str = "data: ";
/// Payload that marks normal stream completion
pub const DONE_SENTINEL: &str = "[DONE]";

/// Conversation identifier assigned by the backend.
///
/// The backend sends it either as an integer primary key or as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    /// Numeric identifier
    Number(i64),
    /// Opaque string identifier
    Text(String),
}

impl ChatId {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Number),
            Value::String(s) if !s.is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ChatId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ChatId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Meaning of one line extracted from the stream buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text to append to the response; may be empty
    Delta(String),
    /// Conversation identifier side-channel
    ChatId(ChatId),
    /// Server-side failure; the stream must be aborted
    ServerError(String),
    /// `[DONE]` sentinel
    Done,
    /// Blank line, keep-alive or a JSON frame with nothing we use
    Empty,
}

/// Classify a single line (without its trailing `\n`).
///
/// A trailing `\r` is ignored so CRLF-framed bodies behave the same.
#[must_use]
pub fn parse_line(line: &str) -> StreamEvent {
    let line = line.strip_suffix('\r').unwrap_or(line);

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return if line.trim().is_empty() {
            StreamEvent::Empty
        } else {
            StreamEvent::Delta(line.to_string())
        };
    };

    if payload == DONE_SENTINEL {
        return StreamEvent::Done;
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(frame)) => parse_frame(&frame),
        // Valid JSON that is not an object carries none of the known fields
        Ok(_) => StreamEvent::Empty,
        Err(_) if payload.is_empty() => StreamEvent::Empty,
        Err(_) => StreamEvent::Delta(payload.to_string()),
    }
}

fn parse_frame(frame: &serde_json::Map<String, Value>) -> StreamEvent {
    // Any string `content` claims the frame, even an empty one
    if let Some(Value::String(content)) = frame.get("content") {
        return StreamEvent::Delta(content.clone());
    }

    if let Some(chat_id) = frame.get("chat_id").and_then(ChatId::from_json) {
        return StreamEvent::ChatId(chat_id);
    }

    match frame.get("error") {
        Some(Value::Null) | None => StreamEvent::Empty,
        Some(Value::String(message)) => StreamEvent::ServerError(message.clone()),
        Some(other) => StreamEvent::ServerError(other.to_string()),
    }
}
