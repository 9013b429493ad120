//! Wire types of the chat backend HTTP API.

use crate::stream::ChatId;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// LLM backends the chat server can route a message to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// `OpenAI` chat completions
    #[default]
    OpenAi,
    /// Google Gemini
    Gemini,
    /// Anthropic Claude
    Claude,
    /// Groq
    Groq,
    /// Mistral
    Mistral,
    /// `DeepSeek`
    DeepSeek,
    /// `OpenRouter`
    OpenRouter,
}

impl Provider {
    /// Every provider, in menu order
    pub const ALL: [Self; 7] = [
        Self::OpenAi,
        Self::Gemini,
        Self::Claude,
        Self::Groq,
        Self::Mistral,
        Self::DeepSeek,
        Self::OpenRouter,
    ];

    /// Name used on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Claude => "claude",
            Self::Groq => "groq",
            Self::Mistral => "mistral",
            Self::DeepSeek => "deepseek",
            Self::OpenRouter => "openrouter",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a provider name is not recognized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == name)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// Telegram identity forwarded to the backend so it can attach history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramUser {
    /// Telegram user id
    pub id: i64,
    /// First name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// `@username` without the at sign
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Body of `POST /chat` and `POST /chat/stream`
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    /// User message
    pub message: &'a str,
    /// Target provider
    pub provider: Provider,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token limit
    #[serde(rename = "maxTokens")]
    pub max_tokens: u32,
    /// Sender identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<&'a TelegramUser>,
    /// Conversation to continue
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<&'a ChatId>,
}

/// `{success, data, error}` wrapper used by every JSON endpoint except health
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// Whether the backend handled the request
    #[serde(default)]
    pub success: bool,
    /// Payload on success
    pub data: Option<T>,
    /// Message on failure
    pub error: Option<String>,
}

/// `GET /health`
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    /// `ok` when the server is up
    pub status: String,
    /// Server time, seconds since the epoch
    #[serde(default)]
    pub timestamp: f64,
    /// Server version
    #[serde(default)]
    pub version: String,
}

/// `GET /providers`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersInfo {
    /// Providers with a configured key
    #[serde(default)]
    pub providers: Vec<String>,
    /// Every provider the server knows about
    #[serde(default)]
    pub all: Vec<String>,
}

impl ProvidersInfo {
    /// Available providers this client knows how to address
    #[must_use]
    pub fn available(&self) -> Vec<Provider> {
        self.providers
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect()
    }
}

/// `POST /chat` payload
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    /// Full assistant response
    pub response: String,
    /// Provider that answered
    pub provider: String,
    /// Conversation the exchange was stored in
    pub chat_id: Option<ChatId>,
}

/// One chat session as listed by `GET /chat/history?user_id=`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSummary {
    /// Chat id
    pub id: i64,
    /// Title derived from the first message
    pub title: Option<String>,
    /// Provider the chat was created with
    pub provider: Option<String>,
    /// Group the chat belongs to
    pub group_id: Option<i64>,
    /// Number of stored messages
    #[serde(default)]
    pub message_count: u32,
    /// Creation time
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last activity
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// `GET /chat/history?chat_id=`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatDetails {
    /// Chat metadata
    #[serde(flatten)]
    pub summary: ChatSummary,
    /// Messages, oldest first
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatList {
    #[serde(default)]
    pub(crate) chats: Vec<ChatSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageList {
    #[serde(default)]
    pub(crate) messages: Vec<StoredMessage>,
}

/// A persisted chat message
#[derive(Debug, Clone, Deserialize)]
pub struct StoredMessage {
    /// Message id
    pub id: i64,
    /// Owning chat
    pub chat_id: i64,
    /// `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
    /// Provider used for this message
    pub provider: Option<String>,
    /// Creation time
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Accepts RFC 3339 timestamps and naive ISO-8601 ones (assumed UTC).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}
