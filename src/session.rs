//! Per-user conversation state passed explicitly to the API client.

use crate::api::types::{ChatRequest, Provider, TelegramUser};
use crate::stream::ChatId;
use tracing::debug;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default output token limit
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
/// Highest temperature the providers accept
pub const MAX_TEMPERATURE: f32 = 2.0;

/// Provider choice, sampling parameters, identity and current conversation.
///
/// Owned by the caller; stream decoding never touches it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    /// Backend provider to route messages to
    pub provider: Provider,
    /// Sender identity, if known
    pub user: Option<TelegramUser>,
    /// Conversation being continued
    pub chat_id: Option<ChatId>,
    temperature: f32,
    max_tokens: u32,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            user: None,
            chat_id: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl SessionContext {
    /// Create a session for the given provider with default parameters
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    /// Set the sender identity
    #[must_use]
    pub fn with_user(mut self, user: TelegramUser) -> Self {
        self.user = Some(user);
        self
    }

    /// Set the temperature, clamped to `0.0..=2.0`
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.set_temperature(temperature);
        self
    }

    /// Set the output token limit (at least 1)
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.set_max_tokens(max_tokens);
        self
    }

    /// Update the temperature, clamped to `0.0..=2.0`. NaN resets to the default.
    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = if temperature.is_nan() {
            DEFAULT_TEMPERATURE
        } else {
            temperature.clamp(0.0, MAX_TEMPERATURE)
        };
    }

    /// Update the output token limit (at least 1)
    pub fn set_max_tokens(&mut self, max_tokens: u32) {
        self.max_tokens = max_tokens.max(1);
    }

    /// Current temperature
    #[must_use]
    pub const fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Current output token limit
    #[must_use]
    pub const fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Remember the conversation the backend assigned
    pub fn record_chat_id(&mut self, chat_id: ChatId) {
        if self.chat_id.as_ref() != Some(&chat_id) {
            debug!(%chat_id, previous = ?self.chat_id, "Session switched conversation");
        }
        self.chat_id = Some(chat_id);
    }

    /// Start a new conversation on the next message
    pub fn reset_chat(&mut self) {
        self.chat_id = None;
    }

    /// Build the request body for `message`
    #[must_use]
    pub fn request<'a>(&'a self, message: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            message,
            provider: self.provider,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            user: self.user.as_ref(),
            chat_id: self.chat_id.as_ref(),
        }
    }
}
