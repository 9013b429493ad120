//! Client for the chat backend HTTP API
//!
//! Covers health and provider discovery, one-shot and streamed chat, and
//! history lookups. Streamed replies go through [`crate::stream::consume`].

pub mod http_utils;
pub mod types;

use crate::config::Settings;
use crate::session::SessionContext;
use crate::stream::{self, ChatId, StreamError, StreamOutcome};
use bytes::Bytes;
use futures_util::Stream;
use reqwest::Client as HttpClient;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use types::{
    ChatDetails, ChatList, ChatReply, ChatSummary, HealthStatus, MessageList, ProvidersInfo,
    StoredMessage,
};

/// Default number of messages requested from history endpoints
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// Errors that can occur while talking to the chat backend
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was rejected locally before being sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    Network(String),
    /// Non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code
        status: u16,
        /// Cleaned-up response body
        message: String,
    },
    /// The backend answered `success: false`
    #[error("Backend error: {0}")]
    Backend(String),
    /// Error during JSON deserialization
    #[error("JSON error: {0}")]
    Json(String),
    /// A streamed reply failed
    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// HTTP client for one chat backend
#[derive(Debug, Clone)]
pub struct ChatApiClient {
    http_client: HttpClient,
    api_root: String,
}

impl ChatApiClient {
    /// Create a client for the API rooted at `api_root` (e.g. `http://host/api`)
    #[must_use]
    pub fn new(api_root: impl Into<String>, timeout: Duration) -> Self {
        let api_root = api_root.into().trim_end_matches('/').to_string();
        Self {
            http_client: http_utils::create_http_client(timeout),
            api_root,
        }
    }

    /// Create a client from loaded settings
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.api_root(), settings.http_timeout())
    }

    /// Root URL all endpoints are resolved against
    #[must_use]
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_root, endpoint.trim_start_matches('/'))
    }

    /// `GET /health`
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network`, `ApiError::Http` or `ApiError::Json`.
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        http_utils::send_checked(self.http_client.get(self.url("health")))
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Json(e.to_string()))
    }

    /// `GET /providers`
    ///
    /// # Errors
    ///
    /// Returns any `ApiError` except `Stream`.
    pub async fn providers(&self) -> Result<ProvidersInfo, ApiError> {
        http_utils::send_enveloped(self.http_client.get(self.url("providers"))).await
    }

    /// Send a message and wait for the complete reply.
    ///
    /// The conversation id returned by the backend is recorded in `session`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidRequest` for a blank message, otherwise any
    /// `ApiError` except `Stream`.
    #[instrument(skip(self, session, message), fields(provider = %session.provider))]
    pub async fn chat(
        &self,
        session: &mut SessionContext,
        message: &str,
    ) -> Result<ChatReply, ApiError> {
        validate_message(message)?;

        let request = self
            .http_client
            .post(self.url("chat"))
            .json(&session.request(message));
        let reply: ChatReply = http_utils::send_enveloped(request).await?;

        if let Some(chat_id) = &reply.chat_id {
            session.record_chat_id(chat_id.clone());
        }
        info!(response_len = reply.response.len(), "Chat reply received");
        Ok(reply)
    }

    /// Send a message and stream the reply.
    ///
    /// `on_text` receives the full text accumulated so far after every delta.
    /// A conversation id announced mid-stream is recorded in `session`, even
    /// when the stream later fails.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidRequest` for a blank message, request-level
    /// errors before the body starts, and `ApiError::Stream` once it has.
    #[instrument(skip(self, session, message, on_text), fields(provider = %session.provider))]
    pub async fn chat_stream<F>(
        &self,
        session: &mut SessionContext,
        message: &str,
        on_text: F,
    ) -> Result<StreamOutcome, ApiError>
    where
        F: FnMut(&str),
    {
        validate_message(message)?;

        let request = self
            .http_client
            .post(self.url("chat/stream"))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&session.request(message));
        let body = Self::body_stream(http_utils::send_checked(request).await?);

        let mut announced: Option<ChatId> = None;
        let result = stream::consume(body, on_text, |id: &ChatId| {
            announced = Some(id.clone());
        })
        .await;

        if let Some(chat_id) = announced {
            session.record_chat_id(chat_id);
        }

        match result {
            Ok(outcome) => {
                debug!(text_len = outcome.text.len(), "Streamed reply completed");
                Ok(outcome)
            }
            Err(e) => {
                warn!(kind = %e.kind(), error = %e.message(), "Streamed reply failed");
                Err(ApiError::Stream(e))
            }
        }
    }

    fn body_stream(
        response: reqwest::Response,
    ) -> impl Stream<Item = Result<Bytes, reqwest::Error>> {
        response.bytes_stream()
    }

    /// Chats of a user, most recently updated first
    ///
    /// # Errors
    ///
    /// Returns any `ApiError` except `Stream`.
    pub async fn user_chats(&self, user_id: i64) -> Result<Vec<ChatSummary>, ApiError> {
        let request = self
            .http_client
            .get(self.url("chat/history"))
            .query(&[("user_id", user_id.to_string())]);
        let list: ChatList = http_utils::send_enveloped(request).await?;
        Ok(list.chats)
    }

    /// One chat with its messages
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` with status 404 when the chat does not exist,
    /// otherwise any `ApiError` except `Stream`.
    pub async fn chat_with_messages(&self, chat_id: &ChatId) -> Result<ChatDetails, ApiError> {
        let request = self
            .http_client
            .get(self.url("chat/history"))
            .query(&[("chat_id", chat_id.to_string())]);
        http_utils::send_enveloped(request).await
    }

    /// Messages of a chat, oldest first, at most `limit`
    ///
    /// # Errors
    ///
    /// Returns any `ApiError` except `Stream`.
    pub async fn chat_messages(
        &self,
        chat_id: &ChatId,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, ApiError> {
        let request = self
            .http_client
            .get(self.url(&format!("chat/{chat_id}/messages")))
            .query(&[("limit", limit)]);
        let list: MessageList = http_utils::send_enveloped(request).await?;
        Ok(list.messages)
    }
}

fn validate_message(message: &str) -> Result<(), ApiError> {
    if message.trim().is_empty() {
        return Err(ApiError::InvalidRequest(
            "Message must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}
