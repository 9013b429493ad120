//! HTTP utilities for the chat backend client
//!
//! Shared request/response handling so every endpoint reports failures
//! the same way.

use super::types::Envelope;
use super::ApiError;
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 500;

/// Creates an HTTP client with the given overall request timeout.
///
/// The timeout covers the full streamed body as well, so it must be
/// generous enough for long generations.
#[must_use]
pub fn create_http_client(timeout: Duration) -> HttpClient {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Sends a request and returns the response if its status is a success.
///
/// # Errors
///
/// Returns `ApiError::Network` on connectivity issues and `ApiError::Http`
/// with a cleaned-up body on non-success status codes.
pub async fn send_checked(request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    Err(ApiError::Http {
        status: status.as_u16(),
        message: clean_error_body(&error_text),
    })
}

/// Sends a request and unwraps the backend's `{success, data, error}` envelope.
///
/// # Errors
///
/// Everything `send_checked` returns, plus `ApiError::Json` when the body
/// does not parse and `ApiError::Backend` when `success` is false or `data`
/// is missing.
pub async fn send_enveloped<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    let envelope: Envelope<T> = send_checked(request)
        .await?
        .json()
        .await
        .map_err(|e| ApiError::Json(e.to_string()))?;
    unwrap_envelope(envelope)
}

pub(crate) fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, ApiError> {
    if !envelope.success {
        return Err(ApiError::Backend(
            envelope
                .error
                .unwrap_or_else(|| "request failed without an error message".to_string()),
        ));
    }
    envelope
        .data
        .ok_or_else(|| ApiError::Backend("response has no data".to_string()))
}

/// Turns an error response body into something fit for a log line or chat bubble.
///
/// HTML error pages from Nginx/proxies are replaced by a note, and the
/// backend's own `{"error": "..."}` bodies are reduced to the message.
#[must_use]
pub fn clean_error_body(error_text: &str) -> String {
    let trimmed = error_text.trim_start();
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    if is_html {
        return "Server returned HTML error page".to_string();
    }

    if let Ok(envelope) = serde_json::from_str::<Envelope<serde_json::Value>>(error_text) {
        if let Some(message) = envelope.error {
            return message;
        }
    }

    if error_text.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !error_text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... (truncated)", &error_text[..cut])
    } else {
        error_text.to_string()
    }
}
