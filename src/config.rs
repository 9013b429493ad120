//! Configuration and settings management
//!
//! Loads client settings from config files and environment variables.

use crate::api::types::{Provider, TelegramUser};
use crate::session::{SessionContext, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Client settings loaded from config files and environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Backend origin, e.g. `https://chat.example.com`
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Path prefix of the API routes
    #[serde(default = "default_api_path")]
    pub api_path: String,
    /// Provider used when the user has not picked one
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Default sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Default output token limit
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Overall HTTP timeout, including the streamed body
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Telegram user id to send as the message author
    pub telegram_user_id: Option<i64>,
    /// Telegram first name
    pub telegram_first_name: Option<String>,
    /// Telegram username
    pub telegram_username: Option<String>,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_api_path() -> String {
    "/api".to_string()
}

fn default_provider() -> String {
    Provider::default().as_str().to_string()
}

const fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

const fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

const fn default_http_timeout_secs() -> u64 {
    120
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_path: default_api_path(),
            default_provider: default_provider(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            http_timeout_secs: default_http_timeout_secs(),
            telegram_user_id: None,
            telegram_first_name: None,
            telegram_username: None,
        }
    }
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use another_chat_client::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP__API_BASE_URL=https://... another-chat health`
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Plain UPPER_SNAKE_CASE variables map onto snake_case keys; empty ones count as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Default provider, falling back to `openai` on an unknown name
    #[must_use]
    pub fn provider(&self) -> Provider {
        self.default_provider.parse().unwrap_or_else(|e| {
            warn!("{e}, falling back to {}", Provider::default());
            Provider::default()
        })
    }

    /// Telegram identity, when a user id is configured
    #[must_use]
    pub fn user(&self) -> Option<TelegramUser> {
        self.telegram_user_id.map(|id| TelegramUser {
            id,
            first_name: self.telegram_first_name.clone(),
            username: self.telegram_username.clone(),
        })
    }

    /// Fresh session seeded with the configured defaults
    #[must_use]
    pub fn session(&self) -> SessionContext {
        let session = SessionContext::new(self.provider())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        match self.user() {
            Some(user) => session.with_user(user),
            None => session,
        }
    }

    /// HTTP timeout as a `Duration`
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Root URL of the API routes: base URL plus normalized path prefix
    #[must_use]
    pub fn api_root(&self) -> String {
        let base = self.api_base_url.trim_end_matches('/');
        let path = self.api_path.trim_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }
}
