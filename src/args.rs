use another_chat_client::api::types::Provider;
use another_chat_client::api::DEFAULT_HISTORY_LIMIT;
use another_chat_client::stream::ChatId;
use clap::{Parser, Subcommand};

/// Another Chat: talk to the Another Chat backend from the terminal.
#[derive(Debug, Parser)]
#[command(name = "another-chat", version, about)]
pub struct Cli {
    /// Backend origin, overrides the configured base URL.
    #[arg(long, global = true, env = "API_BASE_URL")]
    pub url: Option<String>,

    /// Path prefix of the API routes.
    #[arg(long, global = true, env = "API_PATH")]
    pub api_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
pub enum Command {
    /// Check that the backend is up.
    Health,

    /// List available and known providers.
    Providers,

    /// List your chats, or print the messages of one chat.
    History {
        /// Chat to print; lists chats of TELEGRAM_USER_ID when omitted.
        chat_id: Option<String>,
        /// Maximum number of messages to print.
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,
    },

    /// Send a message and stream the reply (reads stdin when no message is given).
    Chat {
        /// Provider to route the message to.
        #[arg(short, long)]
        provider: Option<Provider>,
        /// Sampling temperature.
        #[arg(short, long)]
        temperature: Option<f32>,
        /// Output token limit.
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Message text.
        message: Vec<String>,
    },
}

/// Numeric ids are sent as numbers, anything else as an opaque string.
pub fn parse_chat_id(raw: &str) -> ChatId {
    raw.parse::<i64>()
        .map_or_else(|_| ChatId::from(raw), ChatId::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_chat_command() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from([
            "another-chat",
            "--url",
            "http://backend:8000",
            "chat",
            "-p",
            "groq",
            "Привет",
            "мир",
        ])?;
        assert_eq!(cli.url.as_deref(), Some("http://backend:8000"));
        assert_eq!(
            cli.command,
            Command::Chat {
                provider: Some(Provider::Groq),
                temperature: None,
                max_tokens: None,
                message: vec!["Привет".to_string(), "мир".to_string()],
            }
        );
        Ok(())
    }

    #[test]
    fn test_parse_history() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from(["another-chat", "history", "12", "--limit", "5"])?;
        assert_eq!(
            cli.command,
            Command::History {
                chat_id: Some("12".to_string()),
                limit: 5,
            }
        );
        assert_eq!(parse_chat_id("12"), ChatId::Number(12));
        assert_eq!(parse_chat_id("c-1"), ChatId::Text("c-1".to_string()));
        Ok(())
    }

    #[test]
    fn test_help_and_version_come_from_clap() {
        let help = Cli::try_parse_from(["another-chat", "--help"]).map(|_| ());
        assert!(matches!(
            help.map_err(|e| e.kind()),
            Err(clap::error::ErrorKind::DisplayHelp)
        ));

        let version = Cli::try_parse_from(["another-chat", "--version"]).map(|_| ());
        assert!(matches!(
            version.map_err(|e| e.kind()),
            Err(clap::error::ErrorKind::DisplayVersion)
        ));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Cli::try_parse_from(["another-chat", "dance"]).is_err());
        assert!(Cli::try_parse_from(["another-chat", "chat", "--provider"]).is_err());
        assert!(Cli::try_parse_from(["another-chat", "chat", "--provider", "llama", "hi"]).is_err());
    }
}
