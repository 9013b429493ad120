mod args;

use another_chat_client::api::{ApiError, ChatApiClient};
use another_chat_client::config::Settings;
use anyhow::Context;
use args::{parse_chat_id, Cli, Command};
use clap::Parser;
use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Read, Write};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    bearer: Regex,
    api_key: Regex,
    telegram_token: Regex,
    init_data_hash: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            bearer: Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9._~+/=-]+")?,
            api_key: Regex::new(r"([A-Z0-9_]*API_KEY)=[^\s&]+")?,
            telegram_token: Regex::new(r"[0-9]{8,10}:[A-Za-z0-9_-]{35}")?,
            init_data_hash: Regex::new(r"hash=[0-9a-fA-F]{64}")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .bearer
            .replace_all(&output, "${1}[MASKED]")
            .to_string();
        output = self
            .api_key
            .replace_all(&output, "${1}=[MASKED]")
            .to_string();
        output = self
            .telegram_token
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .init_data_hash
            .replace_all(&output, "hash=[MASKED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted text may be shorter or longer
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

/// Prints only the part of each full-text update that was not printed yet.
///
/// Stops writing after the first I/O error (e.g. a closed pipe).
struct IncrementalPrinter<W: Write> {
    out: W,
    printed: usize,
    failed: bool,
}

impl<W: Write> IncrementalPrinter<W> {
    const fn new(out: W) -> Self {
        Self {
            out,
            printed: 0,
            failed: false,
        }
    }

    fn render(&mut self, text: &str) {
        if self.failed {
            return;
        }
        if let Some(new) = text.get(self.printed..) {
            if let Err(e) = self
                .out
                .write_all(new.as_bytes())
                .and_then(|()| self.out.flush())
            {
                debug!(error = %e, "Stopped printing streamed reply");
                self.failed = true;
                return;
            }
        }
        self.printed = text.len();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    let cli = Cli::parse();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    let mut settings = init_settings();
    if let Some(url) = cli.url {
        settings.api_base_url = url;
    }
    if let Some(api_path) = cli.api_path {
        settings.api_path = api_path;
    }

    let client = ChatApiClient::from_settings(&settings);
    info!(api_root = client.api_root(), "Chat client initialized.");

    if let Err(e) = run(&client, &settings, cli.command).await {
        error!("{e:#}");
        if let Some(ApiError::Stream(stream_error)) = e.downcast_ref::<ApiError>() {
            eprintln!("\n[{}] {}", stream_error.kind(), stream_error.message());
        } else {
            eprintln!("\n{e:#}");
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(client: &ChatApiClient, settings: &Settings, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Health => {
            let health = client.health().await?;
            println!(
                "status: {} (version {}, server time {})",
                health.status, health.version, health.timestamp
            );
        }
        Command::Providers => {
            let info = client.providers().await?;
            println!("available: {}", info.providers.join(", "));
            println!("all:       {}", info.all.join(", "));
        }
        Command::History {
            chat_id: None,
            limit: _,
        } => {
            let user = settings
                .user()
                .context("TELEGRAM_USER_ID is required to list chats")?;
            for chat in client.user_chats(user.id).await? {
                println!(
                    "{:>6}  {:<10}  {:>3} msgs  {}",
                    chat.id,
                    chat.provider.as_deref().unwrap_or("-"),
                    chat.message_count,
                    chat.title.as_deref().unwrap_or("(untitled)")
                );
            }
        }
        Command::History {
            chat_id: Some(raw),
            limit,
        } => {
            let chat_id = parse_chat_id(&raw);
            for message in client.chat_messages(&chat_id, limit).await? {
                println!("[{}] {}", message.role, message.content);
            }
        }
        Command::Chat {
            provider,
            temperature,
            max_tokens,
            message,
        } => {
            let message = if message.is_empty() {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .context("failed to read message from stdin")?;
                buf
            } else {
                message.join(" ")
            };

            let mut session = settings.session();
            if let Some(provider) = provider {
                session.provider = provider;
            }
            if let Some(temperature) = temperature {
                session.set_temperature(temperature);
            }
            if let Some(max_tokens) = max_tokens {
                session.set_max_tokens(max_tokens);
            }

            let mut printer = IncrementalPrinter::new(io::stdout());
            let outcome = client
                .chat_stream(&mut session, &message, |text: &str| printer.render(text))
                .await?;
            println!();

            if let Some(chat_id) = session.chat_id {
                info!(%chat_id, chars = outcome.text.chars().count(), "Reply complete");
                eprintln!("chat_id: {chat_id}");
            }
        }
    }
    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let filter = if debug_mode {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("another_chat_client=info,another_chat=info,hyper=warn,reqwest=warn")
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}
