//! Incremental decoding of the chat backend's streamed responses.
//!
//! The backend answers `POST /chat/stream` with a `text/event-stream` body made
//! of `data: {...}` lines, `data: [DONE]`, and occasionally plain text. This
//! module turns the raw byte chunks of such a body into a growing response
//! text delivered to a sink, plus the conversation id side-channel.

pub mod decoder;
pub mod event;

use futures_util::{Stream, StreamExt};
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace, warn};

pub use decoder::Utf8ChunkDecoder;
pub use event::{parse_line, ChatId, StreamEvent, DATA_PREFIX, DONE_SENTINEL};

/// Terminal failure of one stream consumption
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The chunk source failed before the body ended
    #[error("Transport error: {0}")]
    Transport(String),
    /// The backend reported an `error` frame mid-stream
    #[error("Server error: {0}")]
    Server(String),
}

impl StreamError {
    /// Failure category
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::Server(_) => FailureKind::ServerError,
        }
    }

    /// Human-readable message without the category prefix
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Transport(msg) | Self::Server(msg) => msg,
        }
    }
}

/// Distinguishes transport failures from backend-reported ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection dropped or the body could not be read
    Transport,
    /// The backend sent an `error` frame
    ServerError,
}

impl FailureKind {
    /// Wire name of the kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::ServerError => "server_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a stream that reached the end of its body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Concatenation of all text deltas, in arrival order
    pub text: String,
    /// Conversation id announced by the backend, if any
    pub chat_id: Option<ChatId>,
}

/// Reassembles raw body chunks into lines and applies them to the response.
///
/// One assembler serves exactly one HTTP response. After every text delta,
/// `on_text` receives the *full* accumulated text, so the caller can replace
/// what it displays without diffing. `on_chat_id` fires once, when the
/// conversation id first appears.
///
/// Once an `error` frame is seen the assembler stays failed: lines still in the
/// buffer are dropped and later chunks are rejected with the same error.
pub struct StreamingChunkAssembler<T, M>
where
    T: FnMut(&str),
    M: FnMut(&ChatId),
{
    decoder: Utf8ChunkDecoder,
    buffer: String,
    text: String,
    chat_id: Option<ChatId>,
    failure: Option<String>,
    deltas: usize,
    on_text: T,
    on_chat_id: M,
}

impl<T, M> StreamingChunkAssembler<T, M>
where
    T: FnMut(&str),
    M: FnMut(&ChatId),
{
    /// Create an assembler for a fresh response body
    pub fn new(on_text: T, on_chat_id: M) -> Self {
        Self {
            decoder: Utf8ChunkDecoder::new(),
            buffer: String::new(),
            text: String::new(),
            chat_id: None,
            failure: None,
            deltas: 0,
            on_text,
            on_chat_id,
        }
    }

    /// Text accumulated so far
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Conversation id, once the backend has sent one
    #[must_use]
    pub const fn chat_id(&self) -> Option<&ChatId> {
        self.chat_id.as_ref()
    }

    /// Partial line waiting for its terminating `\n`
    #[must_use]
    pub fn pending_line(&self) -> &str {
        &self.buffer
    }

    /// Feed the next chunk of the response body.
    ///
    /// Every complete line is processed before this returns; an unterminated
    /// trailing line stays buffered.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Server` if a processed line (now or earlier)
    /// carried an `error` field.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Result<(), StreamError> {
        if let Some(message) = &self.failure {
            return Err(StreamError::Server(message.clone()));
        }

        let decoded = self.decoder.decode(chunk);
        trace!(
            bytes = chunk.len(),
            chars = decoded.len(),
            "Decoded stream chunk"
        );
        self.buffer.push_str(&decoded);

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Ok(());
        };
        let tail = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, tail);

        for line in complete.split_terminator('\n') {
            self.process_line(line)?;
        }
        Ok(())
    }

    /// Drain whatever is left and report the outcome.
    ///
    /// The trailing partial line, if any, is processed like any other line.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Server` if an `error` frame was seen at any point.
    pub fn finish(mut self) -> Result<StreamOutcome, StreamError> {
        if let Some(message) = self.failure.take() {
            return Err(StreamError::Server(message));
        }

        let flushed = self.decoder.finish();
        self.buffer.push_str(&flushed);
        let rest = std::mem::take(&mut self.buffer);
        for line in rest.split('\n') {
            self.process_line(line)?;
        }

        debug!(
            deltas = self.deltas,
            text_len = self.text.len(),
            chat_id = ?self.chat_id,
            "Stream completed"
        );

        Ok(StreamOutcome {
            text: self.text,
            chat_id: self.chat_id,
        })
    }

    fn process_line(&mut self, line: &str) -> Result<(), StreamError> {
        match parse_line(line) {
            // Nothing to show; the sink only hears about growth
            StreamEvent::Delta(delta) if delta.is_empty() => {}
            StreamEvent::Delta(delta) => {
                self.text.push_str(&delta);
                self.deltas += 1;
                (self.on_text)(&self.text);
            }
            StreamEvent::ChatId(id) => {
                if let Some(existing) = &self.chat_id {
                    debug!(%existing, ignored = %id, "Chat id already recorded");
                } else {
                    (self.on_chat_id)(&id);
                    self.chat_id = Some(id);
                }
            }
            StreamEvent::ServerError(message) => {
                warn!(
                    error = %message,
                    text_len = self.text.len(),
                    "Backend reported an error mid-stream"
                );
                self.buffer.clear();
                self.failure = Some(message.clone());
                return Err(StreamError::Server(message));
            }
            StreamEvent::Done => trace!("Received [DONE] sentinel"),
            StreamEvent::Empty => {}
        }
        Ok(())
    }
}

/// Consume a whole response body with a fresh assembler.
///
/// Runs until `body` is exhausted. Items may be any byte container; an item
/// error ends consumption as a transport failure. Nothing is retried and no
/// timeout is applied here.
///
/// # Errors
///
/// `StreamError::Transport` when `body` yields an error,
/// `StreamError::Server` when the backend sends an `error` frame.
pub async fn consume<St, B, E, T, M>(
    body: St,
    on_text: T,
    on_chat_id: M,
) -> Result<StreamOutcome, StreamError>
where
    St: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
    T: FnMut(&str),
    M: FnMut(&ChatId),
{
    let mut body = std::pin::pin!(body);
    let mut assembler = StreamingChunkAssembler::new(on_text, on_chat_id);
    let mut chunks = 0usize;

    while let Some(item) = body.next().await {
        let chunk = item.map_err(|e| {
            warn!(error = %e, chunks, "Response body failed mid-stream");
            StreamError::Transport(e.to_string())
        })?;
        chunks += 1;
        assembler.push_chunk(chunk.as_ref())?;
    }

    debug!(chunks, "Response body exhausted");
    assembler.finish()
}
