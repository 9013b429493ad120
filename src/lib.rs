#![deny(missing_docs)]
//! Another Chat client library.
//!
//! Talks to the Another Chat backend and renders its streamed LLM replies
//! incrementally.

/// Chat backend HTTP client.
pub mod api;
/// Configuration management.
pub mod config;
/// Per-user conversation state.
pub mod session;
/// Streamed reply decoding.
pub mod stream;
