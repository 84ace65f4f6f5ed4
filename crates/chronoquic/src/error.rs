use std::str::Utf8Error;

use chronoquic_session::{HandlerError, SessionError};
use chronoquic_transport::TransportError;

/// Why a pattern could not be turned into a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateTimeError {
    /// Request data is not valid UTF-8.
    #[error("pattern is not valid UTF-8: {0}")]
    Decode(#[from] Utf8Error),

    /// The pattern has an unknown or incomplete specifier, or asks for a
    /// field the timestamp cannot render.
    #[error("invalid date format pattern {pattern:?}")]
    Format { pattern: String },
}

/// Characters of a rejected pattern repeated in its error message.
pub const MAX_ECHOED_PATTERN_CHARS: usize = 64;

impl DateTimeError {
    /// Format error naming at most [`MAX_ECHOED_PATTERN_CHARS`] of `pattern`.
    pub fn format(pattern: &str) -> Self {
        let mut echoed: String = pattern.chars().take(MAX_ECHOED_PATTERN_CHARS).collect();
        if echoed.len() < pattern.len() {
            echoed.push_str("...");
        }
        DateTimeError::Format { pattern: echoed }
    }
}

impl From<DateTimeError> for HandlerError {
    fn from(err: DateTimeError) -> Self {
        HandlerError::Invalid(err.to_string())
    }
}

/// Errors from starting, running or stopping a [`Server`](crate::Server).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The tokio runtime could not be built.
    #[error("failed to build runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// Binding or TLS setup failed. No socket is left bound.
    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportError),

    /// The accept loop ended with an error.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Waiting for Ctrl-C failed.
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),

    /// The accept loop task panicked or was aborted.
    #[error("server task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;
