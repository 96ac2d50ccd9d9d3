//! Chat transport errors.

use thiserror::Error;

/// Errors raised by the chat transport.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The chat server could not be reached or the URL is unusable.
    #[error("failed to connect to chat at {url}: {reason}")]
    Connect {
        /// Server URL.
        url: String,
        /// Underlying failure.
        reason: String,
    },
    /// The session was torn down or its socket task has exited.
    #[error("chat session is closed")]
    Closed,
    /// A message could not be written to the socket.
    #[error("failed to send chat message: {0}")]
    Send(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
