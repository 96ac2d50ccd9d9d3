//! OBS client error types.

use thiserror::Error;

/// Errors from the OBS WebSocket client and stream controller.
#[derive(Debug, Error)]
pub enum ObsError {
    /// No live connection to OBS.
    #[error("not connected to OBS")]
    NotConnected,

    /// The WebSocket connection could not be opened.
    #[error("failed to connect to OBS at {url}: {reason}")]
    Connect {
        /// Target URL.
        url: String,
        /// Why it failed.
        reason: String,
    },

    /// OBS refused the identification handshake.
    #[error("OBS authentication failed: {0}")]
    Authentication(String),

    /// OBS rejected a request.
    #[error("OBS rejected {request} (code {code}){}", .comment.as_deref().map(|c| format!(": {c}")).unwrap_or_default())]
    Remote {
        /// Request type that failed.
        request: String,
        /// OBS request status code.
        code: u16,
        /// Human-readable reason from OBS.
        comment: Option<String>,
    },

    /// A frame did not match the expected protocol shape.
    #[error("OBS protocol error: {0}")]
    Protocol(String),

    /// A request received no answer in time.
    #[error("timed out after {timeout_ms}ms waiting for {context}")]
    Timeout {
        /// How long we waited.
        timeout_ms: u64,
        /// What we were waiting for.
        context: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
