//! Runtime errors.

use irlbot_auth::AuthError;
use irlbot_chat::ChatError;
use thiserror::Error;

/// Failures of session startup and reauthentication.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Token acquisition or renewal failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// The chat session could not be built.
    #[error(transparent)]
    Chat(#[from] ChatError),
    /// The orchestrator is shutting down and refuses new sessions.
    #[error("runtime is shutting down")]
    ShuttingDown,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
