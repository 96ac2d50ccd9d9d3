//! Auth error types.

/// Errors that can occur during authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Nothing has been persisted yet; the one-time authorization flow must run.
    #[error("no credentials found; run `irlbot auth` to authorize the bot")]
    NoCredentials,

    /// The provider answered a token request without an access token.
    #[error("provider did not return an access token: {0}")]
    MissingAccessToken(String),

    /// OAuth token exchange or refresh was rejected.
    #[error("OAuth error ({status}): {message}")]
    OAuth {
        /// HTTP status code.
        status: u16,
        /// Error description returned by the provider.
        message: String,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oauth_error_display() {
        let err = AuthError::OAuth {
            status: 400,
            message: "Invalid refresh token".to_string(),
        };
        assert_eq!(err.to_string(), "OAuth error (400): Invalid refresh token");
    }

    #[test]
    fn no_credentials_mentions_auth_command() {
        let err = AuthError::NoCredentials;
        assert!(err.to_string().contains("no credentials"));
        assert!(err.to_string().contains("irlbot auth"));
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let auth_err = AuthError::from(io_err);
        assert!(matches!(auth_err, AuthError::Io(_)));
    }
}
