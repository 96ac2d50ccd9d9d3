//! Token types and expiry arithmetic.
//!
//! The persisted token record keeps the provider's field names
//! (`access_token`, `refresh_token`, `expires_at`) so that the file stays
//! readable by hand.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::AuthError;

/// Access/refresh token pair plus the absolute expiry instant.
///
/// Replaced wholesale on every renewal; never patched field by field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer token for chat login and API calls.
    pub access_token: String,
    /// Token used to obtain the next pair.
    pub refresh_token: String,
    /// Expiry in **milliseconds** since Unix epoch. `None` means expired.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl TokenSet {
    /// Build a token set from a grant response issued at `issued_at_ms`.
    ///
    /// When the provider omits `refresh_token`, `previous_refresh` is kept.
    pub fn from_grant(
        grant: TokenResponse,
        previous_refresh: Option<&str>,
        issued_at_ms: i64,
    ) -> Result<Self, AuthError> {
        let Some(access_token) = grant.access_token.filter(|t| !t.is_empty()) else {
            let detail = grant
                .message
                .unwrap_or_else(|| "response carried no access_token".to_string());
            return Err(AuthError::MissingAccessToken(detail));
        };
        let refresh_token = grant
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh.map(str::to_string))
            .unwrap_or_default();
        Ok(Self {
            access_token,
            refresh_token,
            expires_at: grant
                .expires_in
                .map(|secs| calculate_expires_at(issued_at_ms, secs)),
        })
    }

    /// Whether this token expires within `lookahead` of `now_ms`.
    pub fn expires_within(&self, lookahead: Duration, now_ms: i64) -> bool {
        match self.expires_at {
            None => true,
            Some(at) => at.saturating_sub(now_ms) < duration_ms(lookahead),
        }
    }
}

/// Whether renewal is due: true when no token exists or it expires within
/// `lookahead` of `now_ms`.
pub fn is_expiring_soon(tokens: Option<&TokenSet>, lookahead: Duration, now_ms: i64) -> bool {
    tokens.is_none_or(|t| t.expires_within(lookahead, now_ms))
}

/// Response body of the provider's token endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TokenResponse {
    /// New access token, absent on failure.
    #[serde(default)]
    pub access_token: Option<String>,
    /// New refresh token; some providers rotate it, some omit it.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Provider error description, if any.
    #[serde(default)]
    pub message: Option<String>,
}

/// Response body of the provider's validation endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct ValidateResponse {
    /// Client the token was issued to.
    pub client_id: String,
    /// Login name of the token owner.
    #[serde(default)]
    pub login: Option<String>,
    /// User id of the token owner.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Remaining lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Granted scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Current system time in milliseconds since Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Absolute expiry from an issue instant and an `expires_in` in seconds.
pub fn calculate_expires_at(issued_at_ms: i64, expires_in_seconds: i64) -> i64 {
    issued_at_ms.saturating_add(expires_in_seconds.saturating_mul(1000))
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
