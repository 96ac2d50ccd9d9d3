//! Token lifecycle: load, validate, renew.
//!
//! Two independent expiry policies live here:
//! - [`TokenLifecycleManager::is_expiring_soon`] compares the persisted expiry
//!   against a lookahead window (used by the periodic renewal check)
//! - [`TokenLifecycleManager::get_valid_token`] asks the provider whether the
//!   token is still good (used at startup), ignoring the expiry margin

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::errors::AuthError;
use crate::provider::IdentityProvider;
use crate::store::CredentialStore;
use crate::types::{TokenSet, is_expiring_soon, now_ms};

/// Obtains, validates and renews tokens.
pub struct TokenLifecycleManager {
    store: CredentialStore,
    provider: Arc<dyn IdentityProvider>,
}

impl TokenLifecycleManager {
    /// Create a manager over a store and a provider client.
    pub fn new(store: CredentialStore, provider: Arc<dyn IdentityProvider>) -> Self {
        Self { store, provider }
    }

    /// The backing credential store.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Read the persisted token set. No network.
    pub fn load(&self) -> Result<Option<TokenSet>, AuthError> {
        self.store.load()
    }

    /// Whether the persisted token expires within `lookahead` (or is absent).
    ///
    /// An unreadable credential file counts as absent.
    pub fn is_expiring_soon(&self, lookahead: Duration) -> bool {
        let tokens = self.load().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read credentials, treating as absent");
            None
        });
        is_expiring_soon(tokens.as_ref(), lookahead, now_ms())
    }

    /// Ask the provider whether `access_token` is valid and was issued to our
    /// client. Any failure counts as invalid.
    pub async fn validate_remote(&self, access_token: &str) -> bool {
        match self.provider.validate(access_token).await {
            Ok(v) if v.client_id == self.provider.client_id() => true,
            Ok(v) => {
                warn!(token_client = %v.client_id, "token belongs to a different client");
                false
            }
            Err(e) => {
                info!(error = %e, "token validation failed");
                false
            }
        }
    }

    /// Exchange `refresh_token` for a new token set and persist it.
    ///
    /// The new set is on disk before this returns.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        let issued_at = now_ms();
        let grant = self.provider.refresh(refresh_token).await?;
        let tokens = TokenSet::from_grant(grant, Some(refresh_token), issued_at)?;
        self.store.save(&tokens)?;
        info!("token renewed");
        Ok(tokens)
    }

    /// Refresh using whatever refresh token is currently persisted.
    pub async fn refresh_persisted(&self) -> Result<TokenSet, AuthError> {
        let current = self.load()?.ok_or(AuthError::NoCredentials)?;
        self.refresh(&current.refresh_token).await
    }

    /// Return a usable access token, renewing it if the provider rejects the
    /// persisted one.
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        let tokens = self.load()?.ok_or(AuthError::NoCredentials)?;

        if self.validate_remote(&tokens.access_token).await {
            info!("persisted token is valid");
            return Ok(tokens.access_token);
        }

        info!("persisted token rejected, renewing");
        let renewed = self.refresh(&tokens.refresh_token).await?;
        Ok(renewed.access_token)
    }

    /// Finish the one-time authorization flow: exchange `code` and persist
    /// the first token set.
    pub async fn complete_authorization(&self, code: &str) -> Result<TokenSet, AuthError> {
        let issued_at = now_ms();
        let grant = self.provider.exchange_code(code).await?;
        let tokens = TokenSet::from_grant(grant, None, issued_at)?;
        self.store.save(&tokens)?;
        info!(path = ?self.store.path(), "authorization complete, tokens saved");
        Ok(tokens)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
