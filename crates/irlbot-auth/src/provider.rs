//! Identity provider client.
//!
//! Two endpoints are used: `POST /oauth2/token` (refresh and
//! authorization-code grants, form-encoded) and `GET /oauth2/validate`
//! (bearer-style `OAuth <token>` header).

use async_trait::async_trait;
use reqwest::Url;

use crate::errors::AuthError;
use crate::types::{TokenResponse, ValidateResponse};

/// Scopes the bot needs to read and write chat.
pub const CHAT_SCOPES: &[&str] = &["chat:read", "chat:edit"];

/// Remote OAuth endpoint used by the lifecycle manager.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// OAuth client id tokens are expected to belong to.
    fn client_id(&self) -> &str;

    /// Ask the provider who owns `access_token`.
    async fn validate(&self, access_token: &str) -> Result<ValidateResponse, AuthError>;

    /// Exchange a refresh token for a new grant.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError>;

    /// Exchange an authorization code for the first grant.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError>;
}

/// OAuth client configuration.
#[derive(Clone, Debug)]
pub struct OAuthClientConfig {
    /// Base URL of the identity provider (no trailing slash).
    pub base_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Redirect URI for the authorization-code flow.
    pub redirect_uri: String,
}

/// [`IdentityProvider`] backed by the Twitch identity service.
pub struct TwitchIdentity {
    config: OAuthClientConfig,
    client: reqwest::Client,
}

impl TwitchIdentity {
    /// Create a provider client.
    pub fn new(config: OAuthClientConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Build the browser URL that starts the authorization-code flow.
    pub fn authorization_url(&self, scopes: &[&str]) -> Result<Url, AuthError> {
        let scope = scopes.join(" ");
        Url::parse_with_params(
            &format!("{}/oauth2/authorize", self.config.base_url),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
            ],
        )
        .map_err(|e| AuthError::OAuth {
            status: 0,
            message: format!("invalid identity provider URL: {e}"),
        })
    }

    fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.config.base_url)
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let resp = self.client.post(self.token_url()).form(form).send().await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthError::OAuth {
                status,
                message: error_message(&text),
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl IdentityProvider for TwitchIdentity {
    fn client_id(&self) -> &str {
        &self.config.client_id
    }

    #[tracing::instrument(skip_all)]
    async fn validate(&self, access_token: &str) -> Result<ValidateResponse, AuthError> {
        let resp = self
            .client
            .get(format!("{}/oauth2/validate", self.config.base_url))
            .header(reqwest::header::AUTHORIZATION, format!("OAuth {access_token}"))
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthError::OAuth {
                status,
                message: error_message(&text),
            });
        }

        Ok(resp.json().await?)
    }

    #[tracing::instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        self.post_token_form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ])
        .await
    }

    #[tracing::instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        self.post_token_form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])
        .await
    }
}

/// Pull the provider's `message` out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
