//! # irlbot-auth
//!
//! OAuth credential lifecycle for the chat bot.
//!
//! - [`CredentialStore`]: the single persisted [`TokenSet`] (pure file I/O)
//! - [`IdentityProvider`]: token and validation endpoints, with
//!   [`TwitchIdentity`] as the HTTP implementation
//! - [`TokenLifecycleManager`]: load, validate, refresh and persist
//!
//! A refreshed token set is always written to disk before it is handed to
//! the caller.

#![deny(unsafe_code)]

pub mod errors;
pub mod lifecycle;
pub mod provider;
pub mod store;
pub mod types;

pub use errors::AuthError;
pub use lifecycle::TokenLifecycleManager;
pub use provider::{CHAT_SCOPES, IdentityProvider, OAuthClientConfig, TwitchIdentity};
pub use store::CredentialStore;
pub use types::{
    TokenResponse, TokenSet, ValidateResponse, calculate_expires_at, is_expiring_soon, now_ms,
};
