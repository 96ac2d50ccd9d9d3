//! One-time authorization flow.
//!
//! Serves a page linking to the provider's consent screen and stores the
//! token pair returned to `/callback`. The server stops shortly after the
//! first successful exchange.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use irlbot_auth::{CHAT_SCOPES, TokenLifecycleManager, TwitchIdentity};
use irlbot_settings::BotSettings;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Time given to the browser to receive the success page before exit.
const LINGER_AFTER_SUCCESS: Duration = Duration::from_secs(1);

#[derive(Clone)]
struct AuthState {
    tokens: Arc<TokenLifecycleManager>,
    authorize_url: String,
    completed: CancellationToken,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Run the authorization server until a token pair has been stored.
pub async fn run(settings: BotSettings) -> Result<()> {
    settings.require_for_auth()?;

    let identity = TwitchIdentity::new(crate::oauth_config(&settings));
    let authorize_url = identity
        .authorization_url(CHAT_SCOPES)
        .context("failed to build authorization URL")?
        .to_string();
    let tokens = Arc::new(crate::token_manager(&settings, identity));

    let completed = CancellationToken::new();
    let app = router(AuthState {
        tokens,
        authorize_url,
        completed: completed.clone(),
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], settings.process.auth_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind authorization server on {addr}"))?;
    info!(
        "open http://localhost:{}/ in a browser to authorize the bot",
        settings.process.auth_port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            completed.cancelled().await;
            tokio::time::sleep(LINGER_AFTER_SUCCESS).await;
        })
        .await
        .context("authorization server failed")?;

    info!(path = %settings.twitch.token_file.display(), "tokens saved; start the bot with `irlbot run`");
    Ok(())
}

fn router(state: AuthState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/callback", get(callback))
        .with_state(state)
}

/// GET /
async fn index(State(state): State<AuthState>) -> Html<String> {
    page(
        "IRL bot authorization",
        &format!(
            r#"<a href="{}">Authorize with Twitch</a>"#,
            escape_html(&state.authorize_url)
        ),
    )
}

/// GET /callback?code=...
async fn callback(
    State(state): State<AuthState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<String>) {
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        let reason = params
            .error_description
            .or(params.error)
            .unwrap_or_else(|| "no authorization code in callback".to_string());
        warn!(%reason, "authorization was not granted");
        return (
            StatusCode::BAD_REQUEST,
            page("Authorization failed", &escape_html(&reason)),
        );
    };

    match state.tokens.complete_authorization(&code).await {
        Ok(_) => {
            state.completed.cancel();
            (
                StatusCode::OK,
                page(
                    "Authorization complete",
                    "Tokens saved. You can close this window and start the bot.",
                ),
            )
        }
        Err(e) => {
            error!(error = %e, "authorization code exchange failed");
            (
                StatusCode::BAD_GATEWAY,
                page("Authorization failed", &escape_html(&e.to_string())),
            )
        }
    }
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h1>{title}</h1><p>{body}</p></body></html>"
    ))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
