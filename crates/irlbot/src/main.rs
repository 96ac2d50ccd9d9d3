//! # irlbot
//!
//! Twitch chat bot that starts and stops an IRL stream in OBS when the
//! broadcaster types a command. `irlbot auth` performs the one-time
//! authorization; `irlbot run` (the default) runs the bot.

#![deny(unsafe_code)]

mod auth_setup;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use irlbot_auth::{CredentialStore, OAuthClientConfig, TokenLifecycleManager, TwitchIdentity};
use irlbot_chat::TwitchConnector;
use irlbot_obs::{ObsClient, StreamController};
use irlbot_runtime::{Bot, CommandDispatcher, FixedDelay, SessionOrchestrator, check_intro_scene};
use irlbot_settings::BotSettings;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Capacity of the chat event channel.
const EVENT_BUFFER: usize = 256;

/// IRL stream bot.
#[derive(Parser, Debug)]
#[command(name = "irlbot", version, about = "Twitch chat bot that drives OBS for IRL streams")]
struct Cli {
    /// Env file to load instead of `./.env`.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the bot (default).
    Run,
    /// Authorize the bot account and store the first token pair.
    Auth,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = irlbot_settings::load_env_file(cli.env_file.as_deref()) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }
    let settings = irlbot_settings::settings_from_lookup(|key| std::env::var(key).ok());
    logging::init_subscriber(&settings.process.log_level);

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(settings).await,
        Command::Auth => auth_setup::run(settings).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Start everything, then process chat until a termination signal.
async fn run(settings: BotSettings) -> Result<()> {
    settings.require_for_bot()?;

    let identity = TwitchIdentity::new(oauth_config(&settings));
    let tokens = Arc::new(token_manager(&settings, identity));
    let connector = Arc::new(TwitchConnector::new(
        &settings.twitch.chat_url,
        &settings.twitch.channel,
        &settings.twitch.channel,
    )?);
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let orchestrator = Arc::new(SessionOrchestrator::new(
        tokens,
        connector,
        events_tx,
        settings.renewal.clone(),
    ));

    info!("validating access token and connecting to chat");
    let _ = orchestrator
        .start()
        .await
        .context("failed to start chat session")?;

    info!(url = %settings.obs.url(), "connecting to OBS");
    let obs = match ObsClient::connect(&settings.obs.url(), &settings.obs.password).await {
        Ok(obs) => obs,
        Err(e) => {
            orchestrator.shutdown().await;
            return Err(anyhow::Error::new(e).context(
                "failed to connect to OBS; check that OBS is running, its WebSocket server is \
                 enabled and OBS_PASSWORD is correct",
            ));
        }
    };
    let controller = Arc::new(StreamController::new(Arc::new(obs)));
    let _ = check_intro_scene(&controller, &settings.commands.intro_scene).await;

    let dispatcher = Arc::new(CommandDispatcher::new(
        controller.clone(),
        Arc::new(FixedDelay(settings.commands.scene_settle())),
        settings.commands.clone(),
    ));
    let bot = Bot::new(
        orchestrator,
        dispatcher,
        controller,
        events_rx,
        settings.process.shutdown_timeout(),
    );

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(wait_for_signal(shutdown.clone()));
    bot.run(shutdown).await;
    signals.abort();
    Ok(())
}

/// OAuth client configuration from settings.
pub(crate) fn oauth_config(settings: &BotSettings) -> OAuthClientConfig {
    OAuthClientConfig {
        base_url: settings.twitch.identity_url.clone(),
        client_id: settings.twitch.client_id.clone(),
        client_secret: settings.twitch.client_secret.clone(),
        redirect_uri: settings.twitch.redirect_uri.clone(),
    }
}

/// Token manager over the configured credential file.
pub(crate) fn token_manager(settings: &BotSettings, identity: TwitchIdentity) -> TokenLifecycleManager {
    TokenLifecycleManager::new(
        CredentialStore::new(&settings.twitch.token_file),
        Arc::new(identity),
    )
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                let _ = sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C"),
        () = terminate => info!("received SIGTERM"),
    }
    shutdown.cancel();
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
