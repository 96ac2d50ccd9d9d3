//! Chat event loop and graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use irlbot_chat::{ChatEvent, SessionEvent, is_auth_failure_notice};
use irlbot_obs::StreamController;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::CommandInvocation;
use crate::dispatcher::{CommandDispatcher, DispatchOutcome};
use crate::errors::RuntimeError;
use crate::orchestrator::SessionOrchestrator;

/// Warn when `intro_scene` is not among the configured scenes.
///
/// Returns whether the scene exists. Failing to list scenes is logged and
/// treated as "unknown".
pub async fn check_intro_scene(controller: &StreamController, intro_scene: &str) -> bool {
    match controller.list_scenes().await {
        Ok(scenes) => {
            info!(scenes = %scenes.join(", "), "scenes available in OBS");
            let found = scenes.iter().any(|s| s == intro_scene);
            if !found {
                warn!(scene = intro_scene, "intro scene not found in OBS; create it before going live");
            }
            found
        }
        Err(e) => {
            warn!(error = %e, "failed to list OBS scenes");
            false
        }
    }
}

/// Single consumer of chat events.
pub struct Bot {
    orchestrator: Arc<SessionOrchestrator>,
    dispatcher: Arc<CommandDispatcher>,
    controller: Arc<StreamController>,
    events: mpsc::Receiver<SessionEvent>,
    shutdown_timeout: Duration,
}

impl Bot {
    /// Assemble the loop. `events` must be the receiver paired with the
    /// orchestrator's event sender.
    pub fn new(
        orchestrator: Arc<SessionOrchestrator>,
        dispatcher: Arc<CommandDispatcher>,
        controller: Arc<StreamController>,
        events: mpsc::Receiver<SessionEvent>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            dispatcher,
            controller,
            events,
            shutdown_timeout,
        }
    }

    /// Process events until `shutdown` fires, then tear everything down
    /// within the shutdown timeout.
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                event = self.events.recv() => {
                    let Some(event) = event else { break };
                    self.handle_event(event).await;
                }
            }
        }
        self.shutdown().await;
    }

    async fn handle_event(&self, event: SessionEvent) {
        match event.event {
            ChatEvent::Connected { address, port } => {
                info!(%address, port, session = %event.session, "connected to chat");
                let [start, stop] = self.dispatcher.command_names();
                info!("bot ready; {start} starts the IRL stream, {stop} stops it (broadcaster only)");
            }
            ChatEvent::Disconnected { reason } => {
                warn!(%reason, session = %event.session, "disconnected from chat");
            }
            ChatEvent::Notice {
                notice_id, message, ..
            } if is_auth_failure_notice(&notice_id) => {
                let orchestrator = self.orchestrator.clone();
                let session = event.session;
                drop(tokio::spawn(async move {
                    match orchestrator.handle_notice(session, &notice_id, &message).await {
                        Ok(outcome) => debug!(?outcome, "auth notice handled"),
                        Err(RuntimeError::ShuttingDown) => {}
                        Err(e) => error!(error = %e, "notice-driven reauthentication failed"),
                    }
                }));
            }
            ChatEvent::Notice {
                notice_id, message, ..
            } => debug!(%notice_id, %message, "chat notice"),
            ChatEvent::Message {
                channel,
                tags,
                text,
                is_self,
            } => {
                if is_self {
                    return;
                }
                let Some(invocation) = CommandInvocation::parse(&channel, &tags, &text) else {
                    return;
                };
                if self.orchestrator.current_session_id().is_none() {
                    warn!("no chat session to reply through; dropping command");
                    return;
                }
                info!(user = %invocation.username, command = %invocation.command_name, "command received");
                match self.dispatcher.dispatch(&invocation, self.orchestrator.sessions()).await {
                    DispatchOutcome::Completed { command, .. } => {
                        info!(?command, "command completed");
                    }
                    DispatchOutcome::Failed { command, .. } => warn!(?command, "command failed"),
                    DispatchOutcome::Unauthorized | DispatchOutcome::Unknown => {}
                }
            }
        }
    }

    async fn shutdown(&self) {
        info!("shutting down");
        let teardown = async {
            self.orchestrator.shutdown().await;
            self.controller.disconnect().await;
        };
        if tokio::time::timeout(self.shutdown_timeout, teardown).await.is_err() {
            warn!(timeout = ?self.shutdown_timeout, "shutdown timed out; exiting anyway");
        } else {
            info!("shutdown complete");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use irlbot_auth::{
        CredentialStore, OAuthClientConfig, TokenLifecycleManager, TokenSet, TwitchIdentity, now_ms,
    };
    use irlbot_chat::testing::FakeChatConnector;
    use irlbot_chat::{ChatTags, NOTICE_BANNED};
    use irlbot_obs::testing::FakeObs;
    use irlbot_settings::{CommandSettings, RenewalSettings};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::orchestrator::SessionState;
    use crate::settle::FixedDelay;

    struct Running {
        _server: MockServer,
        _dir: TempDir,
        obs: Arc<FakeObs>,
        connector: Arc<FakeChatConnector>,
        orchestrator: Arc<SessionOrchestrator>,
        shutdown: CancellationToken,
        task: tokio::task::JoinHandle<()>,
    }

    async fn running_bot() -> Running {
        running_bot_with_refresh(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access", "refresh_token": "new-refresh", "expires_in": 14_400
            })),
        )
        .await
    }

    async fn running_bot_with_refresh(refresh: ResponseTemplate) -> Running {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/validate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "client_id": "cid", "expires_in": 3600
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(refresh)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("tokens.json"));
        store
            .save(&TokenSet {
                access_token: "old-access".into(),
                refresh_token: "old-refresh".into(),
                expires_at: Some(now_ms() + 4 * 60 * 60 * 1000),
            })
            .unwrap();
        let provider = TwitchIdentity::new(OAuthClientConfig {
            base_url: server.uri(),
            client_id: "cid".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost:3000/callback".into(),
        });
        let tokens = Arc::new(TokenLifecycleManager::new(store, Arc::new(provider)));

        let connector = Arc::new(FakeChatConnector::new());
        let (events_tx, events_rx) = mpsc::channel(16);
        let orchestrator = Arc::new(SessionOrchestrator::new(
            tokens,
            connector.clone(),
            events_tx,
            RenewalSettings::default(),
        ));
        let _ = orchestrator.start().await.unwrap();

        let obs = Arc::new(FakeObs::new(&["Intro", "Main"]));
        let controller = Arc::new(StreamController::new(obs.clone()));
        let dispatcher = Arc::new(CommandDispatcher::new(
            controller.clone(),
            Arc::new(FixedDelay(Duration::from_millis(1))),
            CommandSettings::default(),
        ));
        let shutdown = CancellationToken::new();
        let bot = Bot::new(
            orchestrator.clone(),
            dispatcher,
            controller,
            events_rx,
            Duration::from_secs(5),
        );
        let task = tokio::spawn(bot.run(shutdown.clone()));

        Running {
            _server: server,
            _dir: dir,
            obs,
            connector,
            orchestrator,
            shutdown,
            task,
        }
    }

    fn message(badges: &[(&str, &str)], text: &str, is_self: bool) -> ChatEvent {
        ChatEvent::Message {
            channel: "streamer".into(),
            tags: ChatTags {
                username: "streamer".into(),
                display_name: Some("Streamer".into()),
                badges: badges
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>(),
            },
            text: text.into(),
            is_self,
        }
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn broadcaster_command_goes_live_and_replies() {
        let bot = running_bot().await;
        let chat = bot.connector.latest().unwrap();

        chat.emit(message(&[("broadcaster", "1")], "!startirl", false)).await;
        eventually(|| !chat.said().is_empty()).await;

        assert!(bot.obs.is_active());
        assert_eq!(chat.said()[0].1, "@streamer IRL stream started! 🎥");
        bot.shutdown.cancel();
        bot.task.await.unwrap();
    }

    #[tokio::test]
    async fn self_messages_and_plain_text_are_ignored() {
        let bot = running_bot().await;
        let chat = bot.connector.latest().unwrap();

        chat.emit(message(&[("broadcaster", "1")], "!startirl", true)).await;
        chat.emit(message(&[("broadcaster", "1")], "startirl", false)).await;
        chat.emit(message(&[], "!startirl", false)).await;
        chat.emit(ChatEvent::Disconnected { reason: "connection reset".into() }).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(bot.obs.calls().is_empty());
        assert!(chat.said().is_empty());
        bot.shutdown.cancel();
        bot.task.await.unwrap();
    }

    #[tokio::test]
    async fn auth_notice_triggers_session_rebuild() {
        let bot = running_bot().await;
        let old = bot.connector.latest().unwrap();

        old.emit(ChatEvent::Notice {
            channel: "streamer".into(),
            notice_id: NOTICE_BANNED.into(),
            message: "You are permanently banned.".into(),
        })
        .await;
        eventually(|| bot.connector.sessions().len() == 2).await;
        eventually(|| bot.orchestrator.state() == SessionState::Connected && old.is_disconnected())
            .await;

        assert_eq!(bot.connector.latest().unwrap().token(), "new-access");
        bot.shutdown.cancel();
        bot.task.await.unwrap();
    }

    #[tokio::test]
    async fn failed_notice_renewal_keeps_serving_commands() {
        let bot = running_bot_with_refresh(ResponseTemplate::new(400).set_body_json(
            serde_json::json!({ "status": 400, "message": "Invalid refresh token" }),
        ))
        .await;
        let chat = bot.connector.latest().unwrap();

        chat.emit(ChatEvent::Notice {
            channel: "streamer".into(),
            notice_id: NOTICE_BANNED.into(),
            message: "You are permanently banned.".into(),
        })
        .await;
        eventually(|| bot.orchestrator.state() == SessionState::Reauthenticating).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(bot.connector.sessions().len(), 1);
        assert!(!chat.is_disconnected());

        chat.emit(message(&[("broadcaster", "1")], "!startirl", false)).await;
        eventually(|| !chat.said().is_empty()).await;
        assert!(bot.obs.is_active());
        bot.shutdown.cancel();
        bot.task.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_disconnects_chat_and_obs() {
        let bot = running_bot().await;
        let chat = bot.connector.latest().unwrap();

        bot.shutdown.cancel();
        bot.task.await.unwrap();

        assert!(chat.is_disconnected());
        assert!(!irlbot_obs::ObsRpc::is_connected(bot.obs.as_ref()));
        assert_eq!(bot.orchestrator.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn intro_scene_check() {
        let obs = Arc::new(FakeObs::new(&["Intro", "Main"]));
        let controller = StreamController::new(obs);
        assert!(check_intro_scene(&controller, "Intro").await);
        assert!(!check_intro_scene(&controller, "Outro").await);
    }
}
