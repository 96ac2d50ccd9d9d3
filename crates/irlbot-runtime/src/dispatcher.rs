//! Authorizes chat commands and drives the stream controller.
//!
//! Only the broadcaster may run commands. Everyone else is dropped with a
//! log line and no reply. Controller failures are reported back to the
//! invoking user in chat and never propagate past this layer.
//!
//! A start command can outlive the session it arrived on, since the scene
//! settle delay leaves room for a reauthentication to swap sessions. Replies
//! therefore go through whichever session is live when the command finishes.

use std::sync::Arc;

use irlbot_chat::{ChatError, ChatSession};
use irlbot_obs::{ObsError, StreamController};
use irlbot_settings::CommandSettings;
use tracing::{debug, info, warn};

use crate::command::{CommandInvocation, Role};
use crate::holder::SessionHolder;
use crate::settle::SceneSettle;

/// Commands the bot understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotCommand {
    /// Switch to the intro scene and go live.
    Start,
    /// End the stream.
    Stop,
}

/// What happened to one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Sender is not the broadcaster; nothing was done.
    Unauthorized,
    /// The command name matched neither configured command.
    Unknown,
    /// The command ran; `reply` was sent to chat.
    Completed {
        /// Which command ran.
        command: BotCommand,
        /// Reply text sent to chat.
        reply: String,
    },
    /// The command failed; the error was sent to chat.
    Failed {
        /// Which command failed.
        command: BotCommand,
        /// Reply text sent to chat.
        reply: String,
    },
}

/// Routes commands to the stream controller.
pub struct CommandDispatcher {
    controller: Arc<StreamController>,
    settle: Arc<dyn SceneSettle>,
    commands: CommandSettings,
}

impl CommandDispatcher {
    /// Create a dispatcher.
    pub fn new(
        controller: Arc<StreamController>,
        settle: Arc<dyn SceneSettle>,
        commands: CommandSettings,
    ) -> Self {
        Self {
            controller,
            settle,
            commands,
        }
    }

    /// Names of the configured commands, with prefix, for the help banner.
    pub fn command_names(&self) -> [String; 2] {
        [
            format!("!{}", self.commands.start_command),
            format!("!{}", self.commands.stop_command),
        ]
    }

    /// Map a command name onto a [`BotCommand`], ignoring case.
    pub fn resolve(&self, name: &str) -> Option<BotCommand> {
        if name.eq_ignore_ascii_case(&self.commands.start_command) {
            Some(BotCommand::Start)
        } else if name.eq_ignore_ascii_case(&self.commands.stop_command) {
            Some(BotCommand::Stop)
        } else {
            None
        }
    }

    /// Authorize and run `invocation`, replying through the session that is
    /// live in `sessions` once the command has finished.
    pub async fn dispatch(
        &self,
        invocation: &CommandInvocation,
        sessions: &SessionHolder,
    ) -> DispatchOutcome {
        if invocation.role != Role::Broadcaster {
            warn!(
                user = %invocation.username,
                command = %invocation.command_name,
                "ignoring command from non-broadcaster"
            );
            return DispatchOutcome::Unauthorized;
        }
        let Some(command) = self.resolve(&invocation.command_name) else {
            return DispatchOutcome::Unknown;
        };

        info!(user = %invocation.username, ?command, "running command");
        let result = match command {
            BotCommand::Start => self.handle_start().await,
            BotCommand::Stop => self.handle_stop().await,
        };

        let (reply, failed) = match result {
            Ok(text) => (format!("@{} {text}", invocation.username), false),
            Err(e) => {
                warn!(?command, error = %e, "command failed");
                (
                    format!("@{} Error running command: {e}", invocation.username),
                    true,
                )
            }
        };
        reply_through(sessions, &invocation.channel, &reply).await;

        if failed {
            DispatchOutcome::Failed { command, reply }
        } else {
            DispatchOutcome::Completed { command, reply }
        }
    }

    /// Check status, switch to the intro scene, let it settle, go live.
    ///
    /// Aborts before any start request if the scene switch fails.
    pub async fn handle_start(&self) -> Result<String, ObsError> {
        let status = self.controller.get_status().await?;
        if status.active {
            return Ok("The IRL stream is already live!".to_string());
        }

        let scene = &self.commands.intro_scene;
        self.controller.switch_scene(scene).await?;
        self.settle.wait_for_scene(scene).await;

        if self.controller.start_streaming().await? {
            Ok("IRL stream started! 🎥".to_string())
        } else {
            Ok("The IRL stream is already live!".to_string())
        }
    }

    /// Check status, then stop the stream.
    pub async fn handle_stop(&self) -> Result<String, ObsError> {
        let status = self.controller.get_status().await?;
        if !status.active {
            return Ok("The IRL stream is already stopped!".to_string());
        }

        if self.controller.stop_streaming().await? {
            Ok(format!("IRL stream stopped after {}! 👋", status.timecode))
        } else {
            Ok("The IRL stream is already stopped!".to_string())
        }
    }
}

/// Send `text` through the live session. A session that closes under the
/// send has already been replaced, so the reply is retried once on its
/// successor.
async fn reply_through(sessions: &SessionHolder, channel: &str, text: &str) {
    let Some(chat) = sessions.current() else {
        warn!("no chat session to reply through; reply dropped");
        return;
    };
    let result = match chat.say(channel, text).await {
        Err(ChatError::Closed) => match sessions.current() {
            Some(next) if next.id() != chat.id() => {
                debug!(old = %chat.id(), new = %next.id(), "session replaced mid-reply");
                next.say(channel, text).await
            }
            _ => Err(ChatError::Closed),
        },
        other => other,
    };
    if let Err(e) = result {
        warn!(error = %e, "failed to send command reply");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
