//! Settings type definitions.
//!
//! Every type implements [`Default`] with production default values. Required
//! secrets default to empty strings and are checked by the `require_*`
//! validators rather than at parse time, so that each subcommand can demand
//! only what it actually uses.

use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{Result, SettingsError};

/// Root settings for the bot process.
#[derive(Clone, Debug, Default)]
pub struct BotSettings {
    /// Identity provider and chat connection settings.
    pub twitch: TwitchSettings,
    /// Production tool (OBS WebSocket) connection settings.
    pub obs: ObsSettings,
    /// Chat command names and the scene used when going live.
    pub commands: CommandSettings,
    /// Token renewal timing.
    pub renewal: RenewalSettings,
    /// Process-level settings (logging, shutdown, auth server).
    pub process: ProcessSettings,
}

/// Identity provider and chat settings.
#[derive(Clone, Debug)]
pub struct TwitchSettings {
    /// OAuth client id (`TWITCH_CLIENT_ID`).
    pub client_id: String,
    /// OAuth client secret (`TWITCH_CLIENT_SECRET`).
    pub client_secret: String,
    /// Channel to join; also used as the bot login (`TWITCH_CHANNEL`).
    pub channel: String,
    /// Redirect URI registered for the authorization-code flow.
    pub redirect_uri: String,
    /// Base URL of the identity provider.
    pub identity_url: String,
    /// WebSocket URL of the chat server.
    pub chat_url: String,
    /// File holding the persisted token set.
    pub token_file: PathBuf,
}

impl Default for TwitchSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            channel: String::new(),
            redirect_uri: "http://localhost:3000/callback".to_string(),
            identity_url: "https://id.twitch.tv".to_string(),
            chat_url: "wss://irc-ws.chat.twitch.tv:443".to_string(),
            token_file: PathBuf::from("./tokens.json"),
        }
    }
}

/// OBS WebSocket connection settings.
#[derive(Clone, Debug)]
pub struct ObsSettings {
    /// Host running OBS.
    pub host: String,
    /// OBS WebSocket port.
    pub port: u16,
    /// OBS WebSocket password (`OBS_PASSWORD`).
    pub password: String,
}

impl Default for ObsSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4455,
            password: String::new(),
        }
    }
}

impl ObsSettings {
    /// WebSocket URL for this host and port.
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

/// Chat command configuration.
#[derive(Clone, Debug)]
pub struct CommandSettings {
    /// Scene switched to before the stream starts.
    pub intro_scene: String,
    /// Command name (without prefix) that starts the stream.
    pub start_command: String,
    /// Command name (without prefix) that stops the stream.
    pub stop_command: String,
    /// Delay between switching to the intro scene and starting the stream.
    pub scene_settle_ms: u64,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            intro_scene: "Intro".to_string(),
            start_command: "startirl".to_string(),
            stop_command: "stopirl".to_string(),
            scene_settle_ms: 1000,
        }
    }
}

impl CommandSettings {
    /// Settle delay as a [`Duration`].
    pub fn scene_settle(&self) -> Duration {
        Duration::from_millis(self.scene_settle_ms)
    }
}

/// Token renewal timing.
#[derive(Clone, Debug)]
pub struct RenewalSettings {
    /// Seconds between proactive expiry checks.
    pub check_interval_secs: u64,
    /// Renew when the token expires within this many seconds.
    pub lookahead_secs: u64,
}

impl Default for RenewalSettings {
    fn default() -> Self {
        Self {
            check_interval_secs: 30 * 60,
            lookahead_secs: 2 * 60 * 60,
        }
    }
}

impl RenewalSettings {
    /// Check interval as a [`Duration`].
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Lookahead as a [`Duration`].
    pub fn lookahead(&self) -> Duration {
        Duration::from_secs(self.lookahead_secs)
    }
}

/// Process-level settings.
#[derive(Clone, Debug)]
pub struct ProcessSettings {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Upper bound on graceful shutdown.
    pub shutdown_timeout_secs: u64,
    /// Port for the one-time authorization server.
    pub auth_port: u16,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            shutdown_timeout_secs: 10,
            auth_port: 3000,
        }
    }
}

impl ProcessSettings {
    /// Shutdown timeout as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl BotSettings {
    /// Ensure every key needed to run the bot is present.
    pub fn require_for_bot(&self) -> Result<()> {
        let mut missing = self.missing_oauth_client();
        if self.twitch.channel.is_empty() {
            missing.push("TWITCH_CHANNEL");
        }
        if self.obs.password.is_empty() {
            missing.push("OBS_PASSWORD");
        }
        into_result(missing)
    }

    /// Ensure every key needed by the authorization flow is present.
    pub fn require_for_auth(&self) -> Result<()> {
        into_result(self.missing_oauth_client())
    }

    fn missing_oauth_client(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.twitch.client_id.is_empty() {
            missing.push("TWITCH_CLIENT_ID");
        }
        if self.twitch.client_secret.is_empty() {
            missing.push("TWITCH_CLIENT_SECRET");
        }
        missing
    }
}

fn into_result(missing: Vec<&'static str>) -> Result<()> {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SettingsError::Missing(missing))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> BotSettings {
        let mut s = BotSettings::default();
        s.twitch.client_id = "cid".into();
        s.twitch.client_secret = "secret".into();
        s.twitch.channel = "streamer".into();
        s.obs.password = "pw".into();
        s
    }

    #[test]
    fn defaults_match_documented_values() {
        let s = BotSettings::default();
        assert_eq!(s.obs.host, "localhost");
        assert_eq!(s.obs.port, 4455);
        assert_eq!(s.commands.intro_scene, "Intro");
        assert_eq!(s.commands.start_command, "startirl");
        assert_eq!(s.commands.stop_command, "stopirl");
        assert_eq!(s.commands.scene_settle(), Duration::from_secs(1));
        assert_eq!(s.renewal.check_interval(), Duration::from_secs(1800));
        assert_eq!(s.renewal.lookahead(), Duration::from_secs(7200));
        assert_eq!(s.twitch.token_file, PathBuf::from("./tokens.json"));
    }

    #[test]
    fn obs_url_format() {
        let s = ObsSettings {
            host: "10.0.0.5".into(),
            port: 4460,
            password: String::new(),
        };
        assert_eq!(s.url(), "ws://10.0.0.5:4460");
    }

    #[test]
    fn complete_settings_pass_bot_validation() {
        assert!(complete().require_for_bot().is_ok());
    }

    #[test]
    fn empty_settings_report_all_missing_keys() {
        let err = BotSettings::default().require_for_bot().unwrap_err();
        match err {
            SettingsError::Missing(keys) => assert_eq!(
                keys,
                vec![
                    "TWITCH_CLIENT_ID",
                    "TWITCH_CLIENT_SECRET",
                    "TWITCH_CHANNEL",
                    "OBS_PASSWORD"
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn auth_validation_ignores_channel_and_obs() {
        let mut s = BotSettings::default();
        s.twitch.client_id = "cid".into();
        s.twitch.client_secret = "secret".into();
        assert!(s.require_for_auth().is_ok());
        assert!(s.require_for_bot().is_err());
    }
}
