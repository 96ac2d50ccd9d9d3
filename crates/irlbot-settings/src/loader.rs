//! Settings loading from an optional `.env` file and the process environment.
//!
//! Loading flow:
//! 1. Start with compiled [`BotSettings::default()`]
//! 2. If a `.env` file exists in the working directory, merge it into the
//!    process environment (existing variables win)
//! 3. Apply environment variable overrides
//!
//! Overrides go through a lookup function so that the parsing rules can be
//! exercised without touching the real environment.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::Result;
use crate::types::BotSettings;

/// Load settings from `.env` (if present) and the process environment.
pub fn load_settings() -> Result<BotSettings> {
    load_env_file(None)?;
    Ok(settings_from_lookup(|key| std::env::var(key).ok()))
}

/// Load a specific env file into the process environment, or the default
/// `.env` when `path` is `None`. A missing file is not an error.
pub fn load_env_file(path: Option<&Path>) -> Result<()> {
    let loaded = match path {
        Some(p) => dotenvy::from_path(p).map(|()| p.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match loaded {
        Ok(p) => {
            debug!(path = ?p, "loaded env file");
            Ok(())
        }
        Err(e) if e.not_found() => {
            debug!("no env file found, using process environment only");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Build settings from defaults plus whatever `lookup` returns for each key.
pub fn settings_from_lookup<F>(lookup: F) -> BotSettings
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };
    let mut settings = BotSettings::default();

    // ── Identity provider / chat ────────────────────────────────────
    if let Some(v) = env.string("TWITCH_CLIENT_ID") {
        settings.twitch.client_id = v;
    }
    if let Some(v) = env.string("TWITCH_CLIENT_SECRET") {
        settings.twitch.client_secret = v;
    }
    if let Some(v) = env.string("TWITCH_CHANNEL") {
        settings.twitch.channel = v.trim_start_matches('#').to_lowercase();
    }
    if let Some(v) = env.string("TWITCH_REDIRECT_URI") {
        settings.twitch.redirect_uri = v;
    }
    if let Some(v) = env.string("TWITCH_ID_URL") {
        settings.twitch.identity_url = v.trim_end_matches('/').to_string();
    }
    if let Some(v) = env.string("TWITCH_CHAT_URL") {
        settings.twitch.chat_url = v;
    }
    if let Some(v) = env.string("IRLBOT_TOKEN_FILE") {
        settings.twitch.token_file = PathBuf::from(v);
    }

    // ── OBS ─────────────────────────────────────────────────────────
    if let Some(v) = env.string("OBS_HOST") {
        settings.obs.host = v;
    }
    if let Some(v) = env.u16("OBS_PORT", 1, 65535) {
        settings.obs.port = v;
    }
    if let Some(v) = env.string("OBS_PASSWORD") {
        settings.obs.password = v;
    }

    // ── Commands ────────────────────────────────────────────────────
    if let Some(v) = env.string("INTRO_SCENE_NAME") {
        settings.commands.intro_scene = v;
    }
    if let Some(v) = env.string("START_COMMAND") {
        settings.commands.start_command = v;
    }
    if let Some(v) = env.string("STOP_COMMAND") {
        settings.commands.stop_command = v;
    }
    if let Some(v) = env.u64("IRLBOT_SCENE_SETTLE_MS", 0, 60_000) {
        settings.commands.scene_settle_ms = v;
    }

    // ── Renewal ─────────────────────────────────────────────────────
    if let Some(v) = env.u64("IRLBOT_TOKEN_CHECK_INTERVAL_SECS", 10, 86_400) {
        settings.renewal.check_interval_secs = v;
    }
    if let Some(v) = env.u64("IRLBOT_TOKEN_LOOKAHEAD_SECS", 0, 604_800) {
        settings.renewal.lookahead_secs = v;
    }

    // ── Process ─────────────────────────────────────────────────────
    if let Some(v) = env.string("IRLBOT_LOG") {
        settings.process.log_level = v;
    }
    if let Some(v) = env.u64("IRLBOT_SHUTDOWN_TIMEOUT_SECS", 1, 300) {
        settings.process.shutdown_timeout_secs = v;
    }
    if let Some(v) = env.u16("IRLBOT_AUTH_PORT", 1, 65535) {
        settings.process.auth_port = v;
    }

    settings
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env readers ─────────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = self.string(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
