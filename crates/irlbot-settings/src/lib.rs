//! # irlbot-settings
//!
//! Configuration for the IRL stream bot.
//!
//! Settings are resolved in priority order:
//! 1. **Compiled defaults**: [`BotSettings::default()`]
//! 2. **`.env` file**: merged into the process environment if present
//! 3. **Environment variables**: `TWITCH_*`, `OBS_*`, command names and
//!    `IRLBOT_*` tuning knobs
//!
//! Required secrets are validated per subcommand with
//! [`BotSettings::require_for_bot`] and [`BotSettings::require_for_auth`].

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_env_file, load_settings, settings_from_lookup};
pub use types::*;
