//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// One or more required keys are absent or empty.
    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    /// A settings value was present but unusable.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
    /// The `.env` file exists but could not be read or parsed.
    #[error("failed to load env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_lists_every_key() {
        let err = SettingsError::Missing(vec!["TWITCH_CLIENT_ID", "OBS_PASSWORD"]);
        assert_eq!(
            err.to_string(),
            "missing required settings: TWITCH_CLIENT_ID, OBS_PASSWORD"
        );
    }

    #[test]
    fn invalid_value_display() {
        let err = SettingsError::InvalidValue("OBS_PORT out of range".to_string());
        assert_eq!(err.to_string(), "invalid settings value: OBS_PORT out of range");
    }
}
