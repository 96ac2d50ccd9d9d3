//! Credential file I/O.
//!
//! Holds exactly one [`TokenSet`]. Saves replace the whole file through a
//! temporary sibling and a rename, so a reader never observes a half-written
//! record. The file is created with permissions 0o600.

use std::path::{Path, PathBuf};

use crate::errors::AuthError;
use crate::types::TokenSet;

/// Durable holder of the current token set. No network access.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted token set.
    ///
    /// Returns `Ok(None)` if nothing has been saved yet.
    pub fn load(&self) -> Result<Option<TokenSet>, AuthError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let tokens = serde_json::from_str(&data)?;
        Ok(Some(tokens))
    }

    /// Persist `tokens`, replacing whatever was stored before.
    pub fn save(&self, tokens: &TokenSet) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(tokens)?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&tmp, perms);
        }

        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = ?self.path, "persisted token set");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_tokens(access: &str) -> TokenSet {
        TokenSet {
            access_token: access.to_string(),
            refresh_token: "ref".to_string(),
            expires_at: Some(999_999),
        }
    }

    #[test]
    fn load_missing_file_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("tokens.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn load_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json").unwrap();
        let store = CredentialStore::new(&path);
        assert!(matches!(store.load(), Err(AuthError::Json(_))));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("tokens.json"));
        store.save(&make_tokens("tok")).unwrap();
        assert_eq!(store.load().unwrap(), Some(make_tokens("tok")));
    }

    #[test]
    fn save_replaces_previous_record() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("tokens.json"));
        store.save(&make_tokens("first")).unwrap();
        store.save(&make_tokens("second")).unwrap();
        assert_eq!(store.load().unwrap().unwrap().access_token, "second");
        assert!(!dir.path().join("tokens.json.tmp").exists());
    }

    #[test]
    fn loads_hand_written_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(
            &path,
            r#"{"access_token":"a","refresh_token":"r","expires_at":1700000000000}"#,
        )
        .unwrap();
        let tokens = CredentialStore::new(&path).load().unwrap().unwrap();
        assert_eq!(tokens.expires_at, Some(1_700_000_000_000));
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tokens.json");
        CredentialStore::new(&path).save(&make_tokens("t")).unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn save_sets_permissions_0600() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        CredentialStore::new(&path).save(&make_tokens("t")).unwrap();
        let perms = std::fs::metadata(&path).unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }
}
