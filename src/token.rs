use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::Error;

const DEFAULT_TOKEN_PATH: &str = "token.json";

/// Leeway applied when deciding whether a token still counts as valid.
const EXPIRY_LEEWAY_SECS: u64 = 60;

/// The persisted credential bundle. One record, one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Unix timestamp (seconds) after which the access token is stale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl CredentialRecord {
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<u64>,
        scope: Option<String>,
    ) -> Self {
        let expires_at = expires_in.map(|seconds| unix_now() + seconds);
        Self {
            access_token,
            refresh_token,
            token_type: default_token_type(),
            scope,
            expires_at,
        }
    }

    /// Whether the access token is expired, with a 60 second buffer.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => unix_now() + EXPIRY_LEEWAY_SECS >= expires_at,
            None => false,
        }
    }

    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Single-slot credential storage backed by a JSON file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore {
    /// Store at the fixed relative path `token.json`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_TOKEN_PATH),
        }
    }

    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted record. A missing file, an empty file, or malformed
    /// content all degrade to `None`; the interactive flow takes over.
    pub fn load(&self) -> Option<CredentialRecord> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "token file unreadable, treating as absent");
                return None;
            }
        };

        if content.trim().is_empty() {
            return None;
        }

        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "token file malformed, treating as absent");
                None
            }
        }
    }

    /// Overwrite the persisted record. Last write wins.
    pub fn save(&self, record: &CredentialRecord) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(Error::Storage)?;
            }
        }

        let content = serde_json::to_string_pretty(record)?;
        std::fs::write(&self.path, &content).map_err(Error::Storage)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, perms).map_err(Error::Storage)?;
        }

        tracing::debug!(path = %self.path.display(), "credential record persisted");
        Ok(())
    }

    /// Remove the persisted record. Succeeds when none exists.
    pub fn clear(&self) -> Result<(), Error> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::Storage(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> TokenStore {
        TokenStore::with_path(dir.path().join("token.json"))
    }

    fn record() -> CredentialRecord {
        CredentialRecord::new(
            "access123".to_string(),
            Some("refresh456".to_string()),
            Some(3600),
            Some("https://www.googleapis.com/auth/tasks".to_string()),
        )
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let saved = record();
        store.save(&saved).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn load_missing_file_is_absent() {
        let dir = TempDir::new().unwrap();
        assert!(store_in(&dir).load().is_none());
    }

    #[test]
    fn load_empty_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "  \n").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn load_malformed_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save(&record()).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn fresh_record_is_not_expired() {
        assert!(!record().is_expired());
    }

    #[test]
    fn stale_record_is_expired() {
        let mut stale = record();
        stale.expires_at = Some(unix_now() - 100);
        assert!(stale.is_expired());
    }

    #[test]
    fn record_within_leeway_is_expired() {
        let mut nearly = record();
        nearly.expires_at = Some(unix_now() + 30);
        assert!(nearly.is_expired());
    }

    #[test]
    fn authorization_header_uses_token_type() {
        assert_eq!(record().authorization_header(), "Bearer access123");
    }
}
