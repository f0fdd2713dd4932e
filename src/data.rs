//! Small single-slot plugin data file, e.g. the favorite task list.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Error;

const DEFAULT_DATA_PATH: &str = "data.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite_list_id: Option<String>,
}

/// JSON-file store with the same soft-load semantics as the token store.
#[derive(Debug, Clone)]
pub struct DataStore {
    path: PathBuf,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATA_PATH),
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

    pub fn load(&self) -> PluginData {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return PluginData::default(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "data file unreadable, using defaults");
                return PluginData::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|err| {
            tracing::warn!(path = %self.path.display(), error = %err, "data file malformed, using defaults");
            PluginData::default()
        })
    }

    pub fn save(&self, data: &PluginData) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(Error::Storage)?;
            }
        }
        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, content).map_err(Error::Storage)
    }

    pub fn favorite_list_id(&self) -> Option<String> {
        self.load().favorite_list_id.filter(|id| !id.is_empty())
    }

    pub fn set_favorite_list_id(&self, list_id: impl Into<String>) -> Result<(), Error> {
        let mut data = self.load();
        data.favorite_list_id = Some(list_id.into());
        self.save(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn favorite_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::with_path(dir.path().join("data.json"));

        assert!(store.favorite_list_id().is_none());
        store.set_favorite_list_id("list-42").unwrap();
        assert_eq!(store.favorite_list_id().as_deref(), Some("list-42"));
    }

    #[test]
    fn on_disk_format_uses_camel_case() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::with_path(dir.path().join("data.json"));
        store.set_favorite_list_id("list-42").unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("favoriteListId"));
    }

    #[test]
    fn empty_favorite_counts_as_unset() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::with_path(dir.path().join("data.json"));
        store.set_favorite_list_id("").unwrap();
        assert!(store.favorite_list_id().is_none());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let store = DataStore::with_path(dir.path().join("data.json"));
        std::fs::write(store.path(), "]]").unwrap();
        assert!(store.favorite_list_id().is_none());
    }
}
