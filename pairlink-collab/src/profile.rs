//! Persisted local profile (the display name shown to other peers).
//!
//! Stored as a flat JSON object of string keys at a fixed path:
//! ```text
//! {"userName":"Ada"}
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CollabError;

/// Key under which the display name is stored.
pub const DISPLAY_NAME_KEY: &str = "userName";

/// Display name used when none has been saved.
pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous";

/// File-backed key/value profile store.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved display name, falling back to [`DEFAULT_DISPLAY_NAME`].
    pub fn load_display_name(&self) -> String {
        match self.load() {
            Ok(entries) => entries
                .get(DISPLAY_NAME_KEY)
                .filter(|name| !name.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            Err(e) => {
                log::warn!("Profile at {} unreadable: {e}", self.path.display());
                DEFAULT_DISPLAY_NAME.to_string()
            }
        }
    }

    /// Persist the display name, called when creating or joining a room.
    pub fn save_display_name(&self, name: &str) -> Result<(), CollabError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CollabError::Profile("display name is empty".to_string()));
        }
        // Keep unrelated keys; start over if the file is corrupt.
        let mut entries = self.load().unwrap_or_default();
        entries.insert(DISPLAY_NAME_KEY.to_string(), name.to_string());
        self.store(&entries)
    }

    fn load(&self) -> Result<BTreeMap<String, String>, CollabError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), CollabError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}
