//! Persistence for the cached access token.
//!
//! The cached token plays the role of a browser local-storage entry: one key
//! (`access_token`) holding the token string. Two backends are provided:
//! - [`MemoryTokenStore`] for short-lived processes and tests
//! - [`FileTokenStore`] for a JSON file under the stockroom home directory

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};

use crate::constants::TOKEN_STORAGE_KEY;
use crate::error::{Result, SessionError};
use crate::utils::set_file_permissions;

/// File name of the token file inside the stockroom home directory.
const TOKEN_FILE_NAME: &str = "session.json";

/// Backend holding the cached access token between requests.
pub trait TokenStore: Send + Sync {
    /// Load the cached token, if any.
    fn load(&self) -> Result<Option<SecretString>>;

    /// Replace the cached token.
    fn save(&self, token: &SecretString) -> Result<()>;

    /// Remove the cached token. Returns whether anything was removed.
    fn remove(&self) -> Result<bool>;
}

/// In-memory token store.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<SecretString>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<SecretString>> {
        Ok(self.token.lock().clone())
    }

    fn save(&self, token: &SecretString) -> Result<()> {
        *self.token.lock() = Some(token.clone());
        Ok(())
    }

    fn remove(&self) -> Result<bool> {
        Ok(self.token.lock().take().is_some())
    }
}

/// Token store backed by a JSON file with owner-only permissions.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store the token at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store the token in `<stockroom_home>/session.json`.
    pub fn in_dir(stockroom_home: &Path) -> Self {
        Self::new(stockroom_home.join(TOKEN_FILE_NAME))
    }

    /// Store the token in `~/.stockroom/session.json`.
    pub fn default_location() -> Option<Self> {
        Some(Self::in_dir(&default_stockroom_home()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            SessionError::Storage(format!("failed to read {}: {e}", self.path.display()))
        })?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, content).map_err(|e| {
            SessionError::Storage(format!("failed to write {}: {e}", self.path.display()))
        })?;
        set_file_permissions(&self.path)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<SecretString>> {
        let entries = self.read_entries()?;
        Ok(entries
            .get(TOKEN_STORAGE_KEY)
            .filter(|token| !token.is_empty())
            .map(|token| SecretString::from(token.clone())))
    }

    fn save(&self, token: &SecretString) -> Result<()> {
        let mut entries = self.read_entries()?;
        entries.insert(
            TOKEN_STORAGE_KEY.to_string(),
            token.expose_secret().to_string(),
        );
        self.write_entries(&entries)?;
        tracing::debug!(path = %self.path.display(), "Saved access token to file store");
        Ok(())
    }

    fn remove(&self) -> Result<bool> {
        let mut entries = self.read_entries()?;
        if entries.remove(TOKEN_STORAGE_KEY).is_none() {
            return Ok(false);
        }
        self.write_entries(&entries)?;
        tracing::debug!(path = %self.path.display(), "Removed access token from file store");
        Ok(true)
    }
}

/// `~/.stockroom`, the directory holding the token file and config.
pub fn default_stockroom_home() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".stockroom"))
}
