//! Client configuration.
//!
//! Resolution order: TOML file, then `STOCKROOM_*` environment variables,
//! then command-line flags (applied by the binary).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use stockroom_session::{
    FileTokenStore, MemoryTokenStore, SessionOptions, TokenStore, default_stockroom_home,
};

/// File name of the config file inside the stockroom home directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Server root URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for every HTTP request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Delay between a session-expired notice and the redirect, in milliseconds.
    #[serde(default = "default_redirect_delay")]
    pub redirect_delay_ms: u64,

    /// Interval of the `watch` status poller, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// How long notifications stay visible, in seconds.
    #[serde(default = "default_notification_secs")]
    pub notification_secs: u64,

    /// UTC offset used when displaying timestamps.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,

    /// Where the access token is cached. Defaults to `~/.stockroom/session.json`.
    #[serde(default)]
    pub token_file: Option<PathBuf>,

    /// Keep the access token in memory only.
    #[serde(default)]
    pub ephemeral: bool,

    /// Login name used when no token is cached.
    #[serde(default)]
    pub username: Option<String>,

    /// Password used when no token is cached.
    #[serde(default)]
    pub password: Option<SecretString>,
}

fn default_base_url() -> String {
    "http://localhost:8100".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_redirect_delay() -> u64 {
    2000
}

fn default_poll_interval() -> u64 {
    300 // 5 minutes
}

fn default_notification_secs() -> u64 {
    5
}

fn default_utc_offset() -> i32 {
    9 // Asia/Seoul
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            redirect_delay_ms: default_redirect_delay(),
            poll_interval_secs: default_poll_interval(),
            notification_secs: default_notification_secs(),
            utc_offset_hours: default_utc_offset(),
            token_file: None,
            ephemeral: false,
            username: None,
            password: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load `~/.stockroom/config.toml` if it exists, defaults otherwise.
    pub fn load_default() -> Result<Self> {
        match default_stockroom_home().map(|home| home.join(CONFIG_FILE_NAME)) {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Apply `STOCKROOM_*` environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("STOCKROOM_BASE_URL") {
            self.base_url = url;
        }

        if let Some(username) = lookup("STOCKROOM_USERNAME") {
            self.username = Some(username);
        }

        if let Some(password) = lookup("STOCKROOM_PASSWORD") {
            self.password = Some(SecretString::from(password));
        }

        if let Some(interval) = lookup("STOCKROOM_POLL_INTERVAL_SECS") {
            self.poll_interval_secs = interval
                .parse()
                .with_context(|| format!("Invalid STOCKROOM_POLL_INTERVAL_SECS: {interval}"))?;
        }

        if let Some(path) = lookup("STOCKROOM_TOKEN_FILE") {
            self.token_file = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Options for the session manager.
    pub fn session_options(&self) -> Result<SessionOptions> {
        Ok(SessionOptions::parse(&self.base_url)
            .with_context(|| format!("Invalid base URL: {}", self.base_url))?
            .request_timeout(Duration::from_secs(self.request_timeout_secs))
            .redirect_delay(self.redirect_delay()))
    }

    /// Backend for the cached access token.
    pub fn token_store(&self) -> Arc<dyn TokenStore> {
        if self.ephemeral {
            return Arc::new(MemoryTokenStore::new());
        }

        let store = match &self.token_file {
            Some(path) => Some(FileTokenStore::new(path)),
            None => FileTokenStore::default_location(),
        };
        match store {
            Some(store) => Arc::new(store),
            None => {
                tracing::warn!("No home directory found, caching token in memory only");
                Arc::new(MemoryTokenStore::new())
            }
        }
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_secs(self.notification_secs)
    }

    /// Offset used to display timestamps; falls back to UTC if out of range.
    pub fn display_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    /// Username and password, when both are configured.
    pub fn credentials(&self) -> Option<(&str, &SecretString)> {
        Some((self.username.as_deref()?, self.password.as_ref()?))
    }
}
