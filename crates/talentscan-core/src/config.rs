//! Client configuration.
//!
//! Settings live in `<config_dir>/talentscan/settings.json`. Every field is
//! optional in the file; missing fields take their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use talentscan_auth::{FileBackend, KeyringBackend, OriginPolicy, SessionStore};

use crate::error::{Error, Result};
use crate::scan::ScanTimings;

/// Environment variable overriding [`ClientConfig::api_url`].
pub const API_URL_ENV: &str = "TALENTSCAN_API_URL";

const APP_DIR: &str = "talentscan";
const SETTINGS_FILE: &str = "settings.json";

/// Where the signed-in session is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackendKind {
    /// JSON file in the data directory.
    #[default]
    File,
    /// System keyring.
    Keyring,
    /// Process memory only; sign-in does not survive a restart.
    Memory,
}

/// Client settings that persist across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API base URL.
    pub api_url: String,
    /// Origins allowed to post sign-in completion messages.
    pub allowed_origins: Vec<String>,
    /// Delay between progress polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Delay before retrying a failed progress poll, in milliseconds.
    pub retry_interval_ms: u64,
    /// How long a finished scan stays on screen, in milliseconds.
    pub display_grace_ms: u64,
    /// Per-request timeout in seconds. Requests wait indefinitely when unset.
    pub request_timeout_secs: Option<u64>,
    /// Session persistence backend.
    pub session_backend: SessionBackendKind,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api".to_string(),
            allowed_origins: vec![
                "http://localhost:8000".to_string(),
                "http://localhost:3000".to_string(),
            ],
            poll_interval_ms: 500,
            retry_interval_ms: 1000,
            display_grace_ms: 5000,
            request_timeout_secs: None,
            session_backend: SessionBackendKind::File,
        }
    }
}

impl ClientConfig {
    /// Default settings file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(SETTINGS_FILE)
    }

    /// Loads settings from the default location and applies the environment override.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but cannot be read or
    /// parsed, or if the resulting settings are invalid.
    pub async fn load() -> Result<Self> {
        Self::load_with_override(&Self::default_path(), std::env::var(API_URL_ENV).ok()).await
    }

    /// Loads settings from `path`, falling back to defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// holds invalid settings.
    pub async fn load_from(path: &Path) -> Result<Self> {
        Self::load_with_override(path, None).await
    }

    /// Loads settings from `path`, replaces `api_url` with `api_url` when it
    /// is set, then validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the settings are invalid after the override.
    pub async fn load_with_override(path: &Path, api_url: Option<String>) -> Result<Self> {
        let mut config = Self::read(path).await?;
        config.apply_api_url_override(api_url);
        config.validate()?;
        Ok(config)
    }

    async fn read(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Writes settings to `path` as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;
        tracing::info!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Replaces `api_url` with `value` if it is set and non-empty.
    pub fn apply_api_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.filter(|v| !v.trim().is_empty()) {
            tracing::debug!("API URL overridden from environment");
            self.api_url = url.trim().to_string();
        }
    }

    /// Checks values that would make the client unusable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_url)
            .map_err(|e| Error::Config(format!("invalid api_url {:?}: {e}", self.api_url)))?;
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".into()));
        }
        if self.retry_interval_ms == 0 {
            return Err(Error::Config("retry_interval_ms must be positive".into()));
        }
        Ok(())
    }

    /// Scan loop timings.
    #[must_use]
    pub const fn timings(&self) -> ScanTimings {
        ScanTimings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            display_grace: Duration::from_millis(self.display_grace_ms),
        }
    }

    /// Per-request timeout, if configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Origin allow-list for sign-in completion messages.
    #[must_use]
    pub fn origin_policy(&self) -> OriginPolicy {
        OriginPolicy::new(self.allowed_origins.iter().cloned())
    }

    /// Builds a session store over the configured backend. Nothing is loaded yet.
    #[must_use]
    pub fn session_store(&self) -> SessionStore {
        match self.session_backend {
            SessionBackendKind::File => SessionStore::new(FileBackend::default_location()),
            SessionBackendKind::Keyring => SessionStore::new(KeyringBackend::default()),
            SessionBackendKind::Memory => SessionStore::in_memory(),
        }
    }
}
