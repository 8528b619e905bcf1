//! Durable storage for the serialized session.
//!
//! Backends store one opaque string per key:
//! - [`FileBackend`]: a JSON file per key in the data directory
//! - [`KeyringBackend`]: the platform credential store (Secret Service,
//!   Keychain, Credential Manager)
//! - [`MemoryBackend`]: process memory, for tests and ephemeral runs

use std::collections::HashMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use keyring::Entry;
use tracing::{debug, warn};

/// Service name used for keyring entries and the data directory.
pub(crate) const SERVICE_NAME: &str = "talentscan";

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Failed to access the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The blocking storage task panicked or was cancelled.
    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A key/value store for serialized session payloads.
pub trait SessionBackend: Send + Sync + fmt::Debug {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    fn read(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be written.
    fn write(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes the value under `key`. Missing entries are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be modified.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Creates a backend rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Backend rooted at the platform data directory (`<data_dir>/talentscan`).
    #[must_use]
    pub fn default_location() -> Self {
        let dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(SERVICE_NAME);
        Self::new(dir)
    }

    /// Directory holding the session files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SessionBackend for FileBackend {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        // Write to a sibling file first so readers never see a half-written payload
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        // A leftover from an interrupted write may carry wider permissions
        match std::fs::remove_file(&tmp) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        let mut file = owner_only().open(&tmp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp, &path)?;
        debug!("Stored {key} in {:?}", self.dir);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("Failed to remove {key}: {e}");
                Err(e.into())
            }
        }
    }
}

/// Open options for a session file: the token inside is a bearer credential,
/// so only the owner may read it.
fn owner_only() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

/// Stores each key in the system keyring.
#[derive(Debug, Clone)]
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    /// Creates a keyring backend using the given service name.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> StorageResult<Entry> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl SessionBackend for KeyringBackend {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => {
                debug!("No {key} entry in keyring");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entry(key)?.set_password(value)?;
        debug!("Stored {key} in keyring");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => {
                debug!("Deleted {key} from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                warn!("Failed to delete {key} from keyring: {e}");
                Err(e.into())
            }
        }
    }
}

/// Keeps entries in memory only.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Creates an empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a memory backend pre-populated with one entry.
    #[must_use]
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let backend = Self::new();
        backend
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
        backend
    }
}

impl SessionBackend for MemoryBackend {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("nested"));

        assert_eq!(backend.read("crm_session").unwrap(), None);
        backend.write("crm_session", "{}").unwrap();
        assert_eq!(backend.read("crm_session").unwrap().as_deref(), Some("{}"));
        assert!(dir.path().join("nested/crm_session.json").exists());

        backend.remove("crm_session").unwrap();
        assert_eq!(backend.read("crm_session").unwrap(), None);
        // Removing twice is fine
        backend.remove("crm_session").unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_backend_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path());
        // Stale temp file from an interrupted write, world-readable
        let tmp = dir.path().join("crm_session.json.tmp");
        std::fs::write(&tmp, "old").unwrap();
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644)).unwrap();

        backend.write("crm_session", "{}").unwrap();
        let mode = std::fs::metadata(dir.path().join("crm_session.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!tmp.exists());
    }

    #[test]
    fn test_memory_backend() {
        let backend = MemoryBackend::with_entry("k", "v");
        assert_eq!(backend.read("k").unwrap().as_deref(), Some("v"));
        backend.write("k", "w").unwrap();
        assert_eq!(backend.read("k").unwrap().as_deref(), Some("w"));
        backend.remove("k").unwrap();
        assert_eq!(backend.read("k").unwrap(), None);
    }

    #[test]
    #[ignore = "Interacts with system keyring"]
    fn test_keyring_backend_round_trip() {
        let backend = KeyringBackend::new("talentscan-test");
        backend.write("crm_session", "{\"x\":1}").unwrap();
        assert_eq!(
            backend.read("crm_session").unwrap().as_deref(),
            Some("{\"x\":1}")
        );
        backend.remove("crm_session").unwrap();
        assert_eq!(backend.read("crm_session").unwrap(), None);
    }
}
