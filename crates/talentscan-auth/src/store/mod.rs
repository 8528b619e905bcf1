//! Process-wide session store.
//!
//! Holds at most one [`Session`]. Readers get a cheap snapshot; writers
//! always swap in a whole new value, so a reader never observes a
//! half-written session. Durable storage is reached on the blocking pool,
//! since both the filesystem and the platform keyring block.

mod backend;

pub use backend::{
    FileBackend, KeyringBackend, MemoryBackend, SessionBackend, StorageError, StorageResult,
};

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::session::{Identity, Session};

/// Storage key for the persisted session.
pub const SESSION_KEY: &str = "crm_session";

/// Owns the current session and its persisted copy.
#[derive(Debug)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    current: RwLock<Option<Arc<Session>>>,
}

impl SessionStore {
    /// Creates a store over the given backend. Nothing is loaded until [`load`](Self::load).
    #[must_use]
    pub fn new(backend: impl SessionBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
            current: RwLock::new(None),
        }
    }

    /// Creates a store that never touches durable storage.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Loads the persisted session, replacing the in-memory snapshot.
    ///
    /// A payload that fails to parse is removed from storage and reported as
    /// absent. Storage read failures are logged and also reported as absent.
    pub async fn load(&self) -> Option<Arc<Session>> {
        let loaded = match self.blocking(|backend| backend.read(SESSION_KEY)).await {
            Ok(Some(payload)) => match serde_json::from_str::<Session>(&payload) {
                Ok(session) => {
                    debug!("Loaded session for {}", session.user.email);
                    Some(Arc::new(session))
                }
                Err(e) => {
                    warn!("Discarding malformed persisted session: {e}");
                    if let Err(e) = self.blocking(|backend| backend.remove(SESSION_KEY)).await {
                        warn!("Failed to remove malformed session: {e}");
                    }
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read persisted session: {e}");
                None
            }
        };

        self.replace(loaded.clone());
        loaded
    }

    /// Makes `session` current and persists it, overwriting any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the session could not be persisted. The in-memory
    /// snapshot is updated regardless.
    pub async fn save(&self, session: Session) -> Result<Arc<Session>> {
        let payload = serde_json::to_string(&session)?;
        let session = Arc::new(session);
        self.replace(Some(Arc::clone(&session)));
        self.blocking(move |backend| backend.write(SESSION_KEY, &payload))
            .await?;
        info!("Session saved for {}", session.user.email);
        Ok(session)
    }

    /// Drops the current session and removes the persisted copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted copy could not be removed. The
    /// in-memory snapshot is cleared regardless.
    pub async fn clear(&self) -> Result<()> {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            info!("Session cleared for {}", previous.user.email);
        }
        self.blocking(|backend| backend.remove(SESSION_KEY)).await?;
        Ok(())
    }

    /// Returns the current session snapshot.
    #[must_use]
    pub fn current(&self) -> Option<Arc<Session>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the bearer token, or `None` when signed out or tokenless.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.current().and_then(|session| session.token.clone())
    }

    /// Returns the signed-in identity.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.current().map(|session| session.user.clone())
    }

    /// Returns true if a session is held.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    fn replace(&self, session: Option<Arc<Session>>) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = session;
    }

    async fn blocking<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SessionBackend) -> StorageResult<T> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || op(backend.as_ref())).await?
    }
}
