//! Client-held session state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};

use crate::storage::{MemoryTokenStore, TokenStore};
use crate::utils::safe_format_token;

/// Cached copy of the access token, mirrored into a [`TokenStore`].
///
/// Every write bumps [`SessionState::generation`]. Concurrent writers resolve
/// as last write wins.
pub struct SessionState {
    token: RwLock<Option<SecretString>>,
    generation: AtomicU64,
    store: Arc<dyn TokenStore>,
}

impl SessionState {
    /// Create state backed by `store`, seeded with whatever it holds.
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let initial = match store.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load cached access token");
                None
            }
        };
        tracing::debug!(has_token = initial.is_some(), "Session state initialized");

        Self {
            token: RwLock::new(initial),
            generation: AtomicU64::new(0),
            store,
        }
    }

    /// State that lives only in memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }

    /// The cached access token.
    pub fn current_token(&self) -> Option<SecretString> {
        self.token.read().clone()
    }

    pub fn has_token(&self) -> bool {
        self.token.read().is_some()
    }

    /// Replace the cached access token.
    pub fn set_token(&self, value: impl Into<String>) {
        let token = SecretString::from(value.into());
        tracing::debug!(
            token = %safe_format_token(token.expose_secret()),
            "Caching access token"
        );

        {
            let mut guard = self.token.write();
            *guard = Some(token.clone());
            self.generation.fetch_add(1, Ordering::SeqCst);
        }

        if let Err(e) = self.store.save(&token) {
            tracing::warn!(error = %e, "Failed to persist access token");
        }
    }

    /// Drop the cached access token.
    pub fn clear(&self) {
        {
            let mut guard = self.token.write();
            *guard = None;
            self.generation.fetch_add(1, Ordering::SeqCst);
        }

        if let Err(e) = self.store.remove() {
            tracing::warn!(error = %e, "Failed to remove persisted access token");
        }
        tracing::debug!("Cleared cached access token");
    }

    /// Number of writes so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("has_token", &self.has_token())
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileTokenStore;

    #[test]
    fn test_set_and_clear() {
        let state = SessionState::in_memory();
        assert!(state.current_token().is_none());
        assert_eq!(state.generation(), 0);

        state.set_token("first");
        assert_eq!(state.current_token().unwrap().expose_secret(), "first");

        state.set_token("second");
        assert_eq!(state.current_token().unwrap().expose_secret(), "second");
        assert_eq!(state.generation(), 2);

        state.clear();
        assert!(!state.has_token());
        assert_eq!(state.generation(), 3);
    }

    #[test]
    fn test_seeded_from_store() {
        let store = Arc::new(MemoryTokenStore::new());
        store.save(&SecretString::from("cached")).unwrap();

        let state = SessionState::new(store);
        assert_eq!(state.current_token().unwrap().expose_secret(), "cached");
    }

    #[test]
    fn test_writes_reach_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTokenStore::in_dir(dir.path()));
        let state = SessionState::new(store.clone());

        state.set_token("on-disk");
        assert_eq!(store.load().unwrap().unwrap().expose_secret(), "on-disk");

        state.clear();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let state = SessionState::in_memory();
        state.set_token("super-secret-value");
        let rendered = format!("{state:?}");
        assert!(!rendered.contains("super-secret-value"));
    }
}
