//! # Local Storage
//!
//! Key-value persistence for tokens, the cart, favorites and preferences.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Persisted Keys                                     │
//! │                                                                         │
//! │  aura.accessToken      "eyJhbGciOi..."        (JSON string)            │
//! │  aura.refreshToken     "eyJhbGciOi..."        (JSON string)            │
//! │  aura.cart             [ {id, name, ...} ]    (cart snapshot)          │
//! │  aura.favorites        [ "p1", "p7" ]         (sorted ids)             │
//! │  aura.theme            "dark"                                          │
//! │  aura.onboardingSeen   true                                            │
//! │  aura.pendingOrder     {items, delivery, paymentReference, ...}        │
//! │                        (paid but not yet placed; absent otherwise)     │
//! │                                                                         │
//! │  FileStore:   <data_dir>/<key>.json, one file per key                   │
//! │  MemoryStore: HashMap, for tests and ephemeral sessions                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

/// Storage keys.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "aura.accessToken";
    pub const REFRESH_TOKEN: &str = "aura.refreshToken";
    pub const CART: &str = "aura.cart";
    pub const FAVORITES: &str = "aura.favorites";
    pub const THEME: &str = "aura.theme";
    pub const ONBOARDING_SEEN: &str = "aura.onboardingSeen";
    pub const PENDING_ORDER: &str = "aura.pendingOrder";
}

/// A string key-value store, synchronous like browser local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> ClientResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> ClientResult<()>;
    fn remove(&self, key: &str) -> ClientResult<()>;
}

// =============================================================================
// File Store
// =============================================================================

/// One JSON file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> ClientResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            ClientError::Storage(format!("cannot create {}: {}", dir.display(), e))
        })?;
        debug!(dir = %dir.display(), "Opened file store");
        Ok(FileStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> ClientResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid || key.starts_with('.') {
            return Err(ClientError::Storage(format!("invalid storage key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> ClientResult<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ClientError::Storage(format!("read {}: {}", path.display(), e))),
        }
    }

    /// Writes to a temp file first so a crash never leaves half a snapshot.
    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4()));
        std::fs::write(&tmp, value)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|e| {
                let _ = std::fs::remove_file(&tmp);
                ClientError::Storage(format!("write {}: {}", path.display(), e))
            })
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::Storage(format!("remove {}: {}", path.display(), e))),
        }
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory store. Counts writes so callers can assert persistence happened.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` and `remove` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.values().remove(key);
        Ok(())
    }
}

// =============================================================================
// Persister
// =============================================================================

/// JSON layer over a [`KeyValueStore`].
///
/// Writes are fire-and-forget: failures are logged and never reach the
/// caller, so a full disk cannot break an add-to-cart.
#[derive(Clone)]
pub struct Persister {
    store: Arc<dyn KeyValueStore>,
}

impl Persister {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Persister { store }
    }

    /// Serializes and writes `value` under `key`.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize value for storage");
                return;
            }
        };
        if let Err(e) = self.store.set(key, &json) {
            warn!(key, error = %e, "Failed to persist value");
        }
    }

    /// Removes `key`, logging failures.
    pub fn forget(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!(key, error = %e, "Failed to remove persisted value");
        }
    }

    /// Reads `key`. Missing, unreadable and corrupt values all yield `None`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read persisted value");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Ignoring corrupt persisted value");
                None
            }
        }
    }
}

impl std::fmt::Debug for Persister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persister").finish_non_exhaustive()
    }
}
