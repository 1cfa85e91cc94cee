//! Durable key-value storage for the session.
//!
//! The store only ever uses two keys, [`TOKEN_KEY`] and [`USER_KEY`], both
//! holding strings.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::warn;

/// Key for the raw bearer token.
pub const TOKEN_KEY: &str = "auth_token";
/// Key for the JSON-serialized user record.
pub const USER_KEY: &str = "auth_user";

/// Errors from a persistence backend.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("session storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session storage is corrupt: {0}")]
    Format(String),
}

/// A string key-value store that survives restarts.
///
/// Methods are called synchronously from async code while the session lock
/// is held, so implementations must return promptly.
pub trait SessionPersistence: Send + Sync {
    /// Read a key.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Write a key.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Remove a key. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the backing store cannot be written.
    fn delete(&self, key: &str) -> Result<(), PersistenceError>;
}

// =============================================================================
// In-memory
// =============================================================================

/// Process-local persistence (tests, ephemeral sessions).
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryPersistence {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries.
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl SessionPersistence for MemoryPersistence {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

// =============================================================================
// File-backed
// =============================================================================

/// Persistence in a single JSON object file.
///
/// Every write rewrites the whole file through a temp file and a rename, so a
/// crash mid-write leaves the previous contents intact.
///
/// Reads and writes use blocking `std::fs` calls on the caller's thread. The
/// session store calls persistence synchronously, so this backend suits
/// the CLI and other short-lived processes. Long-running async services
/// should use [`MemoryPersistence`] or a non-blocking backend.
#[derive(Debug)]
pub struct FilePersistence {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FilePersistence {
    /// Use the file at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, PersistenceError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| PersistenceError::Format(e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, entries: &HashMap<String, String>) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(|e| PersistenceError::Format(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut HashMap<String, String>) -> bool,
    ) -> Result<(), PersistenceError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut entries = match self.load() {
            Ok(entries) => entries,
            // A corrupt file is replaced rather than blocking every future write.
            Err(PersistenceError::Format(detail)) => {
                warn!(path = %self.path.display(), %detail, "Replacing corrupt session file");
                HashMap::new()
            }
            Err(e) => return Err(e),
        };
        if apply(&mut entries) {
            self.store(&entries)?;
        }
        Ok(())
    }
}

impl SessionPersistence for FilePersistence {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        self.update(|entries| entries.remove(key).is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("storefront-client-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_memory_round_trip() {
        let store = MemoryPersistence::new();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        store.set(TOKEN_KEY, "abc").unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        store.delete(TOKEN_KEY).unwrap();
        store.delete(TOKEN_KEY).unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_persists_across_instances() {
        let path = temp_path("session.json");
        let first = FilePersistence::new(&path);
        first.set(TOKEN_KEY, "abc").unwrap();
        first.set(USER_KEY, r#"{"id":1}"#).unwrap();

        let second = FilePersistence::new(&path);
        assert_eq!(second.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        assert_eq!(second.get(USER_KEY).unwrap().as_deref(), Some(r#"{"id":1}"#));

        second.delete(TOKEN_KEY).unwrap();
        assert_eq!(first.get(TOKEN_KEY).unwrap(), None);
        assert!(!path.with_extension("json.tmp").exists());

        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_file_missing_reads_empty() {
        let store = FilePersistence::new(temp_path("missing.json"));
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        store.delete(TOKEN_KEY).unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_corrupt_reports_format_error_then_recovers() {
        let path = temp_path("corrupt.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{not json").unwrap();

        let store = FilePersistence::new(&path);
        assert!(matches!(store.get(TOKEN_KEY), Err(PersistenceError::Format(_))));

        store.set(TOKEN_KEY, "fresh").unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("fresh"));

        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_file_read_error_blocks_write() {
        // a directory where the file should be cannot be read as JSON
        let path = temp_path("session.json");
        fs::create_dir_all(&path).unwrap();

        let store = FilePersistence::new(&path);
        assert!(matches!(store.set(TOKEN_KEY, "abc"), Err(PersistenceError::Io(_))));
        assert!(!path.with_extension("json.tmp").exists());
        assert!(path.is_dir());

        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
