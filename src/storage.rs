//! Token persistence.
//!
//! DESIGN
//! ======
//! Persistence is a plain key-value interface (`KeyValueStore`) so the
//! session core never touches a concrete backend. `MemoryStore` backs tests
//! and throwaway sessions; `FileStore` keeps a small JSON object on disk so a
//! token pair survives restarts the way browser local storage survives page
//! reloads.
//!
//! `TokenStore` layers the fixed access/refresh keys on top. It does no
//! expiry tracking: an expired access token is only discovered when an
//! authorized call comes back 401.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("storage read failed: {0}")]
    Read(String),
    #[error("storage write failed: {0}")]
    Write(String),
    #[error("storage contents are not valid JSON: {0}")]
    Corrupt(String),
}

// =============================================================================
// KEY-VALUE INTERFACE
// =============================================================================

/// Minimal persistent string map.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory store. Contents live as long as the value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// JSON-file store. The whole object is rewritten on every mutation through
/// a temp file and a rename, so readers see the old or the new object and
/// never a partial one. A missing file reads as empty. A corrupt file makes
/// `get` fail but is overwritten by the next `set` or `remove`, so clearing
/// or replacing tokens always recovers it.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    fn read_all(&self) -> Result<HashMap<String, String>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(StorageError::Read(e.to_string())),
        };
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    /// Current entries for a mutation, plus whether the file was corrupt and
    /// has to be rewritten. Unreadable JSON is dropped.
    fn read_for_update(&self) -> Result<(HashMap<String, String>, bool), StorageError> {
        match self.read_all() {
            Ok(entries) => Ok((entries, false)),
            Err(StorageError::Corrupt(reason)) => {
                tracing::warn!(path = %self.path.display(), %reason, "discarding corrupt token file");
                Ok((HashMap::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::Write(e.to_string()))?;
            }
        }
        let raw = serde_json::to_string_pretty(entries).map_err(|e| StorageError::Write(e.to_string()))?;

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp, raw).map_err(|e| StorageError::Write(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StorageError::Write(e.to_string()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut entries, _) = self.read_for_update()?;
        entries.insert(key.to_owned(), value.to_owned());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut entries, corrupt) = self.read_for_update()?;
        if entries.remove(key).is_some() || corrupt {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

// =============================================================================
// TOKEN STORE
// =============================================================================

/// An access token together with the refresh token that can replace it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
    }
}

/// Persisted access/refresh pair under fixed keys.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Token store backed by a fresh `MemoryStore`.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Persist both halves of `pair`.
    ///
    /// # Errors
    ///
    /// Returns an error if either key cannot be written.
    pub fn save(&self, pair: &TokenPair) -> Result<(), StorageError> {
        self.backend.set(ACCESS_TOKEN_KEY, &pair.access_token)?;
        self.backend.set(REFRESH_TOKEN_KEY, &pair.refresh_token)
    }

    /// The persisted pair, or `None` unless both halves are present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn load(&self) -> Result<Option<TokenPair>, StorageError> {
        let access = self.backend.get(ACCESS_TOKEN_KEY)?;
        let refresh = self.backend.get(REFRESH_TOKEN_KEY)?;
        Ok(access.zip(refresh).map(|(a, r)| TokenPair::new(a, r)))
    }

    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn access_token(&self) -> Result<Option<String>, StorageError> {
        self.backend.get(ACCESS_TOKEN_KEY)
    }

    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        self.backend.get(REFRESH_TOKEN_KEY)
    }

    /// Remove both tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn clear(&self) -> Result<(), StorageError> {
        let access = self.backend.remove(ACCESS_TOKEN_KEY);
        let refresh = self.backend.remove(REFRESH_TOKEN_KEY);
        access.and(refresh)
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
