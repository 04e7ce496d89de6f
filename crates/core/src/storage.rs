//! Key-value persistence for JSON documents.
//!
//! Backends report failures through [`StorageError`]; the JSON helpers on top
//! of them never do. A failed read is "no data", a failed write is dropped
//! with a warning.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::warn;

/// Key holding the `{config, state, statistics}` progress document.
pub const GAME_STORAGE_KEY: &str = "terrorscape.progress";

/// Failure reported by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying filesystem failure.
    #[error("storage i/o failed for '{key}': {source}")]
    Io {
        /// Key being accessed.
        key: String,
        /// Original error.
        #[source]
        source: io::Error,
    },
    /// Document larger than the configured quota.
    #[error("document '{key}' is {size} bytes, over the {limit} byte quota")]
    QuotaExceeded {
        /// Key being written.
        key: String,
        /// Size of the rejected document.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
    /// Value could not be encoded as JSON.
    #[error("failed to encode '{key}': {source}")]
    Serialize {
        /// Key being written.
        key: String,
        /// Original error.
        #[source]
        source: serde_json::Error,
    },
}

/// Raw string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value for `key`, `None` when absent.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Replace the value for `key`.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Delete `key`; deleting a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    /// All keys currently stored.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Read and decode a JSON value, treating any failure as absence.
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.read(key) {
        Ok(Some(raw)) if !raw.is_empty() => raw,
        Ok(_) => return None,
        Err(err) => {
            warn!(key = %key, "Storage read failed: {err}");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key = %key, "Discarding unreadable stored value: {err}");
            None
        }
    }
}

/// Encode and write a JSON value. Failures are logged and dropped.
pub fn write_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) {
    let result = serde_json::to_string(value)
        .map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })
        .and_then(|serialized| store.write(key, &serialized));
    if let Err(err) = result {
        warn!(key = %key, "Storage write dropped: {err}");
    }
}

/// Remove a key. Failures are logged and dropped.
pub fn remove_item(store: &dyn KeyValueStore, key: &str) {
    if let Err(err) = store.remove(key) {
        warn!(key = %key, "Storage remove dropped: {err}");
    }
}

/// Size of a stored value in UTF-16 bytes, 0 when absent or unreadable.
pub fn storage_size(store: &dyn KeyValueStore, key: &str) -> usize {
    match store.read(key) {
        Ok(Some(raw)) => utf16_bytes(&raw),
        _ => 0,
    }
}

/// Per-key and total storage usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageUsage {
    /// Sum over all keys.
    pub total: usize,
    /// Size per key.
    pub items: HashMap<String, usize>,
}

/// Measure every stored key. Returns an empty report when keys cannot be listed.
pub fn storage_usage(store: &dyn KeyValueStore) -> StorageUsage {
    let keys = match store.keys() {
        Ok(keys) => keys,
        Err(err) => {
            warn!("Unable to list storage keys: {err}");
            return StorageUsage::default();
        }
    };

    let mut usage = StorageUsage::default();
    for key in keys {
        let size = storage_size(store, &key);
        usage.total += size;
        usage.items.insert(key, size);
    }
    usage
}

fn utf16_bytes(value: &str) -> usize {
    value.encode_utf16().count() * 2
}

fn check_quota(key: &str, value: &str, quota: Option<usize>) -> Result<(), StorageError> {
    match quota {
        Some(limit) if value.len() > limit => Err(StorageError::QuotaExceeded {
            key: key.to_string(),
            size: value.len(),
            limit,
        }),
        _ => Ok(()),
    }
}

/// Directory-backed store with one `<key>.json` file per key.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    quota: Option<usize>,
}

impl FileStorage {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            quota: None,
        }
    }

    /// Reject documents larger than `limit` bytes.
    pub fn with_quota(mut self, limit: Option<usize>) -> Self {
        self.quota = limit;
        self
    }

    /// Directory holding the documents.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_key(key)))
    }

    fn io_error(key: &str, source: io::Error) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl KeyValueStore for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Self::io_error(key, err)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_quota(key, value, self.quota)?;
        fs::create_dir_all(&self.root).map_err(|err| Self::io_error(key, err))?;

        let mut file = NamedTempFile::new_in(&self.root).map_err(|err| Self::io_error(key, err))?;
        file.write_all(value.as_bytes())
            .map_err(|err| Self::io_error(key, err))?;
        file.persist(self.path_for(key))
            .map_err(|err| Self::io_error(key, err.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Self::io_error(key, err)),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root).map_err(|err| Self::io_error("*", err))?;
        let mut keys = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| Self::io_error("*", err))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-memory store, cheap to clone; clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject documents larger than `limit` bytes.
    pub fn with_quota(mut self, limit: usize) -> Self {
        self.quota = Some(limit);
        self
    }
}

impl KeyValueStore for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_quota(key, value, self.quota)?;
        self.inner.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.inner.read().keys().cloned().collect())
    }
}

fn sanitize_key(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            result.push(ch);
        }
    }
    if result.is_empty() {
        "item".to_string()
    } else {
        result
    }
}
