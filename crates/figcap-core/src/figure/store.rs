//! Blob storage for accepted crops and image key generation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StoreError;

/// Opaque key to bytes store.
pub trait BlobStore {
    /// Store `bytes` under `key`.
    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Produces unique image keys.
pub trait KeyGenerator {
    /// Next unused key.
    fn next_key(&mut self) -> String;
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: BTreeMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes stored under `key`.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.blobs.get(key).map(Vec::as_slice)
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.blobs.keys().map(String::as_str)
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Remove and return the blob stored under `key`.
    pub fn take(&mut self, key: &str) -> Option<Vec<u8>> {
        self.blobs.remove(key)
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Writes each blob to `<dir>/<key>.png`.
#[derive(Debug, Clone)]
pub struct DirBlobStore {
    dir: PathBuf,
}

impl DirBlobStore {
    /// Use `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.png", key))
    }
}

impl BlobStore for DirBlobStore {
    fn put(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(StoreError::Rejected {
                key: key.to_string(),
                reason: "key must be a plain file name".to_string(),
            });
        }

        let path = self.path_for(key);
        fs::write(&path, bytes).map_err(|source| StoreError::Io {
            key: key.to_string(),
            source,
        })?;

        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(())
    }
}

/// Deterministic `<prefix>_<n>` keys.
#[derive(Debug, Clone)]
pub struct SequentialKeys {
    prefix: String,
    next: u64,
}

impl SequentialKeys {
    /// Start counting from 1.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl KeyGenerator for SequentialKeys {
    fn next_key(&mut self) -> String {
        let key = format!("{}_{}", self.prefix, self.next);
        self.next += 1;
        key
    }
}

/// `<prefix>_<unix millis>_<random suffix>` keys.
#[cfg(feature = "native")]
#[derive(Debug, Clone)]
pub struct TimestampKeys {
    prefix: String,
}

#[cfg(feature = "native")]
impl TimestampKeys {
    /// Create a generator with the given prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[cfg(feature = "native")]
impl KeyGenerator for TimestampKeys {
    fn next_key(&mut self) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}_{}_{}", self.prefix, millis, &suffix[..8])
    }
}
