//! Handlescope Content Store - content-addressable evidence persistence.
//!
//! Blobs (screenshots, zip archives) are stored under a path derived from the
//! SHA-256 of their content: the first hex character names the top shard
//! directory, the second the sub-shard, and the remainder the file. For
//! example, content hashing to
//! `e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855` lives at
//! `<data>/e/3/b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855`.
//!
//! Identical content therefore always maps to the identical path, and a write
//! to an existing path is skipped. Hash collisions are treated as impossible,
//! not defended against.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
mod zip_builder;

pub use error::{Result, StoreError};
pub use zip_builder::ZipEntry;

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Handle to a persisted blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Hex-encoded SHA-256 of the content
    pub hash: String,
    /// Path relative to the data directory, derived from the hash
    pub relpath: PathBuf,
    /// Whether this call performed the filesystem write.
    ///
    /// `false` means content with the same hash was already present and the
    /// write was skipped.
    pub newly_written: bool,
}

/// Content-addressable store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct ContentStore {
    data_dir: PathBuf,
}

impl ContentStore {
    /// Create a store rooted at `data_dir`, creating the root if absent.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|source| StoreError::Io {
            path: data_dir.display().to_string(),
            source,
        })?;
        Ok(Self { data_dir })
    }

    /// The store's root directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Persist a blob, keyed by the SHA-256 of its content.
    ///
    /// Shard directories are created idempotently; concurrent creation by
    /// another worker is not an error. If the final path already exists the
    /// write is skipped and the existing content is assumed identical.
    pub fn put(&self, content: &[u8]) -> Result<StoredBlob> {
        let hash = hex::encode(Sha256::digest(content));
        let relpath = Self::relpath_for(&hash);
        let path = self.data_dir.join(&relpath);

        let shard_dir = path.parent().ok_or_else(|| StoreError::Io {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no shard directory"),
        })?;
        fs::create_dir_all(shard_dir).map_err(|source| StoreError::Io {
            path: shard_dir.display().to_string(),
            source,
        })?;

        // Idempotent write: identical content already has identical bytes on
        // disk, so an existing path is left untouched. The check-then-write
        // race between workers is harmless for the same reason.
        let newly_written = if path.exists() {
            false
        } else {
            fs::write(&path, content).map_err(|source| StoreError::Io {
                path: path.display().to_string(),
                source,
            })?;
            tracing::debug!(hash = %hash, bytes = content.len(), "stored blob");
            true
        };

        Ok(StoredBlob {
            hash,
            relpath,
            newly_written,
        })
    }

    /// Assemble a deflate-compressed zip of the given entries and persist it
    /// through the same content-addressed path logic as [`ContentStore::put`].
    ///
    /// Entries referencing stored blobs are read back from this store.
    pub fn put_zip(&self, entries: &[ZipEntry]) -> Result<StoredBlob> {
        let bytes = zip_builder::build(self, entries)?;
        self.put(&bytes)
    }

    /// Read a blob back by its relative path.
    pub fn read(&self, relpath: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = self.data_dir.join(relpath.as_ref());
        fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::MissingBlob(relpath.as_ref().display().to_string())
            } else {
                StoreError::Io {
                    path: path.display().to_string(),
                    source,
                }
            }
        })
    }

    /// Derive the sharded relative path for a hex hash.
    #[must_use]
    pub fn relpath_for(hash: &str) -> PathBuf {
        PathBuf::from(&hash[..1])
            .join(&hash[1..2])
            .join(&hash[2..])
    }
}
