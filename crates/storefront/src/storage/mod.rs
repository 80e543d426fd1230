//! Durable client storage.
//!
//! A flat string key-value space shared by every store, mirroring the
//! browser's `localStorage`: each store writes one JSON document under its
//! own key. There is no locking across processes; the last write wins.
//!
//! # Backends
//!
//! - [`FileStorage`] - one JSON file per key in a directory (survives restarts)
//! - [`MemoryStorage`] - in-process map (tests, throwaway sessions)

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use thiserror::Error;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing medium failed.
    #[error("storage I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The key cannot be stored by this backend.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Synchronous string key-value storage.
///
/// Implementations must be safe to share between every store of one
/// application (`Send + Sync`), and removing an absent key is not an error.
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}
