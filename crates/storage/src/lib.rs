//! Hospital Map Storage Library
//!
//! Persists user preferences across sessions through a small key-value
//! abstraction: [`MemoryStore`] for tests and embedding, [`FileStore`] for
//! the platform data directory.

pub mod kv;
pub mod preferences;

pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use preferences::{PreferenceStore, Preferences, PREFERENCES_KEY, PREFERENCES_MAX_AGE, PREFERENCES_VERSION};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
