//! Error types for local storage collaborators.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the cache, the pending write queue and the query cache.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The storage engine failed to read or write.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Encoding or decoding of persisted state failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// The entity has no ID and cannot be keyed.
    #[error("entity in collection {collection} has no ID")]
    MissingId {
        /// Collection the entity was written to.
        collection: String,
    },

    /// An entity with this ID is already cached.
    #[error("duplicate entity {id} in collection {collection}")]
    DuplicateId {
        /// Collection name.
        collection: String,
        /// The conflicting ID.
        id: String,
    },

    /// Entity not found.
    #[error("entity {id} not found in collection {collection}")]
    EntityNotFound {
        /// Collection searched.
        collection: String,
        /// The missing ID.
        id: String,
    },

    /// Another process holds the store lock.
    #[error("store locked: another process has exclusive access to {path}")]
    Locked {
        /// Path of the lock file.
        path: String,
    },
}

impl CoreError {
    /// Creates a storage error from any message.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
