//! Error types for the storage layer.

use folio_types::TransactionId;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Document not found.
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// A statement referenced a transaction that is not open.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(TransactionId),

    /// Invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A connection mutex was poisoned by a panicking holder.
    #[error("connection lock poisoned")]
    Poisoned,
}

impl From<folio_types::Error> for StorageError {
    fn from(err: folio_types::Error) -> Self {
        Self::InvalidData(err.to_string())
    }
}
