//! Error types for the mutation engine.

use chrono::{DateTime, Utc};
use folio_blobstore::BlobStoreError;
use folio_crypto::CryptoError;
use folio_storage::StorageError;
use folio_types::UserId;
use serde::Serialize;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dot-separated path of the field (`title`, `hero.image`).
    pub path: String,
    pub message: String,
}

/// Rejected input, carrying every failing field path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error, Serialize)]
#[error("validation failed: {}", self.summary())]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// A validation error for a single field.
    pub fn field(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new().with_field(path, message)
    }

    #[must_use]
    pub fn with_field(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.push(path, message);
        self
    }

    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.fields.push(FieldError {
            path: path.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.path.as_str()).collect()
    }

    fn summary(&self) -> String {
        if self.fields.is_empty() {
            return "no field details".to_string();
        }
        self.fields
            .iter()
            .map(|f| format!("{}: {}", f.path, f.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Errors surfaced by [`crate::MutationEngine::update_by_id`].
///
/// Every variant aborts the operation and rolls back its transaction.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("missing document identifier")]
    MissingIdentifier,

    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("not allowed to update {collection}/{id}")]
    Forbidden { collection: String, id: String },

    #[error("{collection}/{id} is being edited by {}", holder.as_ref().map_or("an unknown user", UserId::as_str))]
    Locked {
        collection: String,
        id: String,
        holder: Option<UserId>,
        acquired_at: DateTime<Utc>,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("attachment error: {0}")]
    Attachment(#[from] BlobStoreError),

    #[error("credential error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("hook failed in {stage}: {message}")]
    Hook { stage: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// A hook failure that is not about field values.
    pub fn hook(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Errors the caller can act on, as opposed to infrastructure failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingIdentifier
                | Self::UnknownCollection(_)
                | Self::NotFound { .. }
                | Self::Forbidden { .. }
                | Self::Locked { .. }
                | Self::Validation(_)
        )
    }
}
