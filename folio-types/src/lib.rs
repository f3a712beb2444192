//! Core type definitions for Folio.
//!
//! This crate defines the small, storage-agnostic types shared by every
//! other Folio crate:
//! - Document, user, version and transaction identifiers
//! - A [`Clock`] abstraction so lock expiry and version timestamps can be
//!   driven deterministically in tests
//!
//! Document shapes, schemas and versions live in `folio-model`.

mod clock;
mod ids;

pub use clock::{Clock, FixedClock, SystemClock};
pub use ids::{DocumentId, TransactionId, UserId, VersionId};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),
}
