//! Document model for Folio.
//!
//! Defines the types the mutation engine and its collaborators agree on:
//! - [`Document`] — a stored row: caller-supplied id, opaque JSON fields,
//!   draft/published status and per-locale overlays
//! - [`DocumentPatch`] — the field changes an update writes
//! - [`Version`] — an immutable snapshot of a document
//! - [`EditLock`] — the advisory record of an active editor
//! - [`FileData`] — attachment metadata stored in an upload field
//! - [`Where`] / [`Query`] — the document lookup, including access filters
//! - [`CollectionSchema`] — per-collection configuration (fields, versions,
//!   auth, locking, uploads)

mod document;
mod file;
mod query;
mod schema;
mod version;

pub use document::{
    Document, DocumentPatch, DocumentStatus, CREATED_AT_KEY, ID_KEY, STATUS_KEY, UPDATED_AT_KEY,
};
pub use file::{FileData, SizeData};
pub use query::{Query, Where};
pub use schema::{
    AuthConfig, CollectionSchema, DraftsConfig, FieldSchema, FieldType, ImageSize,
    LockWhenEditing, UploadConfig, VersionsConfig, DEFAULT_LOCK_DURATION_SECS,
};
pub use version::{EditLock, Version};
