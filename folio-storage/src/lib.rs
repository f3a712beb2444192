//! Storage layer for Folio.
//!
//! Defines the [`Storage`] seam the mutation engine persists through and a
//! SQLite implementation of it.
//!
//! # Architecture
//!
//! - Documents are stored as JSON bodies keyed by `(collection, id)`
//! - Versions are append-only rows ordered by insertion
//! - Edit locks live in their own table, one row per `(collection, id)`
//! - Multi-statement transactions are serialized through an async gate so
//!   one request's transaction never interleaves with another's statements

mod error;
mod sqlite;
mod store;

pub use error::{StorageError, StorageResult};
pub use sqlite::SqliteStorage;
pub use store::Storage;
