//! The storage seam used by the mutation engine.

use crate::error::StorageResult;
use async_trait::async_trait;
use folio_model::{Document, DocumentPatch, EditLock, Query, Version};
use folio_types::{DocumentId, TransactionId};

/// Persistence for documents, versions and edit locks.
///
/// Every data method takes the request's transaction, if any. Backends
/// without multi-statement transactions return `Ok(None)` from
/// [`Storage::begin_transaction`] and receive `None` afterwards.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Opens a transaction. `None` means the backend cannot provide one.
    async fn begin_transaction(&self) -> StorageResult<Option<TransactionId>>;

    async fn commit_transaction(&self, tx: TransactionId) -> StorageResult<()>;

    async fn rollback_transaction(&self, tx: TransactionId) -> StorageResult<()>;

    /// Finds the live document matching `query` (id plus optional filter).
    async fn find_one(
        &self,
        tx: Option<TransactionId>,
        collection: &str,
        query: &Query,
    ) -> StorageResult<Option<Document>>;

    /// Applies `patch` to the live document and returns the stored result.
    async fn update_one(
        &self,
        tx: Option<TransactionId>,
        collection: &str,
        id: &DocumentId,
        patch: &DocumentPatch,
    ) -> StorageResult<Document>;

    /// Returns the most recently written version of a document.
    async fn latest_version(
        &self,
        tx: Option<TransactionId>,
        collection: &str,
        id: &DocumentId,
    ) -> StorageResult<Option<Version>>;

    /// Appends a version row. Versions are never updated afterwards.
    async fn insert_version(&self, tx: Option<TransactionId>, version: &Version) -> StorageResult<()>;

    async fn find_lock(
        &self,
        tx: Option<TransactionId>,
        collection: &str,
        id: &DocumentId,
    ) -> StorageResult<Option<EditLock>>;

    async fn delete_lock(
        &self,
        tx: Option<TransactionId>,
        collection: &str,
        id: &DocumentId,
    ) -> StorageResult<()>;
}
