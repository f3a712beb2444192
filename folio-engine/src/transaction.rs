//! Transaction envelope for one mutation.
//!
//! Only the outermost caller owns the transaction. A request that already
//! carries one (an update issued from inside a hook) shares it, and backends
//! without transactions get a no-op scope.

use crate::context::RequestContext;
use crate::error::EngineResult;
use folio_storage::Storage;
use folio_types::TransactionId;
use std::sync::Arc;
use tracing::{debug, error};

/// What [`TransactionCoordinator::begin`] opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionScope {
    /// This call opened the transaction and must finish it.
    Owned(TransactionId),
    /// The request already had a transaction; commit and rollback are no-ops.
    Shared,
    /// The backend has no multi-statement transactions.
    Unsupported,
}

impl TransactionScope {
    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}

pub struct TransactionCoordinator {
    storage: Arc<dyn Storage>,
}

impl TransactionCoordinator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn begin(&self, req: &mut RequestContext) -> EngineResult<TransactionScope> {
        if req.transaction.is_some() {
            return Ok(TransactionScope::Shared);
        }
        match self.storage.begin_transaction().await? {
            Some(id) => {
                req.transaction = Some(id);
                debug!(%id, "transaction opened");
                Ok(TransactionScope::Owned(id))
            }
            None => Ok(TransactionScope::Unsupported),
        }
    }

    /// Commits an owned transaction. A failed commit is rolled back and
    /// reported as a storage error.
    pub async fn commit(&self, scope: TransactionScope, req: &mut RequestContext) -> EngineResult<()> {
        let TransactionScope::Owned(id) = scope else {
            return Ok(());
        };
        req.transaction = None;
        if let Err(e) = self.storage.commit_transaction(id).await {
            error!(%id, error = %e, "commit failed, rolling back");
            self.rollback_quietly(id).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Rolls back an owned transaction. Never fails: storage errors are
    /// logged so the error that caused the rollback is the one reported.
    pub async fn rollback(&self, scope: TransactionScope, req: &mut RequestContext) {
        if let TransactionScope::Owned(id) = scope {
            req.transaction = None;
            self.rollback_quietly(id).await;
        }
    }

    async fn rollback_quietly(&self, id: TransactionId) {
        if let Err(e) = self.storage.rollback_transaction(id).await {
            error!(%id, error = %e, "rollback failed");
        }
    }
}
