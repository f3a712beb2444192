//! Edit-lock arbitration.

use crate::error::EngineResult;
use chrono::{DateTime, Utc};
use folio_model::{CollectionSchema, EditLock, LockWhenEditing};
use folio_storage::Storage;
use folio_types::{Clock, DocumentId, TransactionId, UserId};
use std::sync::Arc;
use tracing::debug;

/// Outcome of checking a document's edit lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockDecision {
    /// No lock to care about.
    Proceed,
    /// The requester holds the lock, or it went stale. Clear it once the
    /// write succeeds.
    ProceedAndRelease,
    /// Someone else is actively editing.
    Denied {
        holder: Option<UserId>,
        acquired_at: DateTime<Utc>,
    },
}

impl LockDecision {
    pub fn releases(&self) -> bool {
        matches!(self, Self::ProceedAndRelease)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }
}

/// Decides whether `requester` may write given the current lock record.
///
/// Disabled locking always proceeds. A lock is live while
/// `now - acquired_at <= duration`; anonymous requesters never hold one.
pub fn arbitrate(
    lock: Option<&EditLock>,
    requester: Option<&UserId>,
    policy: &LockWhenEditing,
    now: DateTime<Utc>,
) -> LockDecision {
    let (Some(duration), Some(lock)) = (policy.duration(), lock) else {
        return LockDecision::Proceed;
    };
    if lock.is_held_by(requester) || lock.is_expired(now, duration) {
        return LockDecision::ProceedAndRelease;
    }
    LockDecision::Denied {
        holder: lock.holder.clone(),
        acquired_at: lock.acquired_at,
    }
}

/// Loads lock records and arbitrates them against the engine clock.
pub struct LockArbiter {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl LockArbiter {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    pub async fn check_and_acquire(
        &self,
        tx: Option<TransactionId>,
        schema: &CollectionSchema,
        id: &DocumentId,
        requester: Option<&UserId>,
    ) -> EngineResult<LockDecision> {
        if !schema.lock_when_editing.enabled {
            return Ok(LockDecision::Proceed);
        }
        let lock = self.storage.find_lock(tx, &schema.slug, id).await?;
        let decision = arbitrate(lock.as_ref(), requester, &schema.lock_when_editing, self.clock.now());
        debug!(collection = %schema.slug, %id, ?decision, "lock arbitrated");
        Ok(decision)
    }

    /// Deletes the lock record. Call only after the write succeeded.
    pub async fn release(
        &self,
        tx: Option<TransactionId>,
        collection: &str,
        id: &DocumentId,
    ) -> EngineResult<()> {
        self.storage.delete_lock(tx, collection, id).await?;
        debug!(collection, %id, "lock released");
        Ok(())
    }
}
