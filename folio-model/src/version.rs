use crate::{Document, DocumentStatus};
use chrono::{DateTime, Duration, Utc};
use folio_types::{DocumentId, UserId, VersionId};
use serde::{Deserialize, Serialize};

/// An immutable snapshot of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub collection: String,
    pub parent: DocumentId,
    pub snapshot: Document,
    pub status: DocumentStatus,
    pub autosave: bool,
    pub created_at: DateTime<Utc>,
}

/// Advisory record of an editor working on a document.
///
/// At most one exists per `(collection, document_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLock {
    pub document_id: DocumentId,
    pub collection: String,
    /// `None` when the holder's account no longer resolves.
    pub holder: Option<UserId>,
    pub acquired_at: DateTime<Utc>,
}

impl EditLock {
    pub fn new(
        collection: impl Into<String>,
        document_id: DocumentId,
        holder: Option<UserId>,
        acquired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            document_id,
            collection: collection.into(),
            holder,
            acquired_at,
        }
    }

    /// A lock is expired once strictly more than `duration` has elapsed.
    pub fn is_expired(&self, now: DateTime<Utc>, duration: Duration) -> bool {
        now - self.acquired_at > duration
    }

    pub fn is_held_by(&self, user: Option<&UserId>) -> bool {
        matches!((self.holder.as_ref(), user), (Some(holder), Some(user)) if holder == user)
    }
}
