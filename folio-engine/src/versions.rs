//! Draft/publish branching and version snapshots.

use crate::error::EngineResult;
use folio_model::{CollectionSchema, Document, DocumentStatus, Query, Version};
use folio_storage::Storage;
use folio_types::{Clock, TransactionId, VersionId};
use std::sync::Arc;
use tracing::debug;

/// Where an update is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Versioning is off: update the live record only.
    LiveOnly,
    /// Update the live record and snapshot it.
    LiveAndVersion,
    /// Draft edit: leave the live record alone, snapshot only.
    VersionOnly,
}

impl WriteMode {
    pub fn writes_live(&self) -> bool {
        !matches!(self, Self::VersionOnly)
    }

    pub fn writes_version(&self) -> bool {
        !matches!(self, Self::LiveOnly)
    }
}

/// Picks the write mode for an update.
///
/// A draft request whose incoming status is not `published` only writes a
/// version when the collection has drafts; a published status always
/// reaches the live record.
pub fn decide_write_mode(
    schema: &CollectionSchema,
    draft_requested: bool,
    incoming_status: Option<DocumentStatus>,
) -> WriteMode {
    if !schema.versions_enabled() {
        return WriteMode::LiveOnly;
    }
    if schema.drafts_enabled() && draft_requested && incoming_status != Some(DocumentStatus::Published) {
        WriteMode::VersionOnly
    } else {
        WriteMode::LiveAndVersion
    }
}

/// True when field validation is skipped: draft-only writes on a
/// collection whose drafts opt out of validation.
pub fn skip_validation(schema: &CollectionSchema, mode: WriteMode) -> bool {
    mode == WriteMode::VersionOnly && schema.drafts().is_some_and(|d| !d.validate)
}

pub struct VersionManager {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl VersionManager {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Writes a snapshot for `mode`. Returns `None` for [`WriteMode::LiveOnly`].
    pub async fn persist_version(
        &self,
        tx: Option<TransactionId>,
        collection: &str,
        snapshot: &Document,
        mode: WriteMode,
        autosave: bool,
    ) -> EngineResult<Option<Version>> {
        let status = match mode {
            WriteMode::LiveOnly => return Ok(None),
            WriteMode::VersionOnly => DocumentStatus::Draft,
            WriteMode::LiveAndVersion => snapshot.status.unwrap_or(DocumentStatus::Published),
        };
        let mut snapshot = snapshot.clone();
        snapshot.status = Some(status);
        let version = Version {
            id: VersionId::new(),
            collection: collection.to_string(),
            parent: snapshot.id.clone(),
            snapshot,
            status,
            autosave,
            created_at: self.clock.now(),
        };
        self.storage.insert_version(tx, &version).await?;
        debug!(collection, id = %version.parent, version = %version.id, status = status.as_str(), "version saved");
        Ok(Some(version))
    }

    /// The document an editor works from: the newest version's snapshot
    /// when drafts are enabled and it is not older than the live row, else
    /// the live row. The query's filter is applied to the live row only.
    pub async fn latest_document(
        &self,
        tx: Option<TransactionId>,
        schema: &CollectionSchema,
        query: &Query,
    ) -> EngineResult<Option<Document>> {
        let Some(live) = self.storage.find_one(tx, &schema.slug, query).await? else {
            return Ok(None);
        };
        if !schema.drafts_enabled() {
            return Ok(Some(live));
        }
        let latest = self.storage.latest_version(tx, &schema.slug, &query.id).await?;
        Ok(Some(match latest {
            Some(version) if version.snapshot.updated_at >= live.updated_at => version.snapshot,
            _ => live,
        }))
    }
}
