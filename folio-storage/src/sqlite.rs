//! SQLite-backed [`Storage`].

use crate::error::{StorageError, StorageResult};
use crate::store::Storage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_model::{Document, DocumentPatch, DocumentStatus, EditLock, Query, Version};
use folio_types::{Clock, DocumentId, SystemClock, TransactionId, UserId, VersionId};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

struct ActiveTransaction {
    id: TransactionId,
    _permit: OwnedMutexGuard<()>,
}

/// Document store backed by a single SQLite connection.
///
/// Statements run one at a time on the connection. A transaction holds the
/// store's gate from `BEGIN` until `COMMIT`/`ROLLBACK`; statements outside
/// that transaction wait on the gate.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    gate: Arc<tokio::sync::Mutex<()>>,
    active: Mutex<Option<ActiveTransaction>>,
    transactions: bool,
    clock: Arc<dyn Clock>,
}

impl SqliteStorage {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &std::path::Path) -> StorageResult<Self> {
        Self::open_with_conn(Connection::open(path)?)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::open_with_conn(Connection::open_in_memory()?)
    }

    /// Wraps an existing connection and ensures the schema exists.
    pub fn open_with_conn(conn: Connection) -> StorageResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            gate: Arc::new(tokio::sync::Mutex::new(())),
            active: Mutex::new(None),
            transactions: true,
            clock: Arc::new(SystemClock),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Uses `clock` for `updated_at` stamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Disables multi-statement transactions: `begin_transaction` returns
    /// `None` and every statement autocommits.
    #[must_use]
    pub fn without_transactions(mut self) -> Self {
        self.transactions = false;
        self
    }

    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE TABLE IF NOT EXISTS versions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                collection TEXT NOT NULL,
                parent TEXT NOT NULL,
                snapshot TEXT NOT NULL,
                status TEXT NOT NULL,
                autosave INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_versions_parent
                ON versions (collection, parent, seq);

            CREATE TABLE IF NOT EXISTS locked_documents (
                collection TEXT NOT NULL,
                document_id TEXT NOT NULL,
                holder TEXT,
                acquired_at TEXT NOT NULL,
                PRIMARY KEY (collection, document_id)
            );
            ",
        )?;
        Ok(())
    }

    fn lock_conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    fn is_active(&self, tx: TransactionId) -> StorageResult<bool> {
        let active = self.active.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(active.as_ref().is_some_and(|a| a.id == tx))
    }

    /// Runs `f` on the connection, inside `tx` when given, otherwise after
    /// waiting for any open transaction to finish.
    async fn run<T, F>(&self, tx: Option<TransactionId>, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T> + Send,
        T: Send,
    {
        match tx {
            Some(id) => {
                if !self.is_active(id)? {
                    return Err(StorageError::UnknownTransaction(id));
                }
                let conn = self.lock_conn()?;
                f(&conn)
            }
            None => {
                let _permit = self.gate.lock().await;
                let conn = self.lock_conn()?;
                f(&conn)
            }
        }
    }

    // ── Fixtures and inspection ──────────────────────────────────

    /// Inserts or replaces a document row. Document creation is not part of
    /// the mutation pipeline; this exists for seeding.
    pub async fn insert_document(&self, collection: &str, doc: &Document) -> StorageResult<()> {
        let body = serde_json::to_string(doc)?;
        let key = doc.id.storage_key();
        let updated_at = doc.updated_at.to_rfc3339();
        self.run(None, move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO documents (collection, id, body, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![collection, key, body, updated_at],
            )?;
            Ok(())
        })
        .await
    }

    /// Reads the live row directly, bypassing filters.
    pub async fn get_document(&self, collection: &str, id: &DocumentId) -> StorageResult<Option<Document>> {
        let key = id.storage_key();
        self.run(None, move |conn| read_document(conn, collection, &key))
            .await
    }

    /// Records an editor's lock (normally written by the editing session,
    /// outside the update pipeline).
    pub async fn save_lock(&self, lock: &EditLock) -> StorageResult<()> {
        let collection = lock.collection.clone();
        let key = lock.document_id.storage_key();
        let holder = lock.holder.as_ref().map(|h| h.as_str().to_string());
        let acquired_at = lock.acquired_at.to_rfc3339();
        self.run(None, move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO locked_documents (collection, document_id, holder, acquired_at) VALUES (?1, ?2, ?3, ?4)",
                params![collection, key, holder, acquired_at],
            )?;
            Ok(())
        })
        .await
    }

    /// All versions of a document, oldest first.
    pub async fn versions(&self, collection: &str, id: &DocumentId) -> StorageResult<Vec<Version>> {
        let key = id.storage_key();
        self.run(None, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, collection, parent, snapshot, status, autosave, created_at
                 FROM versions WHERE collection = ?1 AND parent = ?2 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![collection, key], VersionRow::from_row)?;
            let mut versions = Vec::new();
            for row in rows {
                versions.push(row?.into_version()?);
            }
            Ok(versions)
        })
        .await
    }
}

fn read_document(conn: &Connection, collection: &str, key: &str) -> StorageResult<Option<Document>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, key],
            |row| row.get(0),
        )
        .optional()?;
    body.map(|b| serde_json::from_str::<Document>(&b).map_err(StorageError::from))
        .transpose()
}

fn parse_time(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidData(format!("invalid timestamp {raw:?}: {e}")))
}

struct VersionRow {
    id: String,
    collection: String,
    parent: String,
    snapshot: String,
    status: String,
    autosave: bool,
    created_at: String,
}

impl VersionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            collection: row.get(1)?,
            parent: row.get(2)?,
            snapshot: row.get(3)?,
            status: row.get(4)?,
            autosave: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_version(self) -> StorageResult<Version> {
        Ok(Version {
            id: VersionId::parse(&self.id)
                .map_err(|e| StorageError::InvalidData(format!("invalid version id: {e}")))?,
            collection: self.collection,
            parent: DocumentId::from_storage_key(&self.parent)?,
            snapshot: serde_json::from_str(&self.snapshot)?,
            status: DocumentStatus::parse(&self.status)
                .ok_or_else(|| StorageError::InvalidData(format!("invalid status: {}", self.status)))?,
            autosave: self.autosave,
            created_at: parse_time(&self.created_at)?,
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn begin_transaction(&self) -> StorageResult<Option<TransactionId>> {
        if !self.transactions {
            return Ok(None);
        }
        let permit = self.gate.clone().lock_owned().await;
        let id = TransactionId::new();
        self.lock_conn()?.execute_batch("BEGIN IMMEDIATE")?;
        let mut active = self.active.lock().map_err(|_| StorageError::Poisoned)?;
        *active = Some(ActiveTransaction {
            id,
            _permit: permit,
        });
        debug!(%id, "transaction started");
        Ok(Some(id))
    }

    async fn commit_transaction(&self, tx: TransactionId) -> StorageResult<()> {
        if !self.is_active(tx)? {
            return Err(StorageError::UnknownTransaction(tx));
        }
        self.lock_conn()?.execute_batch("COMMIT")?;
        self.active.lock().map_err(|_| StorageError::Poisoned)?.take();
        debug!(id = %tx, "transaction committed");
        Ok(())
    }

    async fn rollback_transaction(&self, tx: TransactionId) -> StorageResult<()> {
        if !self.is_active(tx)? {
            return Err(StorageError::UnknownTransaction(tx));
        }
        let result = self
            .lock_conn()
            .and_then(|conn| conn.execute_batch("ROLLBACK").map_err(StorageError::from));
        // The gate is released even if ROLLBACK itself failed; SQLite drops
        // the transaction on a failed statement anyway.
        self.active.lock().map_err(|_| StorageError::Poisoned)?.take();
        match &result {
            Ok(()) => debug!(id = %tx, "transaction rolled back"),
            Err(e) => warn!(id = %tx, error = %e, "rollback failed"),
        }
        result
    }

    async fn find_one(
        &self,
        tx: Option<TransactionId>,
        collection: &str,
        query: &Query,
    ) -> StorageResult<Option<Document>> {
        let key = query.id.storage_key();
        let doc = self
            .run(tx, move |conn| read_document(conn, collection, &key))
            .await?;
        Ok(doc.filter(|d| query.matches(d)))
    }

    async fn update_one(
        &self,
        tx: Option<TransactionId>,
        collection: &str,
        id: &DocumentId,
        patch: &DocumentPatch,
    ) -> StorageResult<Document> {
        let key = id.storage_key();
        let now = self.clock.now();
        self.run(tx, move |conn| {
            let current = read_document(conn, collection, &key)?.ok_or_else(|| StorageError::NotFound {
                collection: collection.to_string(),
                id: key.clone(),
            })?;
            let updated = current.patched(patch, now);
            let changed = conn.execute(
                "UPDATE documents SET body = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4",
                params![serde_json::to_string(&updated)?, now.to_rfc3339(), collection, key],
            )?;
            if changed != 1 {
                return Err(StorageError::NotFound {
                    collection: collection.to_string(),
                    id: key,
                });
            }
            Ok(updated)
        })
        .await
    }

    async fn latest_version(
        &self,
        tx: Option<TransactionId>,
        collection: &str,
        id: &DocumentId,
    ) -> StorageResult<Option<Version>> {
        let key = id.storage_key();
        self.run(tx, move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, collection, parent, snapshot, status, autosave, created_at
                     FROM versions WHERE collection = ?1 AND parent = ?2
                     ORDER BY seq DESC LIMIT 1",
                    params![collection, key],
                    VersionRow::from_row,
                )
                .optional()?;
            row.map(VersionRow::into_version).transpose()
        })
        .await
    }

    async fn insert_version(&self, tx: Option<TransactionId>, version: &Version) -> StorageResult<()> {
        let snapshot = serde_json::to_string(&version.snapshot)?;
        self.run(tx, move |conn| {
            conn.execute(
                "INSERT INTO versions (id, collection, parent, snapshot, status, autosave, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    version.id.to_string(),
                    version.collection,
                    version.parent.storage_key(),
                    snapshot,
                    version.status.as_str(),
                    version.autosave,
                    version.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_lock(
        &self,
        tx: Option<TransactionId>,
        collection: &str,
        id: &DocumentId,
    ) -> StorageResult<Option<EditLock>> {
        let key = id.storage_key();
        self.run(tx, move |conn| {
            let row: Option<(Option<String>, String)> = conn
                .query_row(
                    "SELECT holder, acquired_at FROM locked_documents WHERE collection = ?1 AND document_id = ?2",
                    params![collection, key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            row.map(|(holder, acquired_at)| -> StorageResult<EditLock> {
                Ok(EditLock {
                    document_id: id.clone(),
                    collection: collection.to_string(),
                    holder: holder.map(UserId::new),
                    acquired_at: parse_time(&acquired_at)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn delete_lock(
        &self,
        tx: Option<TransactionId>,
        collection: &str,
        id: &DocumentId,
    ) -> StorageResult<()> {
        let key = id.storage_key();
        self.run(tx, move |conn| {
            conn.execute(
                "DELETE FROM locked_documents WHERE collection = ?1 AND document_id = ?2",
                params![collection, key],
            )?;
            Ok(())
        })
        .await
    }
}
