//! Shared fixtures for engine tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use folio_blobstore::MemoryFileStore;
use folio_crypto::KdfParams;
use folio_engine::{
    Argon2Secrets, Collection, MutationEngine, MutationEngineBuilder, RequestContext, User,
};
use folio_model::{
    AuthConfig, CollectionSchema, Document, DraftsConfig, FieldSchema, ImageSize, UploadConfig,
    Version, VersionsConfig,
};
use folio_storage::SqliteStorage;
use folio_types::{DocumentId, FixedClock};
use serde_json::Value;
use std::sync::Arc;

/// "Now" for every engine under test.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

/// When seeded documents were last written: well before [`t0`], so drafts
/// saved at `t0` count as newer.
pub fn seeded_at() -> DateTime<Utc> {
    t0() - Duration::hours(1)
}

pub fn posts() -> CollectionSchema {
    CollectionSchema::new("posts")
        .with_field(FieldSchema::text("title"))
        .with_field(FieldSchema::rich_text("body"))
}

pub fn drafted_posts() -> CollectionSchema {
    posts().with_versions(VersionsConfig::with_drafts(DraftsConfig::default()))
}

pub fn users() -> CollectionSchema {
    CollectionSchema::new("users")
        .with_field(FieldSchema::text("name"))
        .with_auth(AuthConfig::default())
}

pub fn media() -> CollectionSchema {
    CollectionSchema::new("media")
        .with_field(FieldSchema::text("alt"))
        .with_field(FieldSchema::upload("file"))
        .with_upload(UploadConfig {
            image_sizes: vec![ImageSize::new("thumb", Some(10), Some(10))],
            mime_types: vec!["image/*".into()],
            ..UploadConfig::default()
        })
}

pub fn editor(id: i64) -> RequestContext {
    RequestContext::for_user(User::new(id, "users"))
}

pub struct Harness {
    pub engine: MutationEngine,
    pub storage: Arc<SqliteStorage>,
    pub files: Arc<MemoryFileStore>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new(collections: Vec<Collection>) -> Self {
        Self::with(collections, |builder| builder)
    }

    pub fn with(
        collections: Vec<Collection>,
        configure: impl FnOnce(MutationEngineBuilder) -> MutationEngineBuilder,
    ) -> Self {
        Self::on(SqliteStorage::open_in_memory().unwrap(), collections, configure)
    }

    /// A harness over a specific store (for example one without transactions).
    pub fn on(
        storage: SqliteStorage,
        collections: Vec<Collection>,
        configure: impl FnOnce(MutationEngineBuilder) -> MutationEngineBuilder,
    ) -> Self {
        let clock = Arc::new(FixedClock::new(t0()));
        let storage = Arc::new(storage.with_clock(clock.clone()));
        let files = Arc::new(MemoryFileStore::new());
        let builder = MutationEngine::builder(storage.clone(), files.clone())
            .with_clock(clock.clone())
            .with_secrets(Arc::new(Argon2Secrets::new(KdfParams::insecure_fast())));
        let mut engine = configure(builder).build();
        for collection in collections {
            engine.register(collection);
        }
        Self {
            engine,
            storage,
            files,
            clock,
        }
    }

    pub async fn seed(&self, collection: &str, id: impl Into<DocumentId>, data: Value) -> Document {
        let doc = Document::new(id, data, seeded_at());
        self.storage.insert_document(collection, &doc).await.unwrap();
        doc
    }

    pub async fn live(&self, collection: &str, id: impl Into<DocumentId>) -> Document {
        self.storage
            .get_document(collection, &id.into())
            .await
            .unwrap()
            .expect("document exists")
    }

    pub async fn versions(&self, collection: &str, id: impl Into<DocumentId>) -> Vec<Version> {
        self.storage.versions(collection, &id.into()).await.unwrap()
    }
}
