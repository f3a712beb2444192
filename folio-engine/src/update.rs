//! The update-by-id operation.
//!
//! [`MutationEngine::update_by_id`] runs one update inside one transaction:
//!
//! 1. `beforeOperation` hooks (over the arguments)
//! 2. access check and lookup of the latest document
//! 3. edit-lock arbitration
//! 4. file materialization, `beforeValidate`, field validation
//! 5. file writes, `beforeChange`, credential hashing
//! 6. live write and/or version snapshot, lock release
//! 7. read-back through the field projector, then `afterRead`,
//!    `afterChange` and `afterOperation`
//!
//! Any error rolls the transaction back and removes files this update
//! wrote. Superseded files are deleted only after a successful commit.

use crate::access::{AccessControl, AccessResult, AllowAll};
use crate::config::{AbsenceDisclosure, EngineConfig};
use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult, ValidationError};
use crate::hooks::{run_stage, CollectionHooks, HookContext, PhaseTracker, StageName, StageValue, UpdatePhase};
use crate::lock::{LockArbiter, LockDecision};
use crate::read::{DocumentReader, FieldProjector, ReadOptions};
use crate::secret::{strip_secrets, Argon2Secrets, SecretFieldTransformer, HASH_KEY, SALT_KEY};
use crate::transaction::{TransactionCoordinator, TransactionScope};
use crate::uploads::{AttachmentCoordinator, FileLedger, Materialized};
use crate::validate::{FieldValidator, RequiredFields};
use crate::versions::{decide_write_mode, skip_validation, VersionManager, WriteMode};
use folio_blobstore::{DerivativeRenderer, FileStore, IncomingFile, NoDerivatives};
use folio_model::{AuthConfig, CollectionSchema, DocumentPatch, DocumentStatus, Query};
use folio_storage::Storage;
use folio_types::{Clock, DocumentId, SystemClock, TransactionId};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A registered collection: schema, hooks and access rules.
#[derive(Clone)]
pub struct Collection {
    pub schema: CollectionSchema,
    pub hooks: CollectionHooks,
    pub access: Arc<dyn AccessControl>,
}

impl Collection {
    /// A collection with no hooks that allows every update.
    pub fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            hooks: CollectionHooks::default(),
            access: Arc::new(AllowAll),
        }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: CollectionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn with_access(mut self, access: Arc<dyn AccessControl>) -> Self {
        self.access = access;
        self
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("schema", &self.schema)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// Arguments of one update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateArgs {
    pub collection: String,
    pub id: Option<DocumentId>,
    /// Field changes. `null` is treated as no changes.
    pub data: Value,
    /// Save as a draft (version only) when the collection has drafts.
    pub draft: bool,
    pub autosave: bool,
    pub override_access: bool,
    /// Keep incoming file names even if a file with that name exists.
    pub overwrite_existing_files: bool,
    pub show_hidden_fields: bool,
    pub depth: u32,
    /// Incoming files keyed by upload field name.
    pub files: BTreeMap<String, IncomingFile>,
}

impl UpdateArgs {
    pub fn new(collection: impl Into<String>, id: impl Into<DocumentId>, data: Value) -> Self {
        Self {
            collection: collection.into(),
            id: Some(id.into()),
            data,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_draft(mut self, draft: bool) -> Self {
        self.draft = draft;
        self
    }

    #[must_use]
    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    #[must_use]
    pub fn with_override_access(mut self, override_access: bool) -> Self {
        self.override_access = override_access;
        self
    }

    #[must_use]
    pub fn with_overwrite_existing_files(mut self, overwrite: bool) -> Self {
        self.overwrite_existing_files = overwrite;
        self
    }

    #[must_use]
    pub fn with_hidden_fields(mut self, show: bool) -> Self {
        self.show_hidden_fields = show;
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    #[must_use]
    pub fn with_file(mut self, field: impl Into<String>, file: IncomingFile) -> Self {
        self.files.insert(field.into(), file);
        self
    }
}

impl StageValue for UpdateArgs {}

/// Builds a [`MutationEngine`] with default collaborators.
pub struct MutationEngineBuilder {
    storage: Arc<dyn Storage>,
    files: Arc<dyn FileStore>,
    clock: Arc<dyn Clock>,
    renderer: Arc<dyn DerivativeRenderer>,
    reader: Arc<dyn DocumentReader>,
    validator: Arc<dyn FieldValidator>,
    secrets: Arc<dyn SecretFieldTransformer>,
    absence: AbsenceDisclosure,
}

impl MutationEngineBuilder {
    /// Clock for lock expiry and version timestamps. Live `updated_at`
    /// stamps come from the storage backend.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn DerivativeRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    #[must_use]
    pub fn with_reader(mut self, reader: Arc<dyn DocumentReader>) -> Self {
        self.reader = reader;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn FieldValidator>) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretFieldTransformer>) -> Self {
        self.secrets = secrets;
        self
    }

    #[must_use]
    pub fn with_absence_disclosure(mut self, absence: AbsenceDisclosure) -> Self {
        self.absence = absence;
        self
    }

    pub fn build(self) -> MutationEngine {
        MutationEngine {
            transactions: TransactionCoordinator::new(self.storage.clone()),
            locks: LockArbiter::new(self.storage.clone(), self.clock.clone()),
            versions: VersionManager::new(self.storage.clone(), self.clock.clone()),
            attachments: AttachmentCoordinator::new(self.files, self.renderer),
            storage: self.storage,
            clock: self.clock,
            reader: self.reader,
            validator: self.validator,
            secrets: self.secrets,
            absence: self.absence,
            collections: HashMap::new(),
        }
    }
}

/// Applies updates to stored documents.
pub struct MutationEngine {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    transactions: TransactionCoordinator,
    locks: LockArbiter,
    versions: VersionManager,
    attachments: AttachmentCoordinator,
    reader: Arc<dyn DocumentReader>,
    validator: Arc<dyn FieldValidator>,
    secrets: Arc<dyn SecretFieldTransformer>,
    absence: AbsenceDisclosure,
    collections: HashMap<String, Collection>,
}

impl MutationEngine {
    pub fn builder(storage: Arc<dyn Storage>, files: Arc<dyn FileStore>) -> MutationEngineBuilder {
        MutationEngineBuilder {
            storage,
            files,
            clock: Arc::new(SystemClock),
            renderer: Arc::new(NoDerivatives),
            reader: Arc::new(FieldProjector),
            validator: Arc::new(RequiredFields),
            secrets: Arc::new(Argon2Secrets::default()),
            absence: AbsenceDisclosure::default(),
        }
    }

    /// An engine with the configured collections registered (no hooks,
    /// allow-all access) and the configured KDF and absence policy.
    pub fn from_config(config: &EngineConfig, storage: Arc<dyn Storage>, files: Arc<dyn FileStore>) -> Self {
        let mut engine = Self::builder(storage, files)
            .with_secrets(Arc::new(Argon2Secrets::new(config.kdf.clone())))
            .with_absence_disclosure(config.absence_disclosure)
            .build();
        for schema in config.resolved_collections() {
            engine.register(Collection::new(schema));
        }
        engine
    }

    /// Registers a collection, replacing any previous one with the same slug.
    pub fn register(&mut self, collection: Collection) -> Option<Collection> {
        info!(collection = %collection.schema.slug, "collection registered");
        self.collections
            .insert(collection.schema.slug.clone(), collection)
    }

    pub fn collection(&self, slug: &str) -> Option<&Collection> {
        self.collections.get(slug)
    }

    pub fn collection_mut(&mut self, slug: &str) -> Option<&mut Collection> {
        self.collections.get_mut(slug)
    }

    /// Updates one document and returns it as a fresh read would.
    pub async fn update_by_id(&self, args: UpdateArgs, req: &mut RequestContext) -> EngineResult<Value> {
        let collection = self
            .collections
            .get(&args.collection)
            .ok_or_else(|| EngineError::UnknownCollection(args.collection.clone()))?;
        let slug = collection.schema.slug.as_str();

        let scope = self.transactions.begin(req).await?;
        let mut files = FileLedger::default();
        let mut phases = PhaseTracker::new(slug);

        let outcome = match self.run_update(collection, args, req, &mut files, &mut phases).await {
            Ok(value) => self.transactions.commit(scope, req).await.map(|()| value),
            Err(e) => {
                self.transactions.rollback(scope, req).await;
                Err(e)
            }
        };

        match outcome {
            Ok(value) => {
                phases.advance(UpdatePhase::Completed);
                if scope == TransactionScope::Shared {
                    req.defer_files(files);
                } else {
                    files.absorb(req.take_files());
                    self.settle_files(files, true).await;
                }
                Ok(value)
            }
            Err(e) => {
                warn!(collection = slug, phase = ?phases.phase(), error = %e, "update failed");
                phases.advance(UpdatePhase::Failed);
                if scope == TransactionScope::Shared {
                    // Earlier work in the caller's transaction may still commit.
                    self.attachments.remove(&files.written).await;
                } else {
                    files.absorb(req.take_files());
                    self.settle_files(files, false).await;
                }
                Err(e)
            }
        }
    }

    /// Finishes the file side of a transaction: orphaned files are deleted
    /// after a commit, files written under it are removed after a rollback.
    ///
    /// The engine does this itself for transactions it opens. A caller that
    /// opened the transaction passes [`RequestContext::take_files`] here
    /// once it has committed or rolled back.
    pub async fn settle_files(&self, ledger: FileLedger, committed: bool) -> usize {
        let paths = if committed { &ledger.orphaned } else { &ledger.written };
        if paths.is_empty() {
            return 0;
        }
        let removed = self.attachments.remove(paths).await;
        debug!(committed, removed, "files settled");
        removed
    }

    /// Reads a document the way an update returns it: access filter, field
    /// projection and `afterRead` hooks. With `draft` the newest draft wins
    /// over the live row.
    pub async fn find_by_id(
        &self,
        collection: &str,
        id: &DocumentId,
        draft: bool,
        req: &RequestContext,
    ) -> EngineResult<Value> {
        let collection = self
            .collections
            .get(collection)
            .ok_or_else(|| EngineError::UnknownCollection(collection.to_string()))?;
        let schema = &collection.schema;
        let tx = req.transaction;
        let query = self.scoped_query(collection, id, &Value::Null, false, req).await?;
        let doc = if draft {
            self.versions.latest_document(tx, schema, &query).await?
        } else {
            self.storage.find_one(tx, &schema.slug, &query).await?
        };
        let Some(doc) = doc else {
            return Err(self.absence_error(tx, schema, &query).await?);
        };
        let value = self
            .reader
            .read(schema, &doc, &ReadOptions::for_request(req, 0, false), req)
            .await?;
        let ctx = HookContext {
            stage: StageName::AfterRead,
            schema,
            request: req,
            original: None,
        };
        let mut value = run_stage(collection.hooks.stage(StageName::AfterRead), value, &ctx).await?;
        strip_secrets(schema, &mut value);
        Ok(value)
    }

    async fn run_update(
        &self,
        collection: &Collection,
        args: UpdateArgs,
        req: &RequestContext,
        files: &mut FileLedger,
        phases: &mut PhaseTracker<'_>,
    ) -> EngineResult<Value> {
        let schema = &collection.schema;
        let hooks = &collection.hooks;
        let tx = req.transaction;

        phases.advance(UpdatePhase::BeforeOperation);
        let ctx = HookContext {
            stage: StageName::BeforeOperation,
            schema,
            request: req,
            original: None,
        };
        let args = run_stage(hooks.before_operation.as_slice(), args, &ctx).await?;
        let UpdateArgs {
            id,
            data,
            draft,
            autosave,
            override_access,
            overwrite_existing_files,
            show_hidden_fields,
            depth,
            files: incoming,
            ..
        } = args;

        let id = match id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(EngineError::MissingIdentifier),
        };
        let data = match data {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => data,
            _ => return Err(ValidationError::field("data", "update data must be an object").into()),
        };

        let query = self.scoped_query(collection, &id, &data, override_access, req).await?;
        phases.advance(UpdatePhase::AccessChecked);

        let Some(current) = self.versions.latest_document(tx, schema, &query).await? else {
            return Err(self.absence_error(tx, schema, &query).await?);
        };

        let release_lock = match self.locks.check_and_acquire(tx, schema, &id, req.user_id()).await? {
            LockDecision::Denied { holder, acquired_at } => {
                return Err(EngineError::Locked {
                    collection: schema.slug.clone(),
                    id: id.to_string(),
                    holder,
                    acquired_at,
                });
            }
            decision => decision.releases(),
        };
        phases.advance(UpdatePhase::Locked);

        // Field stage only: collection afterRead hooks run on the result.
        let original = self
            .reader
            .read(schema, &current, &ReadOptions::for_request(req, 0, true), req)
            .await?;
        let ctx = HookContext {
            original: Some(&original),
            ..ctx.at(StageName::BeforeValidate)
        };

        let Materialized { data, pending } = self
            .attachments
            .materialize(schema, data, &incoming, overwrite_existing_files)
            .await?;

        let mut data = run_stage(hooks.stage(StageName::BeforeValidate), data, &ctx).await?;
        phases.advance(UpdatePhase::BeforeValidate);

        let requested = decide_write_mode(schema, draft, DocumentStatus::from_data(&data));
        let validated = !skip_validation(schema, requested);
        if validated {
            self.validator.validate(schema, &overlay(&original, &data), &data).await?;
        } else {
            debug!(collection = %schema.slug, %id, "validation skipped for draft");
        }

        self.attachments.write_pending(schema, &pending, &mut files.written).await?;
        phases.advance(UpdatePhase::FilesMaterialized);

        data = run_stage(hooks.stage(StageName::BeforeChange), data, &ctx.at(StageName::BeforeChange)).await?;
        phases.advance(UpdatePhase::BeforeChange);

        // Hooks may have changed `_status`.
        let mode = decide_write_mode(schema, draft, DocumentStatus::from_data(&data));
        if !validated && !skip_validation(schema, mode) {
            self.validator.validate(schema, &overlay(&original, &data), &data).await?;
        }

        if let Some(auth) = &schema.auth {
            if mode.writes_live() {
                ensure_login_field(auth, &overlay(&original, &data))?;
            }
            self.apply_secret(auth, mode, &mut data).await?;
        }

        let patch = DocumentPatch::from_data(&data, &schema.localized_fields(), req.locale.as_deref())
            .rebased_on(&current);
        let saved = if mode.writes_live() {
            // Orphans are files the live row referenced and the new one does
            // not. Draft-only writes leave the live row and its files alone.
            let live = if schema.drafts_enabled() {
                self.storage.find_one(tx, &schema.slug, &Query::by_id(id.clone())).await?
            } else {
                Some(current.clone())
            };
            if let Some(live) = live {
                files.orphaned = self
                    .attachments
                    .reconcile(schema, &live, &Value::Object(patch.fields.clone()));
            }
            self.storage.update_one(tx, &schema.slug, &id, &patch).await?
        } else {
            current.patched(&patch, self.clock.now())
        };
        let version = self
            .versions
            .persist_version(tx, &schema.slug, &saved, mode, autosave)
            .await?;
        if release_lock {
            self.locks.release(tx, &schema.slug, &id).await?;
        }
        phases.advance(UpdatePhase::Persisted);

        let result_doc = match version {
            Some(version) if mode == WriteMode::VersionOnly => version.snapshot,
            _ => saved,
        };
        let read = self
            .reader
            .read(schema, &result_doc, &ReadOptions::for_request(req, depth, show_hidden_fields), req)
            .await?;
        let mut result = run_stage(hooks.stage(StageName::AfterRead), read, &ctx.at(StageName::AfterRead)).await?;
        phases.advance(UpdatePhase::AfterRead);

        result = run_stage(hooks.stage(StageName::AfterChange), result, &ctx.at(StageName::AfterChange)).await?;
        phases.advance(UpdatePhase::AfterChange);

        result = run_stage(
            hooks.stage(StageName::AfterOperation),
            result,
            &ctx.at(StageName::AfterOperation),
        )
        .await?;
        strip_secrets(schema, &mut result);

        info!(collection = %schema.slug, %id, ?mode, "document updated");
        Ok(result)
    }

    /// The lookup for `id`, narrowed by the collection's access result.
    async fn scoped_query(
        &self,
        collection: &Collection,
        id: &DocumentId,
        data: &Value,
        override_access: bool,
        req: &RequestContext,
    ) -> EngineResult<Query> {
        let query = Query::by_id(id.clone());
        if override_access {
            return Ok(query);
        }
        match collection.access.evaluate(req, &collection.schema, id, data).await? {
            AccessResult::Allowed => Ok(query),
            AccessResult::AllowedWithFilter(filter) => Ok(query.with_filter(Some(filter))),
            AccessResult::Denied => Err(EngineError::Forbidden {
                collection: collection.schema.slug.clone(),
                id: id.to_string(),
            }),
        }
    }

    async fn absence_error(
        &self,
        tx: Option<TransactionId>,
        schema: &CollectionSchema,
        query: &Query,
    ) -> EngineResult<EngineError> {
        let forbidden = match self.absence {
            AbsenceDisclosure::AlwaysNotFound => false,
            AbsenceDisclosure::FilterImpliesForbidden => query.has_filter(),
            AbsenceDisclosure::RecheckUnfiltered => {
                query.has_filter()
                    && self
                        .storage
                        .find_one(tx, &schema.slug, &Query::by_id(query.id.clone()))
                        .await?
                        .is_some()
            }
        };
        let collection = schema.slug.clone();
        let id = query.id.to_string();
        Ok(if forbidden {
            EngineError::Forbidden { collection, id }
        } else {
            EngineError::NotFound { collection, id }
        })
    }

    /// Replaces a plaintext secret with its hash and salt. The plaintext is
    /// always removed; it is only hashed when the write reaches the live
    /// record.
    async fn apply_secret(&self, auth: &AuthConfig, mode: WriteMode, data: &mut Value) -> EngineResult<()> {
        let Some(map) = data.as_object_mut() else {
            return Ok(());
        };
        // Stored credentials are only ever produced below.
        map.remove(HASH_KEY);
        map.remove(SALT_KEY);
        let secret = match map.remove(&auth.secret_field) {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::String(secret)) => secret,
            Some(_) => {
                return Err(ValidationError::field(&auth.secret_field, "must be a string").into());
            }
        };
        if secret.is_empty() || mode == WriteMode::VersionOnly {
            return Ok(());
        }
        let hashed = self.secrets.transform(&secret).await?;
        map.insert(HASH_KEY.to_string(), Value::String(hashed.hash));
        map.insert(SALT_KEY.to_string(), Value::String(hashed.salt));
        Ok(())
    }
}

/// Auth collections with login fields need at least one of them set.
fn ensure_login_field(auth: &AuthConfig, merged: &Value) -> Result<(), ValidationError> {
    if auth.login_fields.is_empty() {
        return Ok(());
    }
    let present = auth.login_fields.iter().any(|name| match merged.get(name) {
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    });
    if present {
        return Ok(());
    }
    let message = format!("one of {} is required", auth.login_fields.join(", "));
    let mut errors = ValidationError::new();
    for name in &auth.login_fields {
        errors.push(name, message.clone());
    }
    Err(errors)
}

/// `base` with the top-level keys of `changes` written over it.
fn overlay(base: &Value, changes: &Value) -> Value {
    let mut merged = base.as_object().cloned().unwrap_or_default();
    if let Some(changes) = changes.as_object() {
        for (key, value) in changes {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}
