//! Document mutation engine for Folio.
//!
//! Applies a single update to one stored document inside one transaction,
//! interleaving:
//! - access control ([`AccessControl`])
//! - optimistic edit locks ([`LockArbiter`], [`arbitrate`])
//! - ordered hook stages ([`CollectionHooks`], [`run_stage`])
//! - draft/publish branching and version snapshots ([`VersionManager`])
//! - attachment files ([`AttachmentCoordinator`])
//!
//! The entry point is [`MutationEngine::update_by_id`].

mod access;
mod config;
mod context;
mod error;
mod hooks;
mod lock;
mod read;
mod secret;
mod transaction;
mod update;
mod uploads;
mod validate;
mod versions;

pub use access::{AccessControl, AccessResult, AllowAll, OwnerOnly};
pub use config::{init_tracing, AbsenceDisclosure, EngineConfig};
pub use context::{RequestContext, User};
pub use error::{EngineError, EngineResult, FieldError, ValidationError};
pub use hooks::{
    hook_fn, run_stage, CollectionHooks, Hook, HookContext, StageName, StageValue, UpdatePhase,
};
pub use lock::{arbitrate, LockArbiter, LockDecision};
pub use read::{DocumentReader, FieldProjector, ReadOptions};
pub use secret::{strip_secrets, Argon2Secrets, SecretFieldTransformer, HASH_KEY, SALT_KEY};
pub use transaction::{TransactionCoordinator, TransactionScope};
pub use update::{Collection, MutationEngine, MutationEngineBuilder, UpdateArgs};
pub use uploads::{AttachmentCoordinator, FileLedger, Materialized, PendingFile};
pub use validate::{FieldValidator, RequiredFields};
pub use versions::{decide_write_mode, skip_validation, VersionManager, WriteMode};
