//! Engine configuration and logging setup.

use crate::error::EngineResult;
use folio_crypto::KdfParams;
use folio_model::{CollectionSchema, DEFAULT_LOCK_DURATION_SECS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Which error an update reports when the target is not visible to the
/// requester.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceDisclosure {
    /// `Forbidden` when an access filter narrowed the lookup, else `NotFound`.
    #[default]
    FilterImpliesForbidden,
    /// Always `NotFound`; existence is never revealed.
    AlwaysNotFound,
    /// With a filter, look the id up unfiltered and report `Forbidden` only
    /// if the document exists.
    RecheckUnfiltered,
}

/// Engine settings, loadable from TOML.
///
/// ```toml
/// absence_disclosure = "always_not_found"
/// default_lock_duration_secs = 600
/// log_filter = "folio_engine=debug"
///
/// [kdf]
/// memory_cost = 19456
/// time_cost = 2
/// parallelism = 1
///
/// [[collections]]
/// slug = "posts"
/// fields = [{ name = "title", field_type = "text", required = true }]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub absence_disclosure: AbsenceDisclosure,
    /// Lock duration for collections that keep the built-in default.
    pub default_lock_duration_secs: u64,
    pub kdf: KdfParams,
    /// `tracing` filter directives, overridden by `RUST_LOG`.
    pub log_filter: String,
    pub collections: Vec<CollectionSchema>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            absence_disclosure: AbsenceDisclosure::default(),
            default_lock_duration_secs: DEFAULT_LOCK_DURATION_SECS,
            kdf: KdfParams::default(),
            log_filter: "info".to_string(),
            collections: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> EngineResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Collections with the engine-wide lock duration applied.
    pub fn resolved_collections(&self) -> Vec<CollectionSchema> {
        self.collections
            .iter()
            .cloned()
            .map(|mut schema| {
                let lock = &mut schema.lock_when_editing;
                if lock.enabled && lock.lock_duration_secs == DEFAULT_LOCK_DURATION_SECS {
                    lock.lock_duration_secs = self.default_lock_duration_secs;
                }
                schema
            })
            .collect()
    }
}

/// Installs a compact fmt subscriber filtered by `RUST_LOG`, falling back to
/// `filter`. Returns `false` if a global subscriber was already set.
pub fn init_tracing(filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}
