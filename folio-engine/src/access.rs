//! Access control seam.

use crate::context::RequestContext;
use crate::error::EngineResult;
use async_trait::async_trait;
use folio_model::{CollectionSchema, Where};
use folio_types::DocumentId;
use serde_json::Value;

/// Result of evaluating update access.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessResult {
    Allowed,
    /// Allowed for documents matching the filter only.
    AllowedWithFilter(Where),
    Denied,
}

/// Decides whether a requester may update a document.
#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn evaluate(
        &self,
        req: &RequestContext,
        schema: &CollectionSchema,
        id: &DocumentId,
        data: &Value,
    ) -> EngineResult<AccessResult>;
}

/// Grants every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AccessControl for AllowAll {
    async fn evaluate(
        &self,
        _req: &RequestContext,
        _schema: &CollectionSchema,
        _id: &DocumentId,
        _data: &Value,
    ) -> EngineResult<AccessResult> {
        Ok(AccessResult::Allowed)
    }
}

/// Lets signed-in users update documents whose `field` holds their id.
#[derive(Debug, Clone)]
pub struct OwnerOnly {
    field: String,
}

impl OwnerOnly {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }
}

#[async_trait]
impl AccessControl for OwnerOnly {
    async fn evaluate(
        &self,
        req: &RequestContext,
        _schema: &CollectionSchema,
        _id: &DocumentId,
        _data: &Value,
    ) -> EngineResult<AccessResult> {
        Ok(match req.user_id() {
            Some(user) => AccessResult::AllowedWithFilter(Where::equals(self.field.clone(), user.as_str())),
            None => AccessResult::Denied,
        })
    }
}
