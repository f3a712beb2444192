//! The field stage of `afterRead`.

use crate::context::RequestContext;
use crate::error::EngineResult;
use crate::secret::strip_secrets;
use async_trait::async_trait;
use folio_model::{CollectionSchema, Document};
use serde_json::Value;

/// How a document is read back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Relationship population depth, for readers that populate.
    pub depth: u32,
    pub show_hidden_fields: bool,
    pub locale: Option<String>,
    pub fallback_locale: Option<String>,
}

impl ReadOptions {
    pub fn for_request(req: &RequestContext, depth: u32, show_hidden_fields: bool) -> Self {
        Self {
            depth,
            show_hidden_fields,
            locale: req.locale.clone(),
            fallback_locale: req.fallback_locale.clone(),
        }
    }
}

/// Turns a stored document into the JSON a caller sees.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    async fn read(
        &self,
        schema: &CollectionSchema,
        doc: &Document,
        options: &ReadOptions,
        req: &RequestContext,
    ) -> EngineResult<Value>;
}

/// Applies locale overlays and hides hidden fields. Relationships are left
/// as stored ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldProjector;

#[async_trait]
impl DocumentReader for FieldProjector {
    async fn read(
        &self,
        schema: &CollectionSchema,
        doc: &Document,
        options: &ReadOptions,
        _req: &RequestContext,
    ) -> EngineResult<Value> {
        let mut value = doc.to_localized_json(options.locale.as_deref(), options.fallback_locale.as_deref());
        if let Some(map) = value.as_object_mut() {
            if !options.show_hidden_fields {
                for name in schema.hidden_fields() {
                    map.remove(name);
                }
            }
        }
        if !options.show_hidden_fields {
            strip_secrets(schema, &mut value);
        }
        Ok(value)
    }
}
