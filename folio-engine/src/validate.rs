use crate::error::ValidationError;
use async_trait::async_trait;
use folio_model::CollectionSchema;
use serde_json::Value;

/// Field-level validation run before files are written.
#[async_trait]
pub trait FieldValidator: Send + Sync {
    /// `merged` is the original document overlaid with `data`, the incoming
    /// changes.
    async fn validate(
        &self,
        schema: &CollectionSchema,
        merged: &Value,
        data: &Value,
    ) -> Result<(), ValidationError>;
}

/// Rejects required fields that are missing, null or blank.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredFields;

#[async_trait]
impl FieldValidator for RequiredFields {
    async fn validate(
        &self,
        schema: &CollectionSchema,
        merged: &Value,
        _data: &Value,
    ) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        for field in schema.fields.iter().filter(|f| f.required) {
            let present = match merged.get(&field.name) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(_) => true,
            };
            if !present {
                errors.push(&field.name, "this field is required");
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
