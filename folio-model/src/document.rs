use chrono::{DateTime, Utc};
use folio_types::DocumentId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const ID_KEY: &str = "id";
pub const STATUS_KEY: &str = "_status";
pub const CREATED_AT_KEY: &str = "createdAt";
pub const UPDATED_AT_KEY: &str = "updatedAt";

/// Publication state of a document or version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Published,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }

    /// Reads the `_status` key of a JSON object, if present and valid.
    pub fn from_data(data: &Value) -> Option<Self> {
        data.get(STATUS_KEY)
            .and_then(Value::as_str)
            .and_then(Self::parse)
    }
}

/// A stored document.
///
/// `fields` is opaque to the engine; its shape belongs to the collection's
/// schema. Localized values live in `locales` and never overwrite the
/// canonical `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DocumentStatus>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub locales: BTreeMap<String, Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Creates a document from a JSON object of fields. Reserved keys
    /// (`id`, `_status`, timestamps) are lifted out of `fields`.
    pub fn new(id: impl Into<DocumentId>, data: Value, now: DateTime<Utc>) -> Self {
        let mut fields = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let status = fields
            .remove(STATUS_KEY)
            .and_then(|v| v.as_str().and_then(DocumentStatus::parse));
        fields.remove(ID_KEY);
        fields.remove(CREATED_AT_KEY);
        fields.remove(UPDATED_AT_KEY);
        Self {
            id: id.into(),
            fields,
            status,
            locales: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Extract a string value from the canonical fields using a JSON pointer (e.g., "/title").
    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.field(pointer).and_then(|v| v.as_str())
    }

    /// Extract a value from the canonical fields using a JSON pointer.
    pub fn field(&self, pointer: &str) -> Option<&Value> {
        let mut parts = pointer.trim_start_matches('/').splitn(2, '/');
        let head = parts.next()?;
        let value = self.fields.get(head)?;
        match parts.next() {
            Some(rest) => value.pointer(&format!("/{rest}")),
            None => Some(value),
        }
    }

    /// Field values as seen from `locale`: canonical fields, then the
    /// fallback locale's overlay, then the requested locale's overlay.
    pub fn localized_fields(&self, locale: Option<&str>, fallback: Option<&str>) -> Map<String, Value> {
        let mut fields = self.fields.clone();
        for code in [fallback, locale].into_iter().flatten() {
            if let Some(overlay) = self.locales.get(code) {
                for (key, value) in overlay {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }
        fields
    }

    /// Flattened JSON view: `{id, ...fields, _status?, createdAt, updatedAt}`.
    pub fn to_json(&self) -> Value {
        self.to_json_with(self.fields.clone())
    }

    /// Flattened JSON view with locale overlays applied.
    pub fn to_localized_json(&self, locale: Option<&str>, fallback: Option<&str>) -> Value {
        self.to_json_with(self.localized_fields(locale, fallback))
    }

    fn to_json_with(&self, fields: Map<String, Value>) -> Value {
        let mut map = Map::with_capacity(fields.len() + 4);
        map.insert(ID_KEY.into(), self.id.to_json());
        map.extend(fields);
        if let Some(status) = self.status {
            map.insert(STATUS_KEY.into(), Value::String(status.as_str().into()));
        }
        map.insert(CREATED_AT_KEY.into(), Value::String(self.created_at.to_rfc3339()));
        map.insert(UPDATED_AT_KEY.into(), Value::String(self.updated_at.to_rfc3339()));
        Value::Object(map)
    }

    /// Applies a patch in place (shallow, top-level merge) and stamps `updated_at`.
    pub fn apply(&mut self, patch: &DocumentPatch, now: DateTime<Utc>) {
        for (key, value) in &patch.fields {
            self.fields.insert(key.clone(), value.clone());
        }
        if let Some(status) = patch.status {
            self.status = Some(status);
        }
        if let Some((locale, overlay)) = &patch.localized {
            let target = self.locales.entry(locale.clone()).or_default();
            for (key, value) in overlay {
                target.insert(key.clone(), value.clone());
            }
        }
        self.updated_at = now;
    }

    /// Returns a copy with `patch` applied.
    #[must_use]
    pub fn patched(&self, patch: &DocumentPatch, now: DateTime<Utc>) -> Self {
        let mut doc = self.clone();
        doc.apply(patch, now);
        doc
    }
}

/// Field changes written by one update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPatch {
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DocumentStatus>,
    /// Changes to one locale's overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localized: Option<(String, Map<String, Value>)>,
}

impl DocumentPatch {
    /// Splits incoming update data into canonical and localized changes.
    ///
    /// Reserved keys are dropped. When `locale` is set, keys listed in
    /// `localized_fields` go to that locale's overlay instead of the
    /// canonical fields.
    pub fn from_data(data: &Value, localized_fields: &[&str], locale: Option<&str>) -> Self {
        let mut patch = Self {
            status: DocumentStatus::from_data(data),
            ..Self::default()
        };
        let Some(object) = data.as_object() else {
            return patch;
        };
        let mut overlay = Map::new();
        for (key, value) in object {
            if matches!(key.as_str(), ID_KEY | STATUS_KEY | CREATED_AT_KEY | UPDATED_AT_KEY) {
                continue;
            }
            if locale.is_some() && localized_fields.contains(&key.as_str()) {
                overlay.insert(key.clone(), value.clone());
            } else {
                patch.fields.insert(key.clone(), value.clone());
            }
        }
        if let Some(code) = locale {
            if !overlay.is_empty() {
                patch.localized = Some((code.to_string(), overlay));
            }
        }
        patch
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.status.is_none() && self.localized.is_none()
    }

    /// Expands the patch into a full write of `base` with these changes
    /// applied. Writing the result over any row leaves its canonical fields
    /// and the touched locale's overlay equal to `base.patched(self)`.
    #[must_use]
    pub fn rebased_on(&self, base: &Document) -> Self {
        let mut fields = base.fields.clone();
        fields.extend(self.fields.clone());
        let localized = self.localized.as_ref().map(|(locale, changes)| {
            let mut overlay = base.locales.get(locale).cloned().unwrap_or_default();
            overlay.extend(changes.clone());
            (locale.clone(), overlay)
        });
        Self {
            fields,
            status: self.status.or(base.status),
            localized,
        }
    }
}
