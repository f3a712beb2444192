use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attachment metadata stored as the value of an upload field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub filename: String,
    pub mime_type: String,
    pub filesize: u64,
    /// Hex-encoded SHA-256 of the original bytes.
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Derived variants keyed by image size name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sizes: BTreeMap<String, SizeData>,
}

/// One derived variant of an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeData {
    pub filename: String,
    pub mime_type: String,
    pub filesize: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl FileData {
    /// Parses a field value; anything that is not file metadata yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Storage paths of the original and every derived variant.
    pub fn paths(&self, static_dir: &str) -> Vec<String> {
        std::iter::once(self.filename.as_str())
            .chain(self.sizes.values().map(|s| s.filename.as_str()))
            .map(|name| join_path(static_dir, name))
            .collect()
    }
}

/// Joins a static directory and a file name with exactly one `/`.
pub(crate) fn join_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}
