use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Lock duration applied when a collection does not configure one (5 minutes).
pub const DEFAULT_LOCK_DURATION_SECS: u64 = 300;

/// Describes one collection: its fields and the behaviours the mutation
/// engine switches on (versions, auth, edit locking, uploads).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub slug: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<VersionsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub lock_when_editing: LockWhenEditing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadConfig>,
}

impl CollectionSchema {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            fields: Vec::new(),
            versions: None,
            auth: None,
            lock_when_editing: LockWhenEditing::default(),
            upload: None,
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn with_versions(mut self, versions: VersionsConfig) -> Self {
        self.versions = Some(versions);
        self
    }

    #[must_use]
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    #[must_use]
    pub fn with_lock(mut self, lock: LockWhenEditing) -> Self {
        self.lock_when_editing = lock;
        self
    }

    #[must_use]
    pub fn with_upload(mut self, upload: UploadConfig) -> Self {
        self.upload = Some(upload);
        self
    }

    pub fn versions_enabled(&self) -> bool {
        self.versions.is_some()
    }

    pub fn drafts(&self) -> Option<&DraftsConfig> {
        self.versions.as_ref().and_then(|v| v.drafts.as_ref())
    }

    pub fn drafts_enabled(&self) -> bool {
        self.drafts().is_some()
    }

    pub fn is_auth(&self) -> bool {
        self.auth.is_some()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn upload_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.field_type == FieldType::Upload)
    }

    pub fn localized_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.localized)
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn hidden_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter(|f| f.hidden).map(|f| f.name.as_str())
    }
}

/// A top-level field of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    /// Values live in per-locale overlays.
    #[serde(default)]
    pub localized: bool,
    /// Never returned unless the caller asks for hidden fields.
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub required: bool,
}

impl FieldSchema {
    fn simple(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            localized: false,
            hidden: false,
            required: false,
        }
    }

    /// Shorthand for a text field.
    pub fn text(name: &str) -> Self {
        Self::simple(name, FieldType::Text)
    }

    pub fn number(name: &str) -> Self {
        Self::simple(name, FieldType::Number)
    }

    pub fn bool(name: &str) -> Self {
        Self::simple(name, FieldType::Bool)
    }

    pub fn date(name: &str) -> Self {
        Self::simple(name, FieldType::Date)
    }

    pub fn json(name: &str) -> Self {
        Self::simple(name, FieldType::Json)
    }

    pub fn relation(name: &str) -> Self {
        Self::simple(name, FieldType::Relation)
    }

    pub fn rich_text(name: &str) -> Self {
        Self::simple(name, FieldType::RichText)
    }

    /// Shorthand for a file attachment field.
    pub fn upload(name: &str) -> Self {
        Self::simple(name, FieldType::Upload)
    }

    #[must_use]
    pub fn localized(mut self) -> Self {
        self.localized = true;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// The data type of a field, as far as the engine cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Bool,
    Date,
    Json,
    Relation,
    RichText,
    Upload,
}

/// Versioning behaviour of a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drafts: Option<DraftsConfig>,
    /// Retention hint for the external pruning policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_doc: Option<u32>,
}

impl VersionsConfig {
    /// Versions without drafts: every write is published.
    pub fn history_only() -> Self {
        Self::default()
    }

    /// Versions with drafts.
    pub fn with_drafts(drafts: DraftsConfig) -> Self {
        Self {
            drafts: Some(drafts),
            max_per_doc: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftsConfig {
    /// Validate fields on draft-only writes. Off by default so partial
    /// drafts can be saved.
    #[serde(default)]
    pub validate: bool,
    #[serde(default)]
    pub autosave: bool,
}

/// Credential handling for collections that authenticate users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Field carrying the plaintext secret on incoming data.
    #[serde(default = "default_secret_field")]
    pub secret_field: String,
    /// Fields a user can log in with (`email`, `username`). When set, every
    /// live write must leave at least one of them filled in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub login_fields: Vec<String>,
}

impl AuthConfig {
    #[must_use]
    pub fn with_login_fields(mut self, fields: &[&str]) -> Self {
        self.login_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_field: default_secret_field(),
            login_fields: Vec::new(),
        }
    }
}

fn default_secret_field() -> String {
    "password".to_string()
}

/// Edit-lock policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockWhenEditing {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_lock_duration")]
    pub lock_duration_secs: u64,
}

impl LockWhenEditing {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            lock_duration_secs: DEFAULT_LOCK_DURATION_SECS,
        }
    }

    pub fn with_duration(secs: u64) -> Self {
        Self {
            enabled: true,
            lock_duration_secs: secs,
        }
    }

    /// The lock lifetime, or `None` when locking is disabled.
    pub fn duration(&self) -> Option<Duration> {
        self.enabled
            .then(|| Duration::seconds(i64::try_from(self.lock_duration_secs).unwrap_or(i64::MAX)))
    }
}

impl Default for LockWhenEditing {
    fn default() -> Self {
        Self::with_duration(DEFAULT_LOCK_DURATION_SECS)
    }
}

fn default_true() -> bool {
    true
}

fn default_lock_duration() -> u64 {
    DEFAULT_LOCK_DURATION_SECS
}

/// File handling for collections with upload fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory (relative to the file store root) files are written to.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    /// Record metadata but never write bytes to the file store.
    #[serde(default)]
    pub disable_local_storage: bool,
    #[serde(default)]
    pub image_sizes: Vec<ImageSize>,
    /// Accepted MIME types; `image/*` style wildcards allowed. Empty accepts all.
    #[serde(default)]
    pub mime_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            static_dir: default_static_dir(),
            disable_local_storage: false,
            image_sizes: Vec::new(),
            mime_types: Vec::new(),
        }
    }
}

impl UploadConfig {
    pub fn accepts(&self, mime_type: &str) -> bool {
        self.mime_types.is_empty()
            || self.mime_types.iter().any(|allowed| match allowed.strip_suffix("/*") {
                Some(prefix) => mime_type
                    .split_once('/')
                    .is_some_and(|(kind, _)| kind == prefix),
                None => allowed == mime_type,
            })
    }
}

fn default_static_dir() -> String {
    "media".to_string()
}

/// A derivative size generated for image uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ImageSize {
    pub fn new(name: &str, width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }
}
