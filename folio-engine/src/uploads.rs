//! Attachment lifecycle for upload fields.
//!
//! Files are resolved in memory first ([`AttachmentCoordinator::materialize`]),
//! written once the data has validated, and superseded files are only
//! deleted after the transaction commits.

use crate::error::{EngineResult, ValidationError};
use folio_blobstore::{checksum, DerivativeRenderer, FileStore, IncomingFile};
use folio_model::{CollectionSchema, Document, FileData, SizeData};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Bytes waiting to be written to the file store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub path: String,
    pub data: Vec<u8>,
}

/// Update data with file metadata filled in, plus the bytes to write.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub data: Value,
    pub pending: Vec<PendingFile>,
}

/// Paths touched by an update that still need cleanup once its outcome is
/// known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileLedger {
    /// Written by this update; removed if it fails.
    pub written: Vec<String>,
    /// No longer referenced; removed once it commits.
    pub orphaned: Vec<String>,
}

impl FileLedger {
    pub fn is_empty(&self) -> bool {
        self.written.is_empty() && self.orphaned.is_empty()
    }

    pub fn absorb(&mut self, other: FileLedger) {
        self.written.extend(other.written);
        self.orphaned.extend(other.orphaned);
    }
}

pub struct AttachmentCoordinator {
    files: Arc<dyn FileStore>,
    renderer: Arc<dyn DerivativeRenderer>,
}

impl AttachmentCoordinator {
    pub fn new(files: Arc<dyn FileStore>, renderer: Arc<dyn DerivativeRenderer>) -> Self {
        Self { files, renderer }
    }

    /// Resolves incoming files for the schema's upload fields into
    /// [`FileData`] values. Nothing is written.
    pub async fn materialize(
        &self,
        schema: &CollectionSchema,
        mut data: Value,
        files: &BTreeMap<String, IncomingFile>,
        overwrite_existing: bool,
    ) -> EngineResult<Materialized> {
        let mut pending = Vec::new();
        if files.is_empty() {
            return Ok(Materialized { data, pending });
        }
        let config = schema.upload.clone().unwrap_or_default();
        let mut taken = BTreeSet::new();
        let mut errors = ValidationError::new();

        for field in schema.upload_fields() {
            let Some(file) = files.get(&field.name) else {
                continue;
            };
            if !config.accepts(&file.mime_type) {
                errors.push(&field.name, format!("file type {} is not allowed", file.mime_type));
                continue;
            }
            let Some(requested) = sanitize_filename(&file.filename) else {
                errors.push(&field.name, "file name is empty");
                continue;
            };
            let filename = if overwrite_existing || config.disable_local_storage {
                requested
            } else {
                self.unique_filename(&config.static_dir, &requested, &taken).await?
            };
            let path = join_path(&config.static_dir, &filename);
            taken.insert(path.clone());

            let mut meta = FileData {
                filename: filename.clone(),
                mime_type: file.mime_type.clone(),
                filesize: file.data.len() as u64,
                checksum: checksum(&file.data),
                width: file.width,
                height: file.height,
                sizes: BTreeMap::new(),
            };
            if file.is_image() {
                let (stem, ext) = split_filename(&filename);
                for size in &config.image_sizes {
                    let Some(rendered) = self.renderer.render(file, size).await? else {
                        continue;
                    };
                    let name = match ext {
                        Some(ext) => format!("{stem}-{}x{}.{ext}", rendered.width, rendered.height),
                        None => format!("{stem}-{}x{}", rendered.width, rendered.height),
                    };
                    let size_path = join_path(&config.static_dir, &name);
                    taken.insert(size_path.clone());
                    meta.sizes.insert(
                        size.name.clone(),
                        SizeData {
                            filename: name,
                            mime_type: rendered.mime_type.clone(),
                            filesize: rendered.data.len() as u64,
                            width: Some(rendered.width),
                            height: Some(rendered.height),
                        },
                    );
                    pending.push(PendingFile {
                        path: size_path,
                        data: rendered.data,
                    });
                }
            }
            pending.push(PendingFile {
                path,
                data: file.data.clone(),
            });
            debug!(field = %field.name, filename = %meta.filename, sizes = meta.sizes.len(), "file materialized");
            set_field(&mut data, &field.name, meta.to_value());
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }
        Ok(Materialized { data, pending })
    }

    /// Paths of previously stored files that the update's data no longer
    /// references. Only upload fields present in `data` are considered.
    pub fn reconcile(&self, schema: &CollectionSchema, previous: &Document, data: &Value) -> Vec<String> {
        let config = schema.upload.clone().unwrap_or_default();
        let mut orphans = Vec::new();
        for field in schema.upload_fields() {
            let Some(next) = data.get(&field.name) else {
                continue;
            };
            let Some(old) = previous.fields.get(&field.name).and_then(FileData::from_value) else {
                continue;
            };
            let keep: BTreeSet<String> = FileData::from_value(next)
                .map(|f| f.paths(&config.static_dir).into_iter().collect())
                .unwrap_or_default();
            orphans.extend(
                old.paths(&config.static_dir)
                    .into_iter()
                    .filter(|p| !keep.contains(p)),
            );
        }
        orphans
    }

    /// Writes pending payloads, recording each newly created path in
    /// `written` as soon as it lands. Skipped entirely when the collection
    /// disables local storage.
    pub async fn write_pending(
        &self,
        schema: &CollectionSchema,
        pending: &[PendingFile],
        written: &mut Vec<String>,
    ) -> EngineResult<()> {
        if schema.upload.as_ref().is_some_and(|u| u.disable_local_storage) {
            debug!(collection = %schema.slug, files = pending.len(), "local storage disabled, skipping writes");
            return Ok(());
        }
        for file in pending {
            // Paths that already existed belong to the stored record.
            let replaced = self.files.exists(&file.path).await?;
            self.files.write(&file.path, &file.data).await?;
            if replaced {
                debug!(path = %file.path, "existing file overwritten");
            } else {
                written.push(file.path.clone());
            }
        }
        Ok(())
    }

    /// Deletes `paths`, logging failures. Returns how many were removed.
    pub async fn remove(&self, paths: &[String]) -> usize {
        let mut removed = 0;
        for path in paths {
            match self.files.delete(path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path, error = %e, "failed to delete file"),
            }
        }
        removed
    }

    async fn unique_filename(
        &self,
        dir: &str,
        requested: &str,
        taken: &BTreeSet<String>,
    ) -> EngineResult<String> {
        let (stem, ext) = split_filename(requested);
        let mut candidate = requested.to_string();
        let mut counter = 0u32;
        loop {
            let path = join_path(dir, &candidate);
            if !taken.contains(&path) && !self.files.exists(&path).await? {
                return Ok(candidate);
            }
            counter += 1;
            candidate = match ext {
                Some(ext) => format!("{stem}-{counter}.{ext}"),
                None => format!("{stem}-{counter}"),
            };
        }
    }
}

fn set_field(data: &mut Value, name: &str, value: Value) {
    if !data.is_object() {
        *data = Value::Object(serde_json::Map::new());
    }
    if let Some(map) = data.as_object_mut() {
        map.insert(name.to_string(), value);
    }
}

/// Drops any directory part and surrounding whitespace.
fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    (!base.is_empty() && base != "." && base != "..").then(|| base.to_string())
}

fn split_filename(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

fn join_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}
