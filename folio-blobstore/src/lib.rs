//! Attachment file storage for Folio.
//!
//! Bytes are kept outside the document store. The mutation engine talks to
//! a [`FileStore`] (local directory or in-memory) and asks a
//! [`DerivativeRenderer`] for image variants; how variants are rendered is
//! up to the renderer.

mod error;
mod local;
mod memory;
mod render;

pub use error::{BlobStoreError, BlobStoreResult};
pub use local::LocalFileStore;
pub use memory::MemoryFileStore;
pub use render::{DerivativeRenderer, IncomingFile, NoDerivatives, RenderedDerivative};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Byte storage for attachment files, addressed by relative path.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Writes (or overwrites) a file.
    async fn write(&self, path: &str, bytes: &[u8]) -> BlobStoreResult<()>;

    /// Deletes a file. Deleting a missing file is an error.
    async fn delete(&self, path: &str) -> BlobStoreResult<()>;

    async fn exists(&self, path: &str) -> BlobStoreResult<bool>;
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Rejects absolute paths and `..` segments.
pub(crate) fn validate_path(path: &str) -> BlobStoreResult<()> {
    if path.is_empty()
        || path.starts_with('/')
        || path.split(['/', '\\']).any(|segment| segment == "..")
    {
        return Err(BlobStoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}
