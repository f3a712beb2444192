//! Image derivative rendering seam.

use crate::error::BlobStoreResult;
use async_trait::async_trait;
use folio_model::ImageSize;

/// An uploaded file as received with an update request.
#[derive(Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    /// Pixel dimensions, when the upload layer already knows them.
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl IncomingFile {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            data,
            width: None,
            height: None,
        }
    }

    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

impl std::fmt::Debug for IncomingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingFile")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// A rendered variant of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDerivative {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

/// Produces image variants for configured sizes.
///
/// Returning `Ok(None)` skips the size (for example when the source is
/// smaller than the target).
#[async_trait]
pub trait DerivativeRenderer: Send + Sync {
    async fn render(&self, file: &IncomingFile, size: &ImageSize) -> BlobStoreResult<Option<RenderedDerivative>>;
}

/// Renderer that produces no variants.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDerivatives;

#[async_trait]
impl DerivativeRenderer for NoDerivatives {
    async fn render(&self, _file: &IncomingFile, _size: &ImageSize) -> BlobStoreResult<Option<RenderedDerivative>> {
        Ok(None)
    }
}
