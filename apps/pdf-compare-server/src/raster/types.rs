//! Rasterizer types

use async_trait::async_trait;

use crate::diff::{BitmapError, PageImage};

/// A document rendered page by page
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// Original file name
    pub name: String,
    /// Full plain text (page texts separated by blank lines)
    pub text: String,
    /// Plain text per page, in page order
    pub pages: Vec<String>,
    /// One bitmap per page, in page order
    pub images: Vec<PageImage>,
}

impl RenderedDocument {
    /// Assemble a document from per-page text and bitmaps
    pub fn from_pages(name: impl Into<String>, pages: Vec<String>, images: Vec<PageImage>) -> Self {
        let text = pages
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        Self {
            name: name.into(),
            text,
            pages,
            images,
        }
    }

    pub fn page_count(&self) -> usize {
        self.images.len()
    }
}

/// Rasterization errors
///
/// Any of these aborts the comparison it belongs to.
#[derive(Debug, thiserror::Error)]
pub enum RasterizeError {
    #[error("Invalid document '{name}': {reason}")]
    InvalidDocument { name: String, reason: String },

    #[error("Failed to load document: {0}")]
    Load(String),

    #[error("Failed to render page {page}: {message}")]
    Render { page: usize, message: String },

    #[error("Failed to encode page {page}: {source}")]
    Encode {
        page: usize,
        #[source]
        source: BitmapError,
    },

    #[error("Rendering timed out after {0} seconds")]
    Timeout(u64),

    #[error("Task join error: {0}")]
    Join(String),
}

impl From<mupdf::Error> for RasterizeError {
    fn from(err: mupdf::Error) -> Self {
        RasterizeError::Load(err.to_string())
    }
}

/// Converts a PDF into page bitmaps and page text
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Render every page of `data`
    async fn render(&self, name: &str, data: Vec<u8>) -> Result<RenderedDocument, RasterizeError>;
}
