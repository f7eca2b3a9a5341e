//! MuPDF page rasterizer
//!
//! Renders every page of a PDF to an RGBA bitmap and extracts its plain text.
//! MuPDF work is CPU-bound, so the whole document is processed on the blocking
//! thread pool under a timeout.

use async_trait::async_trait;
use image::RgbaImage;
use mupdf::{Colorspace, Document, Matrix, Pixmap, TextPageOptions};
use tokio::time::{timeout, Duration};

use crate::diff::PageImage;

use super::types::{PageRasterizer, RasterizeError, RenderedDocument};

/// Default render scale (1.0 = 72 DPI)
pub const DEFAULT_RENDER_SCALE: f32 = 1.5;
/// Timeout for rasterizing a whole document
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 120;

const PDF_MIME: &str = "application/pdf";

/// Rasterizer backed by MuPDF
#[derive(Debug, Clone)]
pub struct MupdfRasterizer {
    scale: f32,
    timeout_secs: u64,
}

impl Default for MupdfRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_SCALE, DEFAULT_RENDER_TIMEOUT_SECS)
    }
}

impl MupdfRasterizer {
    pub fn new(scale: f32, timeout_secs: u64) -> Self {
        Self {
            scale: scale.clamp(0.1, 4.0),
            timeout_secs,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

#[async_trait]
impl PageRasterizer for MupdfRasterizer {
    async fn render(&self, name: &str, data: Vec<u8>) -> Result<RenderedDocument, RasterizeError> {
        if !data.starts_with(b"%PDF") {
            return Err(RasterizeError::InvalidDocument {
                name: name.to_string(),
                reason: "missing %PDF header".to_string(),
            });
        }

        let scale = self.scale;
        let name_owned = name.to_string();
        let result = timeout(
            Duration::from_secs(self.timeout_secs),
            tokio::task::spawn_blocking(move || render_document(name_owned, &data, scale)),
        )
        .await;

        let document = match result {
            Ok(join_result) => join_result.map_err(|e| RasterizeError::Join(e.to_string()))??,
            Err(_) => return Err(RasterizeError::Timeout(self.timeout_secs)),
        };

        tracing::info!(
            document = %document.name,
            pages = document.page_count(),
            scale = scale,
            "Rasterized document"
        );

        Ok(document)
    }
}

fn render_document(name: String, data: &[u8], scale: f32) -> Result<RenderedDocument, RasterizeError> {
    let doc = Document::from_bytes(data, PDF_MIME)?;
    let page_count = doc.page_count()?.max(0) as usize;
    if page_count == 0 {
        return Err(RasterizeError::InvalidDocument {
            name,
            reason: "document has no pages".to_string(),
        });
    }

    let matrix = Matrix::new_scale(scale, scale);
    let colorspace = Colorspace::device_rgb();

    let mut pages = Vec::with_capacity(page_count);
    let mut images = Vec::with_capacity(page_count);

    for index in 0..page_count {
        let page_number = index + 1;
        let render_err = |e: mupdf::Error| RasterizeError::Render {
            page: page_number,
            message: e.to_string(),
        };

        let page = doc.load_page(index as i32).map_err(render_err)?;

        let text = page
            .to_text_page(TextPageOptions::empty())
            .and_then(|text_page| text_page.to_text())
            .map_err(render_err)?;

        // No alpha channel: pages render onto an opaque white background
        let pixmap = page
            .to_pixmap(&matrix, &colorspace, false, true)
            .map_err(render_err)?;
        let pixels = pixmap_to_rgba(&pixmap).ok_or_else(|| RasterizeError::Render {
            page: page_number,
            message: "pixmap sample buffer too small".to_string(),
        })?;
        drop(pixmap);

        let image = PageImage::encode(&pixels).map_err(|source| RasterizeError::Encode {
            page: page_number,
            source,
        })?;

        pages.push(text.trim().to_string());
        images.push(image);
    }

    Ok(RenderedDocument::from_pages(name, pages, images))
}

/// Expand a MuPDF pixmap (RGB or RGBA samples) into an RGBA buffer
fn pixmap_to_rgba(pixmap: &Pixmap) -> Option<RgbaImage> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    if n < 3 || samples.len() < width as usize * height as usize * n {
        return None;
    }

    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for pixel in samples.chunks_exact(n).take(width as usize * height as usize) {
        let alpha = if n >= 4 { pixel[3] } else { 255 };
        rgba.extend_from_slice(&[pixel[0], pixel[1], pixel[2], alpha]);
    }

    RgbaImage::from_raw(width, height, rgba)
}
