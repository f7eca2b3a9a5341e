//! Page bitmaps
//!
//! Rendered pages travel between components as encoded PNG bytes. Pixel
//! buffers only exist for the duration of a single diff computation.

use std::io::Cursor;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{ImageFormat, Rgba, RgbaImage};

/// Fully-opaque white, the background of a document page
pub const PAGE_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Bitmap decode/encode errors
#[derive(Debug, thiserror::Error)]
pub enum BitmapError {
    #[error("Failed to decode page image: {0}")]
    Decode(String),

    #[error("Failed to encode page image: {0}")]
    Encode(String),
}

/// An encoded (PNG) page bitmap
///
/// Cloning is cheap: the bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    data: Arc<[u8]>,
}

impl PageImage {
    /// Wrap already-encoded image bytes
    pub fn from_encoded(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    /// Encode a pixel buffer as PNG
    pub fn encode(pixels: &RgbaImage) -> Result<Self, BitmapError> {
        let mut buffer = Vec::new();
        pixels
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| BitmapError::Encode(e.to_string()))?;
        Ok(Self::from_encoded(buffer))
    }

    /// Decode into an RGBA pixel buffer
    pub fn decode(&self) -> Result<RgbaImage, BitmapError> {
        image::load_from_memory(&self.data)
            .map(|img| img.to_rgba8())
            .map_err(|e| BitmapError::Decode(e.to_string()))
    }

    /// Raw encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `data:` URL for embedding in JSON responses
    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", BASE64.encode(&self.data))
    }
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Pixel at (x, y), or opaque white when outside the bitmap
#[inline]
pub fn pixel_or_background(img: &RgbaImage, x: u32, y: u32) -> Rgba<u8> {
    if x < img.width() && y < img.height() {
        *img.get_pixel(x, y)
    } else {
        PAGE_BACKGROUND
    }
}

/// Copy `img` onto a white canvas of the given size
pub fn extend_to_canvas(img: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if img.width() == width && img.height() == height {
        return img.clone();
    }
    RgbaImage::from_fn(width, height, |x, y| pixel_or_background(img, x, y))
}
