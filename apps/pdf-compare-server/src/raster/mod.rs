//! Page rasterization
//!
//! Turns uploaded PDFs into per-page bitmaps and per-page text.
//! [`PageRasterizer`] is the seam; [`MupdfRasterizer`] is the production
//! implementation.

mod renderer;
mod types;

pub use renderer::{MupdfRasterizer, DEFAULT_RENDER_SCALE, DEFAULT_RENDER_TIMEOUT_SECS};
pub use types::{PageRasterizer, RasterizeError, RenderedDocument};
