//! Visual difference module
//!
//! Pixel-level comparison of rasterized pages.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pdf_compare_server::diff::{DiffConfig, PixelDiffEngine};
//!
//! let engine = PixelDiffEngine::new(DiffConfig::default());
//! let overlay = engine.compute_overlay(Some(&original_page), Some(&new_page));
//! let highlight = engine.compute_side_by_side_highlight(Some(&original_page), Some(&new_page));
//! ```

mod bitmap;
mod engine;

pub use bitmap::{extend_to_canvas, BitmapError, PageImage, PAGE_BACKGROUND};
pub use engine::{
    blend_over, canvas_size, difference_mask, overlay_pixels, recolor_changed,
    side_by_side_pixels, DiffConfig, DiffMask, DiffMode, DiffOutcome, PixelDiffEngine,
    DEFAULT_OVERLAY_BLEND_ALPHA, DEFAULT_OVERLAY_THRESHOLD, DEFAULT_SIDE_BY_SIDE_BLEND_ALPHA,
    DEFAULT_SIDE_BY_SIDE_THRESHOLD, HIGHLIGHT,
};
