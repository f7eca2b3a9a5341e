//! Pixel difference engine
//!
//! Compares two rasterized pages and paints changed pixels magenta. Two
//! visualizations are produced from the same primitives:
//!
//! - **Overlay**: canvas is the union of both pages, changed pixels are
//!   recolored and the new page is blended back on top at 80% opacity.
//! - **Side-by-side highlight**: canvas is the new page, the original is
//!   resampled onto it, and the blend is lighter (60%) because the original is
//!   shown next to it.
//!
//! All pixel math here is synchronous and pure; callers run it on the blocking
//! thread pool.

use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::bitmap::{extend_to_canvas, pixel_or_background, BitmapError, PageImage};

/// Per-channel delta above which an overlay pixel counts as changed
pub const DEFAULT_OVERLAY_THRESHOLD: u8 = 20;
/// Opacity of the new page blended over the overlay canvas
pub const DEFAULT_OVERLAY_BLEND_ALPHA: f32 = 0.8;
/// Per-channel delta above which a side-by-side pixel counts as changed
pub const DEFAULT_SIDE_BY_SIDE_THRESHOLD: u8 = 30;
/// Opacity of the new page blended over the side-by-side canvas
pub const DEFAULT_SIDE_BY_SIDE_BLEND_ALPHA: f32 = 0.6;

/// Highlight color for changed pixels
pub const HIGHLIGHT: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Thresholds and opacities for both visualizations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffConfig {
    pub overlay_threshold: u8,
    pub overlay_blend_alpha: f32,
    pub side_by_side_threshold: u8,
    pub side_by_side_blend_alpha: f32,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            overlay_threshold: DEFAULT_OVERLAY_THRESHOLD,
            overlay_blend_alpha: DEFAULT_OVERLAY_BLEND_ALPHA,
            side_by_side_threshold: DEFAULT_SIDE_BY_SIDE_THRESHOLD,
            side_by_side_blend_alpha: DEFAULT_SIDE_BY_SIDE_BLEND_ALPHA,
        }
    }
}

impl DiffConfig {
    pub fn threshold(&self, mode: DiffMode) -> u8 {
        match mode {
            DiffMode::Overlay => self.overlay_threshold,
            DiffMode::SideBySide => self.side_by_side_threshold,
        }
    }

    pub fn blend_alpha(&self, mode: DiffMode) -> f32 {
        match mode {
            DiffMode::Overlay => self.overlay_blend_alpha,
            DiffMode::SideBySide => self.side_by_side_blend_alpha,
        }
    }

    /// Check that both opacities are in [0, 1]
    pub fn validate(&self) -> Result<(), String> {
        for (name, alpha) in [
            ("overlay_blend_alpha", self.overlay_blend_alpha),
            ("side_by_side_blend_alpha", self.side_by_side_blend_alpha),
        ] {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(format!("{} must be within [0, 1], got {}", name, alpha));
            }
        }
        Ok(())
    }
}

/// Which visualization is being computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMode {
    Overlay,
    SideBySide,
}

impl DiffMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overlay => "overlay",
            Self::SideBySide => "side-by-side",
        }
    }
}

/// Per-pixel change classification over a canvas
#[derive(Debug, Clone)]
pub struct DiffMask {
    width: u32,
    height: u32,
    changed: Vec<bool>,
}

impl DiffMask {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_changed(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.changed[(y as usize) * (self.width as usize) + x as usize]
    }

    pub fn changed_count(&self) -> u64 {
        self.changed.iter().filter(|c| **c).count() as u64
    }

    /// Fraction of canvas pixels that changed (0.0 for an empty canvas)
    pub fn changed_ratio(&self) -> f64 {
        if self.changed.is_empty() {
            return 0.0;
        }
        self.changed_count() as f64 / self.changed.len() as f64
    }
}

/// Canvas covering both pages: (max width, max height)
pub fn canvas_size(a: (u32, u32), b: (u32, u32)) -> (u32, u32) {
    (a.0.max(b.0), a.1.max(b.1))
}

#[inline]
fn exceeds_threshold(a: Rgba<u8>, b: Rgba<u8>, threshold: u8) -> bool {
    (0..3).any(|c| a[c].abs_diff(b[c]) > threshold)
}

/// Classify every canvas pixel by `|new - original|` on the color channels
///
/// Pixels outside either bitmap compare as opaque white.
pub fn difference_mask(
    original: &RgbaImage,
    new: &RgbaImage,
    width: u32,
    height: u32,
    threshold: u8,
) -> DiffMask {
    let mut changed = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            changed.push(exceeds_threshold(
                pixel_or_background(new, x, y),
                pixel_or_background(original, x, y),
                threshold,
            ));
        }
    }
    DiffMask {
        width,
        height,
        changed,
    }
}

/// Paint every changed pixel of `canvas` with [`HIGHLIGHT`]
pub fn recolor_changed(canvas: &mut RgbaImage, mask: &DiffMask) {
    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        if mask.is_changed(x, y) {
            *pixel = HIGHLIGHT;
        }
    }
}

#[inline]
fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[inline]
fn blend_pixel(top: Rgba<u8>, base: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let alpha = (opacity * top[3] as f32 / 255.0).clamp(0.0, 1.0);
    let mix = |t: u8, b: u8| to_channel(t as f32 * alpha + b as f32 * (1.0 - alpha));
    Rgba([
        mix(top[0], base[0]),
        mix(top[1], base[1]),
        mix(top[2], base[2]),
        to_channel(255.0 * alpha + base[3] as f32 * (1.0 - alpha)),
    ])
}

/// Draw `top` over `canvas` at the given opacity
///
/// Only the overlapping region is touched.
pub fn blend_over(canvas: &mut RgbaImage, top: &RgbaImage, opacity: f32) {
    let width = canvas.width().min(top.width());
    let height = canvas.height().min(top.height());
    for y in 0..height {
        for x in 0..width {
            let base = *canvas.get_pixel(x, y);
            canvas.put_pixel(x, y, blend_pixel(*top.get_pixel(x, y), base, opacity));
        }
    }
}

/// Overlay visualization on decoded pixels
///
/// Returns the output canvas together with the pre-blend mask.
pub fn overlay_pixels(
    original: &RgbaImage,
    new: &RgbaImage,
    threshold: u8,
    opacity: f32,
) -> (RgbaImage, DiffMask) {
    let (width, height) = canvas_size(original.dimensions(), new.dimensions());

    let mut canvas = extend_to_canvas(new, width, height);
    let mask = difference_mask(original, new, width, height, threshold);
    recolor_changed(&mut canvas, &mask);
    blend_over(&mut canvas, new, opacity);

    (canvas, mask)
}

/// Side-by-side highlight on decoded pixels
///
/// The canvas is anchored to the new page; the original is resampled onto it.
pub fn side_by_side_pixels(
    original: &RgbaImage,
    new: &RgbaImage,
    threshold: u8,
    opacity: f32,
) -> (RgbaImage, DiffMask) {
    let (width, height) = new.dimensions();
    if width == 0 || height == 0 {
        return (new.clone(), difference_mask(original, new, 0, 0, threshold));
    }

    let resampled: Cow<'_, RgbaImage> = if original.dimensions() == (width, height) {
        Cow::Borrowed(original)
    } else {
        Cow::Owned(imageops::resize(original, width, height, FilterType::Triangle))
    };

    let mask = difference_mask(&resampled, new, width, height, threshold);
    let mut canvas = new.clone();
    recolor_changed(&mut canvas, &mask);
    blend_over(&mut canvas, new, opacity);

    (canvas, mask)
}

/// Encoded result of one visualization
#[derive(Debug, Clone)]
pub struct DiffOutcome {
    pub image: PageImage,
    /// `None` when no comparison took place
    pub changed_pixels: Option<u64>,
}

impl DiffOutcome {
    fn passthrough(image: PageImage) -> Self {
        Self {
            image,
            changed_pixels: None,
        }
    }
}

/// Pixel difference engine bound to a [`DiffConfig`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelDiffEngine {
    config: DiffConfig,
}

impl PixelDiffEngine {
    pub fn new(config: DiffConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Overlay bitmap for a page pair
    pub fn compute_overlay(
        &self,
        original: Option<&PageImage>,
        new: Option<&PageImage>,
    ) -> Option<PageImage> {
        self.run(DiffMode::Overlay, original, new).map(|o| o.image)
    }

    /// Highlighted new-page bitmap for the side-by-side view
    pub fn compute_side_by_side_highlight(
        &self,
        original: Option<&PageImage>,
        new: Option<&PageImage>,
    ) -> Option<PageImage> {
        self.run(DiffMode::SideBySide, original, new)
            .map(|o| o.image)
    }

    /// Run one visualization
    ///
    /// A single present input is returned as-is. A decode or encode failure
    /// falls back to the new page unmodified and is only logged.
    pub fn run(
        &self,
        mode: DiffMode,
        original: Option<&PageImage>,
        new: Option<&PageImage>,
    ) -> Option<DiffOutcome> {
        match (original, new) {
            (None, None) => None,
            (Some(only), None) | (None, Some(only)) => Some(DiffOutcome::passthrough(only.clone())),
            (Some(original), Some(new)) => Some(self.compare(mode, original, new)),
        }
    }

    /// Run one visualization on a complete pair
    pub fn compare(&self, mode: DiffMode, original: &PageImage, new: &PageImage) -> DiffOutcome {
        match self.diff_encoded(mode, original, new) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    mode = mode.as_str(),
                    error = %e,
                    "Pixel diff failed, falling back to new page"
                );
                DiffOutcome::passthrough(new.clone())
            }
        }
    }

    fn diff_encoded(
        &self,
        mode: DiffMode,
        original: &PageImage,
        new: &PageImage,
    ) -> Result<DiffOutcome, BitmapError> {
        let original = original.decode()?;
        let new = new.decode()?;

        let threshold = self.config.threshold(mode);
        let opacity = self.config.blend_alpha(mode);
        let (pixels, mask) = match mode {
            DiffMode::Overlay => overlay_pixels(&original, &new, threshold, opacity),
            DiffMode::SideBySide => side_by_side_pixels(&original, &new, threshold, opacity),
        };
        drop(original);
        drop(new);

        Ok(DiffOutcome {
            image: PageImage::encode(&pixels)?,
            changed_pixels: Some(mask.changed_count()),
        })
    }
}
