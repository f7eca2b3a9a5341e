//! Export types

use serde::{Deserialize, Serialize};

/// Paper size of the report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageFormat {
    #[default]
    #[serde(rename = "A4", alias = "a4")]
    A4,
    #[serde(rename = "Letter", alias = "letter")]
    Letter,
}

impl PageFormat {
    /// (width, height) in millimetres
    pub fn size_mm(&self) -> (f32, f32) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::Letter => (215.9, 279.4),
        }
    }
}

/// 1-based inclusive page range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

fn default_true() -> bool {
    true
}

/// What goes into the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    #[serde(default = "default_true")]
    pub include_visual_comparison: bool,
    #[serde(default = "default_true")]
    pub include_text_comparison: bool,
    #[serde(default)]
    pub page_range: Option<PageRange>,
    #[serde(default)]
    pub format: PageFormat,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_visual_comparison: true,
            include_text_comparison: true,
            page_range: None,
            format: PageFormat::A4,
        }
    }
}

impl ExportOptions {
    /// 0-based page indices selected for visual pages, given `total` pages
    pub fn visual_pages(&self, total: usize) -> Result<std::ops::Range<usize>, ExportError> {
        match self.page_range {
            None => Ok(0..total),
            Some(PageRange { start, end }) => {
                if start == 0 || end < start {
                    return Err(ExportError::InvalidRange { start, end });
                }
                Ok((start - 1).min(total)..end.min(total))
            }
        }
    }
}

/// A finished report
#[derive(Debug, Clone)]
pub struct ExportedReport {
    pub bytes: Vec<u8>,
    pub file_name: String,
    /// Non-fatal problems, e.g. a page image that could not be embedded
    pub warnings: Vec<String>,
}

/// Export errors
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Invalid page range {start}..={end}")]
    InvalidRange { start: usize, end: usize },

    #[error("Failed to encode page content: {0}")]
    Content(String),

    #[error("Failed to serialize report: {0}")]
    Serialize(String),
}
