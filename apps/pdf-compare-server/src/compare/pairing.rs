//! Page pairing
//!
//! Pages are aligned by index, not by content. Index `i` (0-based storage)
//! is page `i + 1` everywhere a user sees it.

use serde::Serialize;

use crate::diff::{DiffMode, PageImage, PixelDiffEngine};

/// Which documents have a page at a given index
#[derive(Debug, Clone)]
pub enum PageSides {
    Both { original: PageImage, new: PageImage },
    OriginalOnly(PageImage),
    NewOnly(PageImage),
}

/// Original and new bitmap for one page index
///
/// At least one side is always present.
#[derive(Debug, Clone)]
pub struct PagePair {
    index: usize,
    sides: PageSides,
}

impl PagePair {
    /// Build a pair; `None` when both sides are absent
    pub fn new(index: usize, original: Option<PageImage>, new: Option<PageImage>) -> Option<Self> {
        let sides = match (original, new) {
            (Some(original), Some(new)) => PageSides::Both { original, new },
            (Some(original), None) => PageSides::OriginalOnly(original),
            (None, Some(new)) => PageSides::NewOnly(new),
            (None, None) => return None,
        };
        Some(Self { index, sides })
    }

    /// 0-based storage index
    pub fn index(&self) -> usize {
        self.index
    }

    /// 1-based page number
    pub fn page_number(&self) -> usize {
        self.index + 1
    }

    pub fn sides(&self) -> &PageSides {
        &self.sides
    }

    pub fn original(&self) -> Option<&PageImage> {
        match &self.sides {
            PageSides::Both { original, .. } | PageSides::OriginalOnly(original) => Some(original),
            PageSides::NewOnly(_) => None,
        }
    }

    pub fn new_page(&self) -> Option<&PageImage> {
        match &self.sides {
            PageSides::Both { new, .. } | PageSides::NewOnly(new) => Some(new),
            PageSides::OriginalOnly(_) => None,
        }
    }

    /// Both sides present
    pub fn is_complete(&self) -> bool {
        matches!(self.sides, PageSides::Both { .. })
    }
}

/// Number of pages in a comparison
pub fn total_pages(original: usize, new: usize) -> usize {
    original.max(new)
}

/// Pair pages by index, padding the shorter document with empty slots
pub fn pair_pages(original: &[PageImage], new: &[PageImage]) -> Vec<PagePair> {
    (0..total_pages(original.len(), new.len()))
        .filter_map(|i| PagePair::new(i, original.get(i).cloned(), new.get(i).cloned()))
        .collect()
}

/// Visual comparison result for one page
#[derive(Debug, Clone)]
pub struct DiffArtifact {
    page_index: usize,
    overlay: PageImage,
    highlight: Option<PageImage>,
    changed_pixels: Option<u64>,
}

impl DiffArtifact {
    /// 0-based storage index
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// 1-based page number
    pub fn page_number(&self) -> usize {
        self.page_index + 1
    }

    /// Overlay bitmap (or the only page available)
    pub fn overlay(&self) -> &PageImage {
        &self.overlay
    }

    /// Side-by-side highlight; `None` when the page exists in one document only
    pub fn highlight(&self) -> Option<&PageImage> {
        self.highlight.as_ref()
    }

    /// Pixels flagged in overlay mode; `None` when no comparison took place
    pub fn changed_pixels(&self) -> Option<u64> {
        self.changed_pixels
    }

    /// Artifact holding the pair's preferred page without any comparison
    ///
    /// New is preferred over original.
    pub fn passthrough(pair: &PagePair) -> Self {
        let page = match &pair.sides {
            PageSides::Both { new, .. } | PageSides::NewOnly(new) => new,
            PageSides::OriginalOnly(original) => original,
        };
        Self {
            page_index: pair.index,
            overlay: page.clone(),
            highlight: None,
            changed_pixels: None,
        }
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            page: self.page_number(),
            has_highlight: self.highlight.is_some(),
            changed_pixels: self.changed_pixels,
        }
    }
}

/// Serializable per-page summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSummary {
    pub page: usize,
    pub has_highlight: bool,
    pub changed_pixels: Option<u64>,
}

/// Diff one page pair
///
/// Complete pairs get both visualizations. A one-sided pair uses its only
/// page (new preferred) as overlay and has no highlight.
pub fn compare_pair(engine: &PixelDiffEngine, pair: &PagePair) -> DiffArtifact {
    match &pair.sides {
        PageSides::Both { original, new } => {
            let overlay = engine.compare(DiffMode::Overlay, original, new);
            let highlight = engine.compare(DiffMode::SideBySide, original, new);
            DiffArtifact {
                page_index: pair.index,
                overlay: overlay.image,
                highlight: Some(highlight.image),
                changed_pixels: overlay.changed_pixels,
            }
        }
        PageSides::NewOnly(_) | PageSides::OriginalOnly(_) => DiffArtifact::passthrough(pair),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::testing::solid_page;

    fn pages(count: usize, color: [u8; 4]) -> Vec<PageImage> {
        (0..count).map(|i| solid_page(8 + i as u32, 8, color)).collect()
    }

    #[test]
    fn test_pair_requires_one_side() {
        assert!(PagePair::new(0, None, None).is_none());
        let pair = PagePair::new(2, None, Some(solid_page(2, 2, [0, 0, 0, 255]))).unwrap();
        assert_eq!(pair.page_number(), 3);
        assert!(!pair.is_complete());
    }

    #[test]
    fn test_pairing_pads_shorter_document() {
        let original = pages(3, [255, 255, 255, 255]);
        let new = pages(2, [255, 255, 255, 255]);

        let pairs = pair_pages(&original, &new);
        assert_eq!(pairs.len(), 3);
        assert!(pairs[0].is_complete());
        assert!(pairs[1].is_complete());
        assert!(pairs[2].new_page().is_none());
        assert_eq!(pairs[2].original(), Some(&original[2]));
    }

    #[test]
    fn test_one_sided_pairs_use_existing_page() {
        let engine = PixelDiffEngine::default();
        let only_new = PagePair::new(4, None, Some(solid_page(3, 3, [1, 2, 3, 255]))).unwrap();
        let artifact = compare_pair(&engine, &only_new);

        assert_eq!(artifact.page_index(), 4);
        assert_eq!(artifact.overlay(), only_new.new_page().unwrap());
        assert!(artifact.highlight().is_none());
        assert!(artifact.changed_pixels().is_none());
    }

    #[test]
    fn test_complete_pairs_get_both_visualizations() {
        let engine = PixelDiffEngine::default();
        let pair = PagePair::new(
            0,
            Some(solid_page(4, 4, [255, 255, 255, 255])),
            Some(solid_page(4, 4, [0, 0, 0, 255])),
        )
        .unwrap();

        let artifact = compare_pair(&engine, &pair);
        assert!(artifact.highlight().is_some());
        assert_eq!(artifact.changed_pixels(), Some(16));

        let summary = artifact.summary();
        assert_eq!(summary.page, 1);
        assert!(summary.has_highlight);
    }
}
