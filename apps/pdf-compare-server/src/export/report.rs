//! Comparison report writer
//!
//! Lays out a title page, the change narrative and one page per selected
//! overlay, then serializes the result with lopdf. Positions are tracked in
//! millimetres from the top-left corner and converted to PDF user space when
//! operations are emitted.

use std::collections::HashMap;

use chrono::NaiveDate;
use image::RgbaImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::diff::{PageImage, PAGE_BACKGROUND};
use crate::narrative::{ChangeNarrative, NarrativeLine};

use super::layout::{mm_to_pt, printable_ascii, to_win_ansi, wrap_text};
use super::types::{ExportError, ExportOptions, ExportedReport, PageFormat};

const MARGIN: f32 = 20.0;
/// Narrative text moves to a new page once the cursor passes `height - TEXT_BOTTOM`
const TEXT_BOTTOM: f32 = 30.0;
/// Room kept under a visual for its legend
const LEGEND_SPACE: f32 = 20.0;
const ITEM_INDENT: f32 = 5.0;

pub const REPORT_TITLE: &str = "PDF Comparison Report";
pub const LEGEND: &str = "Magenta highlights indicate differences between documents";

/// Everything the report is built from
pub struct ReportInput<'a> {
    pub original_name: &'a str,
    pub new_name: &'a str,
    pub narrative: Option<&'a ChangeNarrative>,
    /// Overlay bitmaps by 0-based page index
    pub overlays: &'a HashMap<usize, PageImage>,
    pub total_pages: usize,
    pub generated_on: NaiveDate,
}

/// Report file name for a date
pub fn report_file_name(date: NaiveDate) -> String {
    format!("comparison-report-{}.pdf", date.format("%Y-%m-%d"))
}

/// Build the comparison report
///
/// An overlay that cannot be decoded is replaced by an error line and
/// reported in `warnings`; only serialization failures abort the export.
pub fn export_report(input: &ReportInput<'_>, options: &ExportOptions) -> Result<ExportedReport, ExportError> {
    let visual_pages = options.visual_pages(input.total_pages)?;
    let mut writer = ReportWriter::new(options.format);
    let mut warnings = Vec::new();

    write_title(&mut writer, input);

    if options.include_text_comparison {
        if let Some(narrative) = input.narrative {
            write_narrative(&mut writer, narrative);
        }
    }

    if options.include_visual_comparison {
        for index in visual_pages {
            let Some(overlay) = input.overlays.get(&index) else {
                continue;
            };
            if let Err(message) = write_visual_page(&mut writer, index + 1, overlay) {
                tracing::warn!(page = index + 1, error = %message, "Failed to embed page visual");
                warnings.push(format!("page {}: {}", index + 1, message));
            }
        }
    }

    let page_count = writer.page_count();
    let bytes = writer.finish()?;

    tracing::info!(
        pages = page_count,
        size = bytes.len(),
        warnings = warnings.len(),
        "Exported comparison report"
    );

    Ok(ExportedReport {
        bytes,
        file_name: report_file_name(input.generated_on),
        warnings,
    })
}

fn write_title(writer: &mut ReportWriter, input: &ReportInput<'_>) {
    writer.text(Font::Bold, 24.0, MARGIN, REPORT_TITLE);
    writer.advance(15.0);

    writer.text(
        Font::Regular,
        12.0,
        MARGIN,
        &format!("Generated on: {}", input.generated_on.format("%Y-%m-%d")),
    );
    writer.advance(10.0);
    writer.text(
        Font::Regular,
        12.0,
        MARGIN,
        &format!("Original Document: {}", printable_ascii(input.original_name)),
    );
    writer.advance(7.0);
    writer.text(
        Font::Regular,
        12.0,
        MARGIN,
        &format!("New Document: {}", printable_ascii(input.new_name)),
    );
    writer.advance(20.0);
}

fn write_narrative(writer: &mut ReportWriter, narrative: &ChangeNarrative) {
    writer.text(Font::Bold, 18.0, MARGIN, "Document Changes");
    writer.advance(15.0);

    let content_width = writer.content_width();
    let text_limit = writer.height() - TEXT_BOTTOM;

    for line in narrative.lines() {
        if writer.y > text_limit {
            writer.add_page();
        }

        match line {
            NarrativeLine::Header { text } => {
                let wrapped = wrap_text(&text, content_width, 11.0);
                writer.text_block(Font::Bold, 11.0, MARGIN, &wrapped, 7.0);
                writer.advance(wrapped.len() as f32 * 7.0 + 5.0);
            }
            NarrativeLine::Item {
                text,
                bulleted,
                indented,
            } => {
                let indent = if indented { ITEM_INDENT * 2.0 } else { ITEM_INDENT };
                let text = if bulleted { format!("• {}", text) } else { text };
                let wrapped = wrap_text(&text, content_width - indent, 11.0);
                writer.text_block(Font::Regular, 11.0, MARGIN + indent, &wrapped, 6.0);
                writer.advance(wrapped.len() as f32 * 6.0 + 4.0);
            }
        }
    }
}

fn write_visual_page(writer: &mut ReportWriter, page: usize, overlay: &PageImage) -> Result<(), String> {
    let heading = format!("Visual Comparison - Page {}", page);

    writer.add_page();
    writer.text(Font::Bold, 16.0, MARGIN, &heading);
    writer.advance(15.0);

    let pixels = match overlay.decode() {
        Ok(pixels) if pixels.width() > 0 && pixels.height() > 0 => pixels,
        Ok(_) => return Err(writer.image_error(page, "empty image")),
        Err(e) => return Err(writer.image_error(page, &e.to_string())),
    };

    let aspect = pixels.width() as f32 / pixels.height() as f32;
    let mut width = writer.content_width();
    let mut height = width / aspect;

    let max_height = writer.height() - writer.y - MARGIN - LEGEND_SPACE;
    if height > max_height {
        height = max_height;
        width = height * aspect;
    }

    if writer.y + height > writer.height() - MARGIN {
        writer.add_page();
        writer.text(Font::Bold, 16.0, MARGIN, &heading);
        writer.advance(15.0);
    }

    writer.image(&pixels, MARGIN, width, height);
    writer.advance(height + 10.0);
    writer.text(Font::Italic, 10.0, MARGIN, LEGEND);

    Ok(())
}

// ============================================================================
// Writer
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    const ALL: [Font; 3] = [Font::Regular, Font::Bold, Font::Italic];

    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Italic => "Helvetica-Oblique",
        }
    }
}

#[derive(Default)]
struct PageContent {
    operations: Vec<Operation>,
    images: Vec<(String, ObjectId)>,
}

struct ReportWriter {
    doc: Document,
    format: PageFormat,
    pages: Vec<PageContent>,
    /// Cursor from the top edge, in millimetres
    y: f32,
}

impl ReportWriter {
    fn new(format: PageFormat) -> Self {
        Self {
            doc: Document::with_version("1.5"),
            format,
            pages: vec![PageContent::default()],
            y: MARGIN,
        }
    }

    fn width(&self) -> f32 {
        self.format.size_mm().0
    }

    fn height(&self) -> f32 {
        self.format.size_mm().1
    }

    fn content_width(&self) -> f32 {
        self.width() - MARGIN * 2.0
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn add_page(&mut self) {
        self.pages.push(PageContent::default());
        self.y = MARGIN;
    }

    fn advance(&mut self, mm: f32) {
        self.y += mm;
    }

    fn current(&mut self) -> &mut PageContent {
        if self.pages.is_empty() {
            self.pages.push(PageContent::default());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// PDF y coordinate for a distance from the top edge
    fn baseline(&self, y_mm: f32) -> f32 {
        mm_to_pt(self.height() - y_mm)
    }

    /// One line with its baseline at the cursor
    fn text(&mut self, font: Font, size: f32, x_mm: f32, text: &str) {
        let y = self.baseline(self.y);
        self.current().operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.resource().into(), size.into()]),
            Operation::new("Td", vec![mm_to_pt(x_mm).into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(to_win_ansi(text))]),
            Operation::new("ET", vec![]),
        ]);
    }

    /// Consecutive lines starting at the cursor, `leading` mm apart
    fn text_block(&mut self, font: Font, size: f32, x_mm: f32, lines: &[String], leading: f32) {
        let top = self.y;
        for (i, line) in lines.iter().enumerate() {
            self.y = top + i as f32 * leading;
            self.text(font, size, x_mm, line);
        }
        self.y = top;
    }

    fn image_error(&mut self, page: usize, reason: &str) -> String {
        self.text(
            Font::Regular,
            10.0,
            MARGIN,
            &format!("Error loading visual comparison for page {}", page),
        );
        reason.to_string()
    }

    /// Draw an image with its top-left corner at (`x_mm`, cursor)
    fn image(&mut self, pixels: &RgbaImage, x_mm: f32, width_mm: f32, height_mm: f32) {
        let stream = Stream::new(
            Dictionary::from_iter([
                ("Type", Object::Name(b"XObject".to_vec())),
                ("Subtype", Object::Name(b"Image".to_vec())),
                ("Width", Object::Integer(pixels.width() as i64)),
                ("Height", Object::Integer(pixels.height() as i64)),
                ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
                ("BitsPerComponent", Object::Integer(8)),
            ]),
            flatten_rgb(pixels),
        );
        let image_id = self.doc.add_object(stream);

        let bottom = self.baseline(self.y + height_mm);
        let page = self.current();
        let name = format!("Im{}", page.images.len() + 1);
        page.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    mm_to_pt(width_mm).into(),
                    0.into(),
                    0.into(),
                    mm_to_pt(height_mm).into(),
                    mm_to_pt(x_mm).into(),
                    bottom.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.clone().into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        page.images.push((name, image_id));
    }

    fn finish(mut self) -> Result<Vec<u8>, ExportError> {
        let pages_id = self.doc.new_object_id();

        let fonts: Vec<(&str, Object)> = Font::ALL
            .iter()
            .map(|font| {
                let id = self.doc.add_object(Dictionary::from_iter([
                    ("Type", Object::Name(b"Font".to_vec())),
                    ("Subtype", Object::Name(b"Type1".to_vec())),
                    ("BaseFont", Object::Name(font.base_font().as_bytes().to_vec())),
                    ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
                ]));
                (font.resource(), Object::Reference(id))
            })
            .collect();
        let font_dict = Dictionary::from_iter(fonts);

        let media_box = Object::Array(vec![
            0.into(),
            0.into(),
            mm_to_pt(self.width()).into(),
            mm_to_pt(self.height()).into(),
        ]);

        let mut kids = Vec::with_capacity(self.pages.len());
        for page in std::mem::take(&mut self.pages) {
            let content = Content {
                operations: page.operations,
            }
            .encode()
            .map_err(|e| ExportError::Content(e.to_string()))?;
            let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content));

            let xobjects = Dictionary::from_iter(
                page.images
                    .into_iter()
                    .map(|(name, id)| (name, Object::Reference(id))),
            );
            let resources = Dictionary::from_iter([
                ("Font", Object::Dictionary(font_dict.clone())),
                ("XObject", Object::Dictionary(xobjects)),
            ]);

            let page_id = self.doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("MediaBox", media_box.clone()),
                ("Contents", Object::Reference(content_id)),
                ("Resources", Object::Dictionary(resources)),
            ]));
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        self.doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(kids)),
                ("Count", Object::Integer(count)),
            ])),
        );

        let catalog_id = self.doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        let info_id = self.doc.add_object(Dictionary::from_iter([
            ("Title", Object::string_literal(REPORT_TITLE)),
            ("Producer", Object::string_literal("pdf-compare-server")),
        ]));
        self.doc.trailer.set("Root", Object::Reference(catalog_id));
        self.doc.trailer.set("Info", Object::Reference(info_id));

        self.doc.compress();

        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| ExportError::Serialize(e.to_string()))?;
        Ok(output)
    }
}

/// Drop the alpha channel by compositing onto the page background
fn flatten_rgb(pixels: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.width() as usize * pixels.height() as usize * 3);
    for pixel in pixels.pixels() {
        let alpha = pixel[3] as u32;
        for c in 0..3 {
            let value = (pixel[c] as u32 * alpha + PAGE_BACKGROUND[c] as u32 * (255 - alpha) + 127) / 255;
            rgb.push(value as u8);
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::types::PageRange;
    use crate::raster::testing::solid_page;
    use image::Rgba;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    fn overlays(count: usize) -> HashMap<usize, PageImage> {
        (0..count)
            .map(|i| (i, solid_page(40, 60, [255, 0, 255, 255])))
            .collect()
    }

    fn input<'a>(
        narrative: Option<&'a ChangeNarrative>,
        overlays: &'a HashMap<usize, PageImage>,
        total_pages: usize,
    ) -> ReportInput<'a> {
        ReportInput {
            original_name: "contract-v1.pdf",
            new_name: "contract-v2.pdf",
            narrative,
            overlays,
            total_pages,
            generated_on: date(),
        }
    }

    fn page_count(bytes: &[u8]) -> usize {
        Document::load_mem(bytes).unwrap().get_pages().len()
    }

    #[test]
    fn test_file_name() {
        assert_eq!(report_file_name(date()), "comparison-report-2024-03-09.pdf");
    }

    #[test]
    fn test_title_text_and_visual_pages() {
        let narrative = ChangeNarrative::new("• Totals:\n  • 10 → 12");
        let overlays = overlays(2);

        let report = export_report(&input(Some(&narrative), &overlays, 2), &ExportOptions::default()).unwrap();

        assert!(report.bytes.starts_with(b"%PDF-1.5"));
        assert_eq!(report.file_name, "comparison-report-2024-03-09.pdf");
        assert!(report.warnings.is_empty());
        assert_eq!(page_count(&report.bytes), 3);
    }

    #[test]
    fn test_sections_can_be_disabled() {
        let narrative = ChangeNarrative::new("• changed");
        let overlays = overlays(3);
        let options = ExportOptions {
            include_visual_comparison: false,
            include_text_comparison: false,
            ..ExportOptions::default()
        };

        let report = export_report(&input(Some(&narrative), &overlays, 3), &options).unwrap();
        assert_eq!(page_count(&report.bytes), 1);
    }

    #[test]
    fn test_page_range_selects_visual_pages() {
        let overlays = overlays(3);
        let options = ExportOptions {
            page_range: Some(PageRange { start: 2, end: 2 }),
            format: PageFormat::Letter,
            ..ExportOptions::default()
        };

        let report = export_report(&input(None, &overlays, 3), &options).unwrap();
        assert_eq!(page_count(&report.bytes), 2);
    }

    #[test]
    fn test_long_narrative_paginates() {
        let summary = (0..200)
            .map(|i| format!("• Value {} changed from a long description to another long description", i))
            .collect::<Vec<_>>()
            .join("\n");
        let narrative = ChangeNarrative::new(summary);
        let overlays = HashMap::new();

        let report = export_report(&input(Some(&narrative), &overlays, 0), &ExportOptions::default()).unwrap();
        assert!(page_count(&report.bytes) > 5);
    }

    #[test]
    fn test_broken_overlay_becomes_warning() {
        let mut overlays = overlays(2);
        overlays.insert(1, PageImage::from_encoded(b"not a png".to_vec()));

        let report = export_report(&input(None, &overlays, 2), &ExportOptions::default()).unwrap();

        assert_eq!(page_count(&report.bytes), 3);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("page 2:"));
    }

    #[test]
    fn test_missing_overlays_are_skipped() {
        let mut overlays = overlays(3);
        overlays.remove(&1);

        let report = export_report(&input(None, &overlays, 3), &ExportOptions::default()).unwrap();
        assert_eq!(page_count(&report.bytes), 3);
    }

    #[test]
    fn test_invalid_range_is_rejected() {
        let overlays = overlays(1);
        let options = ExportOptions {
            page_range: Some(PageRange { start: 0, end: 1 }),
            ..ExportOptions::default()
        };
        assert!(matches!(
            export_report(&input(None, &overlays, 1), &options),
            Err(ExportError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_flatten_rgb_composites_on_white() {
        let pixels = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        assert_eq!(flatten_rgb(&pixels), vec![255, 255, 255]);

        let pixels = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 255, 255]));
        assert_eq!(flatten_rgb(&pixels), vec![255, 0, 255]);
    }
}
