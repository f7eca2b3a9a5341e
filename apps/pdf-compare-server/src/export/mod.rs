//! Report export
//!
//! Serializes the narrative and the page overlays of a comparison into a
//! paginated PDF.

mod layout;
mod report;
mod types;

pub use report::{export_report, report_file_name, ReportInput, LEGEND, REPORT_TITLE};
pub use types::{ExportError, ExportOptions, ExportedReport, PageFormat, PageRange};
