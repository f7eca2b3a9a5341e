//! Comparison sessions
//!
//! A session holds both rendered documents, the per-page artifacts, the view
//! state (page cursor and mode) and the narrative of one comparison.

mod manager;
mod types;

pub use manager::SessionManager;
pub use types::{
    ComparisonSession, DocumentSummary, SessionError, SessionSnapshot, SessionStatus,
    VisualizationMode, PROCESSING_FAILED, SESSION_EXPIRY_HOURS,
};
