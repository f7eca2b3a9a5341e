//! Comparison session types

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compare::{total_pages, ArtifactSummary, DiffArtifact};
use crate::diff::PageImage;
use crate::narrative::ChangeNarrative;
use crate::raster::RenderedDocument;

// ============================================================================
// Constants
// ============================================================================

/// Session expiry time: 24 hours
pub const SESSION_EXPIRY_HOURS: i64 = 24;

/// Message stored on a session whose documents could not be rasterized
pub const PROCESSING_FAILED: &str = "failed to process document";

// ============================================================================
// Enums
// ============================================================================

/// Comparison lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No comparison in flight and no results
    Idle,
    /// Rasterization and diff running
    Rendering,
    /// Artifacts available
    Ready,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Rendering => "rendering",
            Self::Ready => "ready",
        }
    }
}

/// Active visualization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisualizationMode {
    #[default]
    #[serde(rename = "overlay")]
    Overlay,
    #[serde(rename = "side-by-side")]
    SideBySide,
}

// ============================================================================
// Session
// ============================================================================

/// State of one comparison
#[derive(Debug, Clone)]
pub struct ComparisonSession {
    /// Unique session ID
    pub id: Uuid,

    /// Bumped on every reset; background writes carry the value they started with
    pub generation: u64,

    pub status: SessionStatus,

    pub original: Option<Arc<RenderedDocument>>,
    pub new: Option<Arc<RenderedDocument>>,

    /// One artifact per page index, in page order
    pub artifacts: Vec<DiffArtifact>,

    /// Overlay bitmaps by 0-based page index, read by export
    pub export_overlays: HashMap<usize, PageImage>,

    /// 1-based page cursor
    pub current_page: usize,

    pub mode: VisualizationMode,

    pub narrative: Option<ChangeNarrative>,
    pub narrative_pending: bool,
    pub narrative_error: Option<String>,

    /// Last comparison error
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ComparisonSession {
    pub fn new(expiry_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            generation: 0,
            status: SessionStatus::Idle,
            original: None,
            new: None,
            artifacts: Vec::new(),
            export_overlays: HashMap::new(),
            current_page: 1,
            mode: VisualizationMode::default(),
            narrative: None,
            narrative_pending: false,
            narrative_error: None,
            error: None,
            created_at: now,
            expires_at: now + chrono::Duration::hours(expiry_hours),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Clear all comparison state and invalidate in-flight work
    ///
    /// The visualization mode is kept.
    pub fn reset(&mut self) -> u64 {
        self.generation += 1;
        self.status = SessionStatus::Idle;
        self.original = None;
        self.new = None;
        self.artifacts.clear();
        self.export_overlays.clear();
        self.current_page = 1;
        self.narrative = None;
        self.narrative_pending = false;
        self.narrative_error = None;
        self.error = None;
        self.generation
    }

    /// Pages in the current comparison (0 before documents are attached)
    pub fn total_pages(&self) -> usize {
        let count = |doc: &Option<Arc<RenderedDocument>>| doc.as_ref().map_or(0, |d| d.page_count());
        total_pages(count(&self.original), count(&self.new))
    }

    /// Artifact for a 1-based page number
    pub fn artifact(&self, page: usize) -> Option<&DiffArtifact> {
        page.checked_sub(1).and_then(|index| self.artifacts.get(index))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            generation: self.generation,
            status: self.status,
            original: self.original.as_deref().map(DocumentSummary::from),
            new: self.new.as_deref().map(DocumentSummary::from),
            total_pages: self.total_pages(),
            current_page: self.current_page,
            mode: self.mode,
            narrative: self.narrative.clone(),
            narrative_pending: self.narrative_pending,
            narrative_error: self.narrative_error.clone(),
            error: self.error.clone(),
            pages: self.artifacts.iter().map(DiffArtifact::summary).collect(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

// ============================================================================
// Snapshot Types
// ============================================================================

/// Uploaded document as seen by clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub name: String,
    pub page_count: usize,
    pub text_length: usize,
}

impl From<&RenderedDocument> for DocumentSummary {
    fn from(doc: &RenderedDocument) -> Self {
        Self {
            name: doc.name.clone(),
            page_count: doc.page_count(),
            text_length: doc.text.chars().count(),
        }
    }
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub generation: u64,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<DocumentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<DocumentSummary>,
    pub total_pages: usize,
    pub current_page: usize,
    pub mode: VisualizationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<ChangeNarrative>,
    pub narrative_pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub pages: Vec<ArtifactSummary>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Error Types
// ============================================================================

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Page {page} is out of range (1..={total})")]
    InvalidPage { page: usize, total: usize },

    #[error("Comparison not ready: {0}")]
    NotReady(String),
}

impl SessionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidPage { .. } => StatusCode::BAD_REQUEST,
            Self::NotReady(_) => StatusCode::CONFLICT,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "SESSION_NOT_FOUND",
            Self::InvalidPage { .. } => "INVALID_PAGE",
            Self::NotReady(_) => "NOT_READY",
        }
    }
}
