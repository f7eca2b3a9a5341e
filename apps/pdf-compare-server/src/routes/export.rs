//! Report export endpoint

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::export::{export_report, ExportOptions, ReportInput};
use crate::session::{SessionError, SessionStatus};
use crate::state::AppState;

/// Header carrying non-fatal export problems
pub const EXPORT_WARNINGS_HEADER: &str = "x-export-warnings";

/// Create the export router
pub fn router() -> Router<AppState> {
    Router::new().route("/:id/export", post(export_comparison))
}

/// Build the PDF report for a finished comparison
async fn export_comparison(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    options: Option<Json<ExportOptions>>,
) -> Result<Response> {
    let options = options.map(|Json(o)| o).unwrap_or_default();
    let session = state.sessions().get_session(id).await?;

    if session.status != SessionStatus::Ready {
        return Err(SessionError::NotReady(format!("session is {}", session.status.as_str())).into());
    }

    let report = tokio::task::spawn_blocking(move || {
        let original_name = session.original.as_ref().map_or("", |d| d.name.as_str());
        let new_name = session.new.as_ref().map_or("", |d| d.name.as_str());
        let input = ReportInput {
            original_name,
            new_name,
            narrative: session.narrative.as_ref(),
            overlays: &session.export_overlays,
            total_pages: session.artifacts.len(),
            generated_on: chrono::Local::now().date_naive(),
        };
        export_report(&input, &options)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Export task failed: {}", e)))??;

    tracing::info!(
        session_id = %id,
        file_name = %report.file_name,
        size = report.bytes.len(),
        "Report exported"
    );

    let disposition = format!("attachment; filename=\"{}\"", report.file_name);
    let mut response = (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(report.bytes),
    )
        .into_response();

    if !report.warnings.is_empty() {
        let joined: String = report
            .warnings
            .join("; ")
            .chars()
            .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
            .collect();
        if let Ok(value) = HeaderValue::from_str(&joined) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(EXPORT_WARNINGS_HEADER), value);
        }
    }

    Ok(response)
}
