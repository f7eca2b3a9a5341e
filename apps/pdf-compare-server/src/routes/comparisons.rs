//! Comparison API endpoints
//!
//! - Upload two PDFs and start a comparison
//! - Inspect, reset and delete sessions
//! - Move the page cursor and switch visualization mode
//! - Fetch page bitmaps and the current page view

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compare::DocumentUpload;
use crate::diff::PageImage;
use crate::error::{AppError, Result};
use crate::session::{
    ComparisonSession, SessionError, SessionSnapshot, SessionStatus, VisualizationMode,
};
use crate::state::AppState;

/// Placeholder shown when a page exists in one document only
pub const NO_COMPARISON: &str = "no comparison possible";

/// Mode change request
#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: VisualizationMode,
}

/// Page cursor request (1-based)
#[derive(Debug, Deserialize)]
pub struct PageRequest {
    pub page: usize,
}

/// Bitmap slots of a page
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageImageKind {
    Overlay,
    Highlight,
    Original,
    New,
}

impl PageImageKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Overlay => "overlay",
            Self::Highlight => "highlight",
            Self::Original => "original",
            Self::New => "new",
        }
    }
}

/// What the active mode shows for one page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
    pub page: usize,
    pub total_pages: usize,
    pub mode: VisualizationMode,
    /// Overlay mode: the overlay bitmap as a data URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<String>,
    /// Side-by-side mode: the original page as a data URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    /// Side-by-side mode: the highlighted new page as a data URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_pixels: Option<u64>,
}

/// Create the comparisons router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_comparison))
        .route("/:id", get(get_comparison).delete(delete_comparison))
        .route("/:id/compare", post(restart_comparison))
        .route("/:id/reset", post(reset_comparison))
        .route("/:id/mode", put(set_mode))
        .route("/:id/page", put(set_page))
        .route("/:id/pages/:page/view", get(page_view))
        .route("/:id/pages/:page/:kind", get(page_image))
}

/// Read the `original` and `new` PDFs from a multipart body
async fn read_uploads(mut multipart: Multipart) -> Result<(DocumentUpload, DocumentUpload)> {
    let mut original = None;
    let mut new = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Invalid multipart body: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();
        if name != "original" && name != "new" {
            continue;
        }

        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("{}.pdf", name));
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read '{}': {}", name, e)))?;

        if !data.starts_with(b"%PDF") {
            return Err(AppError::BadRequest(format!(
                "'{}' is not a PDF document",
                name
            )));
        }

        let upload = DocumentUpload::new(file_name, data.to_vec());
        if name == "original" {
            original = Some(upload);
        } else {
            new = Some(upload);
        }
    }

    match (original, new) {
        (Some(original), Some(new)) => Ok((original, new)),
        (None, _) => Err(AppError::BadRequest("missing 'original' document".to_string())),
        (_, None) => Err(AppError::BadRequest("missing 'new' document".to_string())),
    }
}

/// Upload both documents into a new session and start comparing
async fn create_comparison(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SessionSnapshot>)> {
    let (original, new) = read_uploads(multipart).await?;

    let session = state.sessions().create_session().await;
    state.orchestrator().start(session.id, original, new).await?;

    let snapshot = state.sessions().get_session(session.id).await?.snapshot();
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// Start a new comparison in an existing session
async fn restart_comparison(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SessionSnapshot>)> {
    state.sessions().get_session(id).await?;
    let (original, new) = read_uploads(multipart).await?;

    state.orchestrator().start(id, original, new).await?;

    let snapshot = state.sessions().get_session(id).await?.snapshot();
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

async fn get_comparison(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>> {
    Ok(Json(state.sessions().get_session(id).await?.snapshot()))
}

async fn reset_comparison(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>> {
    Ok(Json(state.sessions().reset_session(id).await?.snapshot()))
}

async fn delete_comparison(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.sessions().remove_session(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_mode(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ModeRequest>,
) -> Result<Json<SessionSnapshot>> {
    Ok(Json(state.sessions().set_mode(id, request.mode).await?.snapshot()))
}

async fn set_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PageRequest>,
) -> Result<Json<SessionSnapshot>> {
    Ok(Json(
        state
            .sessions()
            .set_current_page(id, request.page)
            .await?
            .snapshot(),
    ))
}

/// Session that has finished comparing, with `page` in range
async fn ready_session(state: &AppState, id: Uuid, page: usize) -> Result<ComparisonSession> {
    let session = state.sessions().get_session(id).await?;
    if session.status != SessionStatus::Ready {
        return Err(SessionError::NotReady(format!("session is {}", session.status.as_str())).into());
    }
    if session.artifact(page).is_none() {
        return Err(SessionError::InvalidPage {
            page,
            total: session.artifacts.len(),
        }
        .into());
    }
    Ok(session)
}

/// Page as rendered by the active visualization mode
async fn page_view(
    State(state): State<AppState>,
    Path((id, page)): Path<(Uuid, usize)>,
) -> Result<Json<PageView>> {
    let session = ready_session(&state, id, page).await?;
    let artifact = session
        .artifact(page)
        .ok_or_else(|| AppError::NotFound(format!("page {}", page)))?;

    let mut view = PageView {
        page,
        total_pages: session.artifacts.len(),
        mode: session.mode,
        overlay: None,
        original: None,
        highlight: None,
        placeholder: None,
        changed_pixels: artifact.changed_pixels(),
    };

    match session.mode {
        VisualizationMode::Overlay => {
            view.overlay = Some(artifact.overlay().to_data_url());
        }
        VisualizationMode::SideBySide => {
            view.original = source_page(&session, PageImageKind::Original, page).map(PageImage::to_data_url);
            match artifact.highlight() {
                Some(highlight) => view.highlight = Some(highlight.to_data_url()),
                None => view.placeholder = Some(NO_COMPARISON),
            }
        }
    }

    Ok(Json(view))
}

fn source_page(session: &ComparisonSession, kind: PageImageKind, page: usize) -> Option<&PageImage> {
    let document = match kind {
        PageImageKind::Original => session.original.as_deref(),
        PageImageKind::New => session.new.as_deref(),
        _ => None,
    }?;
    document.images.get(page.checked_sub(1)?)
}

/// Raw PNG for one slot of a page
async fn page_image(
    State(state): State<AppState>,
    Path((id, page, kind)): Path<(Uuid, usize, PageImageKind)>,
) -> Result<Response> {
    let session = ready_session(&state, id, page).await?;
    let artifact = session
        .artifact(page)
        .ok_or_else(|| AppError::NotFound(format!("page {}", page)))?;

    let image = match kind {
        PageImageKind::Overlay => Some(artifact.overlay()),
        PageImageKind::Highlight => artifact.highlight(),
        PageImageKind::Original | PageImageKind::New => source_page(&session, kind, page),
    }
    .ok_or_else(|| {
        AppError::NotFound(format!(
            "{} for page {}: {}",
            kind.as_str(),
            page,
            NO_COMPARISON
        ))
    })?;

    Ok(png_response(image))
}

fn png_response(image: &PageImage) -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        Body::from(image.as_bytes().to_vec()),
    )
        .into_response()
}
