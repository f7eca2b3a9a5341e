//! HTTP routes

pub mod comparisons;
pub mod export;
pub mod health;

use axum::{extract::DefaultBodyLimit, routing::get, Router};

use crate::state::AppState;

/// Build the API router (without transport layers)
pub fn router(state: AppState) -> Router {
    let max_upload = state.config().server.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/health", get(health::health_check))
        .nest(
            "/api/v1/comparisons",
            comparisons::router().merge(export::router()),
        )
        .layer(DefaultBodyLimit::max(max_upload))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::config::Config;
    use crate::narrative::{MockComparator, TextComparator};
    use crate::raster::testing::{solid_page, StaticRasterizer};
    use crate::raster::RenderedDocument;
    use crate::session::{ComparisonSession, SessionStatus};

    const BOUNDARY: &str = "compare-test-boundary";

    fn document(name: &str, pages: usize, color: [u8; 4]) -> RenderedDocument {
        RenderedDocument::from_pages(
            name,
            (0..pages).map(|i| format!("{} page {}", name, i + 1)).collect(),
            (0..pages).map(|_| solid_page(24, 32, color)).collect(),
        )
    }

    fn test_state() -> AppState {
        let rasterizer = StaticRasterizer::default()
            .with_document(document("v1.pdf", 3, [255, 255, 255, 255]))
            .with_document(document("v2.pdf", 2, [0, 0, 0, 255]));
        let comparator: Arc<dyn TextComparator> = Arc::new(MockComparator::replying("- Body:\n- edited"));
        AppState::with_components(Config::default(), Arc::new(rasterizer), Some(comparator))
    }

    fn multipart(fields: &[(&str, &str, &str)]) -> Body {
        let mut body = Vec::new();
        for (name, file_name, data) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn upload_request(uri: &str, fields: &[(&str, &str, &str)]) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart(fields))
            .unwrap()
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(state: &AppState, request: Request<Body>) -> Response {
        router(state.clone()).oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn wait_until_settled(state: &AppState, id: Uuid) -> ComparisonSession {
        for _ in 0..500 {
            let session = state.sessions().get_session(id).await.unwrap();
            if session.status != SessionStatus::Rendering && !session.narrative_pending {
                return session;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("comparison did not finish");
    }

    async fn start_comparison(state: &AppState) -> Uuid {
        let response = send(
            state,
            upload_request(
                "/api/v1/comparisons",
                &[
                    ("original", "v1.pdf", "%PDF-1.7 one"),
                    ("new", "v2.pdf", "%PDF-1.7 two"),
                ],
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = json_body(response).await;
        assert_ne!(body["status"], "idle");
        let id: Uuid = body["id"].as_str().unwrap().parse().unwrap();
        wait_until_settled(state, id).await;
        id
    }

    #[tokio::test]
    async fn test_health() {
        let state = test_state();
        let response = send(&state, get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_comparison_flow() {
        let state = test_state();
        let id = start_comparison(&state).await;
        let base = format!("/api/v1/comparisons/{id}");

        let snapshot = json_body(send(&state, get(&base)).await).await;
        assert_eq!(snapshot["status"], "ready");
        assert_eq!(snapshot["totalPages"], 3);
        assert_eq!(snapshot["original"]["name"], "v1.pdf");
        assert_eq!(snapshot["pages"].as_array().unwrap().len(), 3);
        assert_eq!(snapshot["pages"][2]["hasHighlight"], false);
        assert_eq!(snapshot["narrative"]["summary"], "• Body:\n  • edited");

        let overlay = send(&state, get(&format!("{base}/pages/1/overlay"))).await;
        assert_eq!(overlay.status(), StatusCode::OK);
        assert_eq!(overlay.headers()[header::CONTENT_TYPE], "image/png");

        let missing = send(&state, get(&format!("{base}/pages/3/highlight"))).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let missing_new = send(&state, get(&format!("{base}/pages/3/new"))).await;
        assert_eq!(missing_new.status(), StatusCode::NOT_FOUND);
        let original = send(&state, get(&format!("{base}/pages/3/original"))).await;
        assert_eq!(original.status(), StatusCode::OK);

        let out_of_range = send(&state, get(&format!("{base}/pages/4/overlay"))).await;
        assert_eq!(out_of_range.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_view_follows_mode() {
        let state = test_state();
        let id = start_comparison(&state).await;
        let base = format!("/api/v1/comparisons/{id}");

        let view = json_body(send(&state, get(&format!("{base}/pages/1/view"))).await).await;
        assert_eq!(view["mode"], "overlay");
        assert!(view["overlay"].as_str().unwrap().starts_with("data:image/png;base64,"));
        assert!(view.get("highlight").is_none());

        let response = send(
            &state,
            json_request(Method::PUT, &format!("{base}/mode"), serde_json::json!({"mode": "side-by-side"})),
        )
        .await;
        assert_eq!(json_body(response).await["mode"], "side-by-side");

        let view = json_body(send(&state, get(&format!("{base}/pages/1/view"))).await).await;
        assert!(view["original"].is_string());
        assert!(view["highlight"].is_string());

        let view = json_body(send(&state, get(&format!("{base}/pages/3/view"))).await).await;
        assert_eq!(view["placeholder"], "no comparison possible");
        assert!(view.get("highlight").is_none());
    }

    #[tokio::test]
    async fn test_page_cursor() {
        let state = test_state();
        let id = start_comparison(&state).await;
        let uri = format!("/api/v1/comparisons/{id}/page");

        let response = send(&state, json_request(Method::PUT, &uri, serde_json::json!({"page": 2}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["currentPage"], 2);

        let response = send(&state, json_request(Method::PUT, &uri, serde_json::json!({"page": 9}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "INVALID_PAGE");
    }

    #[tokio::test]
    async fn test_export() {
        let state = test_state();
        let id = start_comparison(&state).await;

        let response = send(
            &state,
            json_request(
                Method::POST,
                &format!("/api/v1/comparisons/{id}/export"),
                serde_json::json!({"pageRange": {"start": 1, "end": 2}, "format": "Letter"}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename=\"comparison-report-"));
        assert!(response.headers().get(export::EXPORT_WARNINGS_HEADER).is_none());

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_reset_and_delete() {
        let state = test_state();
        let id = start_comparison(&state).await;
        let base = format!("/api/v1/comparisons/{id}");

        let response = send(&state, json_request(Method::POST, &format!("{base}/reset"), Value::Null)).await;
        let snapshot = json_body(response).await;
        assert_eq!(snapshot["status"], "idle");
        assert_eq!(snapshot["totalPages"], 0);
        assert_eq!(snapshot["generation"], 2);

        let view = send(&state, get(&format!("{base}/pages/1/view"))).await;
        assert_eq!(view.status(), StatusCode::CONFLICT);

        let export = send(&state, json_request(Method::POST, &format!("{base}/export"), Value::Null)).await;
        assert_eq!(export.status(), StatusCode::CONFLICT);

        let delete = Request::builder()
            .method(Method::DELETE)
            .uri(&base)
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&state, delete).await.status(), StatusCode::NO_CONTENT);
        assert_eq!(send(&state, get(&base)).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_restart_in_existing_session() {
        let state = test_state();
        let id = start_comparison(&state).await;

        let response = send(
            &state,
            upload_request(
                &format!("/api/v1/comparisons/{id}/compare"),
                &[
                    ("original", "v2.pdf", "%PDF-1.7 two"),
                    ("new", "v1.pdf", "%PDF-1.7 one"),
                ],
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let session = wait_until_settled(&state, id).await;
        assert_eq!(session.generation, 2);
        assert_eq!(session.status, SessionStatus::Ready);
        assert_eq!(session.original.unwrap().name, "v2.pdf");
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let state = test_state();

        let response = send(
            &state,
            upload_request("/api/v1/comparisons", &[("original", "v1.pdf", "%PDF-1.7 one")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "missing 'new' document");

        let response = send(
            &state,
            upload_request(
                "/api/v1/comparisons",
                &[("original", "v1.pdf", "%PDF-1.7"), ("new", "notes.txt", "hello")],
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.sessions().session_count().await, 0);
    }

    #[tokio::test]
    async fn test_unreadable_documents_reset_session() {
        let state = test_state();
        let response = send(
            &state,
            upload_request(
                "/api/v1/comparisons",
                &[
                    ("original", "v1.pdf", "%PDF-1.7 one"),
                    ("new", "unknown.pdf", "%PDF-1.7 ???"),
                ],
            ),
        )
        .await;
        let id: Uuid = json_body(response).await["id"].as_str().unwrap().parse().unwrap();

        let session = wait_until_settled(&state, id).await;
        assert_eq!(session.status, SessionStatus::Idle);

        let snapshot = json_body(send(&state, get(&format!("/api/v1/comparisons/{id}"))).await).await;
        assert_eq!(snapshot["error"], "failed to process document");
        assert!(snapshot.get("original").is_none());
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let state = test_state();
        let response = send(&state, get(&format!("/api/v1/comparisons/{}", Uuid::new_v4()))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "SESSION_NOT_FOUND");
    }
}
