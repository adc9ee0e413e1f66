use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod matches;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(sse::router())
        .merge(matches::router())
        .merge(docs::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{config::MatchConfig, state::AppState};

    #[tokio::test]
    async fn healthcheck_reports_setup_phase() {
        let app = router(AppState::new(MatchConfig::default()));

        let request = Request::builder()
            .uri("/healthcheck")
            .body(Body::empty())
            .expect("expected request to build");
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("expected response body");
        let payload: Value = serde_json::from_slice(&body).expect("expected json body");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["phase"], "setup");
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = router(AppState::new(MatchConfig::default()));

        let request = Request::builder()
            .uri("/api-doc/openapi.json")
            .body(Body::empty())
            .expect("expected request to build");
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn root_redirects_to_swagger_ui() {
        let app = router(AppState::new(MatchConfig::default()));

        let request = Request::builder()
            .uri("/")
            .body(Body::empty())
            .expect("expected request to build");
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()["location"], "/docs");
    }
}
