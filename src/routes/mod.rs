//! Route modules for the text detection server

pub mod caller;
pub mod detect;
pub mod health;
pub mod jobs;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config().limits.max_body_bytes;

    // The uploader page is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/health", get(health::health_check))
        .route("/api/v1/detect", post(detect::detect_text))
        .nest("/api/v1/jobs", jobs::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
pub(crate) const TEST_SERVICE_KEY: &str = "service-secret";

/// Test server over a fresh database. Keep the `TempDir` alive for the
/// duration of the test.
#[cfg(test)]
pub(crate) async fn test_server(
    detector: Option<std::sync::Arc<dyn crate::vision::TextDetector>>,
) -> (tempfile::TempDir, axum_test::TestServer) {
    let (dir, pool) = crate::db::test_pool().await;
    let config = crate::config::Config {
        service_key: Some(TEST_SERVICE_KEY.to_string()),
        ..Default::default()
    };
    let state = AppState::with_detector(config, pool, detector);
    let server = axum_test::TestServer::new(router(state)).unwrap();
    (dir, server)
}
