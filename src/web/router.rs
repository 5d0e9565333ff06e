use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::web::{AppState, uploads};

/// Room for multipart boundaries and headers around the file bytes.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .constraints()
        .max_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/upload", post(uploads::upload_image))
        .route("/uploads/:filename", get(uploads::serve_upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
