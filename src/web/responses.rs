use axum::Json;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Canonical JSON payload for error responses.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiMessage {
    pub message: String,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type ApiError = (StatusCode, Json<ApiMessage>);

/// Helper for handlers that need to return `(StatusCode, Json<ApiMessage>)`.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ApiMessage::new(message)))
}

pub fn internal_error() -> ApiError {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}
