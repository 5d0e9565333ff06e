use std::path::Path;

use anyhow::{Context, Result};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::web::{ApiError, internal_error, json_error};

/// Ensure the storage directory exists.
pub async fn ensure_storage_root(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("failed to ensure storage root at {}", path.display()))
}

/// Accepts only names this server could have produced: one path segment, no
/// traversal, nothing hidden.
pub fn is_safe_stored_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && sanitize_filename::sanitize(name) == name
}

/// Stream a stored file inline with the given content type.
pub async fn stream_inline(path: &Path, content_type: &str) -> Result<Response, ApiError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(json_error(StatusCode::NOT_FOUND, "File not found"));
        }
        Err(err) => {
            error!(?err, file = %path.display(), "failed to read stored upload");
            return Err(internal_error());
        }
    };

    let mut headers = HeaderMap::new();
    let content_type = HeaderValue::from_str(content_type).map_err(|_| internal_error())?;
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static("inline"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; style-src 'unsafe-inline'; sandbox"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    Ok((headers, bytes).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_name_rules() {
        assert!(is_safe_stored_name("3f2a_hero.png"));
        assert!(!is_safe_stored_name(""));
        assert!(!is_safe_stored_name("../secret"));
        assert!(!is_safe_stored_name("a/b.png"));
        assert!(!is_safe_stored_name("a\\b.png"));
        assert!(!is_safe_stored_name(".env"));
    }
}
