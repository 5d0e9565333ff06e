use std::path::{Path, PathBuf};

use axum::{
    Json,
    extract::{Multipart, Path as AxumPath, State},
    http::StatusCode,
    response::Response,
};
use chrono::Utc;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    upload::{UploadConstraints, UploadedImage, content_type_for, extension_for},
    web::{
        ApiError, AppState,
        auth::{BearerHeader, require_admin},
        json_error,
        storage::{is_safe_stored_name, stream_inline},
    },
};

const FILE_FIELD: &str = "file";
const MAX_NAME_CHARS: usize = 120;

/// An image persisted by [`receive_image`].
#[derive(Debug, Clone)]
pub struct SavedImage {
    pub original_name: String,
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub content_type: String,
    pub file_size: u64,
}

/// Reads the `file` field of a multipart form into `dest_dir`.
///
/// Type is checked before any bytes are written and size while streaming; a
/// rejected upload leaves nothing on disk. Extra text fields are ignored.
/// The stored extension comes from the checked content type, never from the
/// client's filename, so files are served back as the type that was allowed.
pub async fn receive_image(
    mut multipart: Multipart,
    dest_dir: &Path,
    constraints: &UploadConstraints,
) -> Result<SavedImage, ApiError> {
    let mut saved: Option<SavedImage> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(|err| {
        json_error(
            err.status(),
            format!("Failed to parse upload form: {}", err.body_text()),
        )
    })? {
        if field.name() != Some(FILE_FIELD) || field.file_name().is_none() {
            continue;
        }

        if let Some(previous) = &saved {
            remove_partial(&previous.stored_path).await;
            return Err(json_error(
                StatusCode::BAD_REQUEST,
                "Only one file may be uploaded per request",
            ));
        }

        let original_name = field.file_name().unwrap_or("upload").to_string();
        let declared = field.content_type().unwrap_or("");
        let checked = match declared.trim().parse::<mime::Mime>() {
            Ok(parsed) if constraints.allows_type(declared) => parsed,
            _ => return Err(json_error(StatusCode::BAD_REQUEST, constraints.type_error())),
        };
        let content_type = checked.essence_str().to_string();

        let stored_name = stored_name_for(&original_name, &checked);
        let stored_path = dest_dir.join(&stored_name);
        let mut file = File::create(&stored_path).await.map_err(|err| {
            error!(?err, path = %stored_path.display(), "failed to create upload file");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save file")
        })?;

        let mut total_bytes: u64 = 0;
        let streamed: Result<(), ApiError> = async {
            while let Some(chunk) = field.chunk().await.map_err(|err| {
                json_error(
                    err.status(),
                    format!("Failed to read upload data: {}", err.body_text()),
                )
            })? {
                total_bytes += chunk.len() as u64;
                if total_bytes > constraints.max_bytes {
                    return Err(json_error(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        constraints.size_error(),
                    ));
                }
                file.write_all(&chunk).await.map_err(|err| {
                    error!(?err, "failed to write upload chunk");
                    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save file")
                })?;
            }
            file.flush().await.map_err(|err| {
                error!(?err, "failed to flush upload file");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save file")
            })
        }
        .await;

        let streamed = streamed.and_then(|()| {
            if total_bytes == 0 {
                Err(json_error(StatusCode::BAD_REQUEST, "File is empty"))
            } else {
                Ok(())
            }
        });
        if let Err(rejection) = streamed {
            drop(file);
            remove_partial(&stored_path).await;
            return Err(rejection);
        }

        saved = Some(SavedImage {
            original_name,
            stored_name,
            stored_path,
            content_type,
            file_size: total_bytes,
        });
    }

    saved.ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "No file provided"))
}

/// `<uuid>_<sanitized stem>.<ext>` where `ext` follows `content_type`. Whitespace
/// is folded to `_` so the name is URL-safe.
fn stored_name_for(original_name: &str, content_type: &mime::Mime) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("");
    let stem: String = sanitize_filename::sanitize(stem)
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .take(MAX_NAME_CHARS)
        .collect();
    let stem = if stem.is_empty() || stem.starts_with('.') {
        format!("upload{}", stem)
    } else {
        stem
    };
    format!(
        "{}_{}.{}",
        Uuid::new_v4().simple(),
        stem,
        extension_for(content_type)
    )
}

async fn remove_partial(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        error!(?err, path = %path.display(), "failed to remove rejected upload");
    }
}

pub async fn upload_image(
    State(state): State<AppState>,
    bearer: BearerHeader,
    multipart: Multipart,
) -> Result<Json<UploadedImage>, ApiError> {
    let auth = require_admin(&state, &bearer)?;

    let saved = receive_image(multipart, state.upload_dir(), state.constraints()).await?;
    info!(
        stored = %saved.stored_name,
        original = %saved.original_name,
        size = saved.file_size,
        ?auth,
        "image uploaded"
    );

    Ok(Json(UploadedImage {
        url: state.config().public_url(&saved.stored_name),
        filename: saved.stored_name,
        original_name: saved.original_name,
        content_type: saved.content_type,
        size: saved.file_size,
        uploaded_at: Utc::now(),
    }))
}

pub async fn serve_upload(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
) -> Result<Response, ApiError> {
    if !is_safe_stored_name(&filename) {
        return Err(json_error(StatusCode::NOT_FOUND, "File not found"));
    }

    let path = state.upload_dir().join(&filename);
    let content_type = content_type_for(&path);
    stream_inline(&path, content_type.as_ref()).await
}
