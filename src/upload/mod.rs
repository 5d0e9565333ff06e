mod client;
mod validate;

pub use client::HttpUploader;
pub use validate::{FileValidation, UploadConstraints, format_file_size, validate_file};

use std::{fs, path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

/// Result type used by the upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when validating or sending a file. Validation and transport
/// failures share this shape; only the message differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadError {
    message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UploadError {}

/// File selected for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Load a file from disk, inferring the content type from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("unable to derive filename from {:?}", path))?;
        let bytes = fs::read(path).with_context(|| format!("failed to read {:?}", path))?;

        Ok(Self::new(name, content_type_for(path).to_string(), bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Best-effort content type from a file extension.
pub fn content_type_for(path: &Path) -> mime::Mime {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "png" => mime::IMAGE_PNG,
        "gif" => mime::IMAGE_GIF,
        "svg" => mime::IMAGE_SVG,
        "bmp" => mime::IMAGE_BMP,
        "webp" => "image/webp".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// File extension matching a content type, so `content_type_for` maps it back
/// to the same type. Unknown types get `bin` and are served as octet-stream.
pub fn extension_for(content_type: &mime::Mime) -> &'static str {
    match content_type.essence_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/bmp" => "bmp",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Stored image as reported by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub filename: String,
    pub original_name: String,
    pub url: String,
    pub content_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Receives transfer progress as a percentage in `0..=100`.
pub type ProgressObserver = Arc<dyn Fn(u8) + Send + Sync>;

/// Remote side of an upload.
pub trait Uploader: Send + Sync {
    fn upload(
        &self,
        file: &UploadFile,
        on_progress: ProgressObserver,
    ) -> impl Future<Output = UploadResult<UploadedImage>> + Send;
}

/// Observable state of the current upload attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadState {
    pub is_uploading: bool,
    pub progress: u8,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Uploading,
    Success,
    Failed,
}

impl UploadState {
    pub fn phase(&self) -> UploadPhase {
        if self.is_uploading {
            UploadPhase::Uploading
        } else if self.error.is_some() {
            UploadPhase::Failed
        } else if self.progress == 100 {
            UploadPhase::Success
        } else {
            UploadPhase::Idle
        }
    }
}

/// Drives one upload at a time and publishes its state.
///
/// Every call to [`UploadController::upload`] starts from a clean state
/// (`progress = 0`, no error). Failures are recorded in the state *and*
/// returned to the caller.
pub struct UploadController<U> {
    uploader: U,
    constraints: UploadConstraints,
    state: Arc<watch::Sender<UploadState>>,
}

impl<U: Uploader> UploadController<U> {
    pub fn new(uploader: U, constraints: UploadConstraints) -> Self {
        let (sender, _receiver) = watch::channel(UploadState::default());
        Self {
            uploader,
            constraints,
            state: Arc::new(sender),
        }
    }

    pub fn constraints(&self) -> &UploadConstraints {
        &self.constraints
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    pub fn state(&self) -> UploadState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.state.subscribe()
    }

    pub async fn upload(&self, file: &UploadFile) -> UploadResult<UploadedImage> {
        self.state.send_modify(|state| {
            state.is_uploading = true;
            state.progress = 0;
            state.error = None;
        });

        match self.transfer(file).await {
            Ok(uploaded) => {
                self.state.send_modify(|state| {
                    state.progress = 100;
                    state.is_uploading = false;
                });
                info!(file = %file.name, url = %uploaded.url, "upload completed");
                Ok(uploaded)
            }
            Err(err) => {
                self.state.send_modify(|state| {
                    state.error = Some(err.message().to_string());
                    state.is_uploading = false;
                });
                warn!(file = %file.name, error = %err, "upload failed");
                Err(err)
            }
        }
    }

    async fn transfer(&self, file: &UploadFile) -> UploadResult<UploadedImage> {
        let validation = validate_file(file, &self.constraints);
        if !validation.valid {
            let message = validation
                .error
                .unwrap_or_else(|| "File failed validation".to_string());
            return Err(UploadError::new(message));
        }

        let state = Arc::clone(&self.state);
        let observer: ProgressObserver = Arc::new(move |percentage: u8| {
            let percentage = percentage.min(100);
            state.send_modify(|state| {
                // Late reports after the attempt settled are dropped.
                if state.is_uploading {
                    state.progress = percentage;
                }
            });
        });

        self.uploader.upload(file, observer).await
    }
}
