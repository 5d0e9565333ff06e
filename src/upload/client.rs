use axum::body::Bytes;
use futures::{StreamExt, stream};
use reqwest::{
    Body, Client,
    multipart::{Form, Part},
};
use tracing::debug;

use crate::{
    upload::{ProgressObserver, UploadError, UploadFile, UploadResult, UploadedImage, Uploader},
    web::ApiMessage,
};

const CHUNK_SIZE: usize = 64 * 1024;
const FILE_FIELD: &str = "file";

/// Sends files to the upload endpoint as multipart form data.
///
/// The file part is streamed in fixed-size chunks and progress is reported as
/// each chunk is handed to the transport.
#[derive(Clone)]
pub struct HttpUploader {
    http: Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpUploader {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(http: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            bearer_token: None,
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Uploader for HttpUploader {
    async fn upload(
        &self,
        file: &UploadFile,
        on_progress: ProgressObserver,
    ) -> UploadResult<UploadedImage> {
        let total = file.size();
        let bytes = Bytes::from(file.bytes.clone());
        let len = bytes.len();

        let observer = on_progress.clone();
        let body = stream::iter((0..len).step_by(CHUNK_SIZE)).map(move |start| {
            let end = (start + CHUNK_SIZE).min(len);
            observer(percentage(end as u64, total));
            Ok::<_, std::io::Error>(bytes.slice(start..end))
        });

        let part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(file.name.clone())
            .mime_str(&file.content_type)
            .map_err(|err| UploadError::new(format!("Invalid content type: {err}")))?;
        let form = Form::new().part(FILE_FIELD, part);

        let mut request = self.http.post(&self.endpoint).multipart(form);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        debug!(endpoint = %self.endpoint, file = %file.name, total, "sending upload");
        let response = request
            .send()
            .await
            .map_err(|err| UploadError::new(format!("Upload failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiMessage>()
                .await
                .ok()
                .map(|body| body.message)
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| format!("Upload failed with status {status}"));
            return Err(UploadError::new(message));
        }

        let uploaded = response
            .json::<UploadedImage>()
            .await
            .map_err(|err| UploadError::new(format!("Unexpected upload response: {err}")))?;

        on_progress(100);
        Ok(uploaded)
    }
}

fn percentage(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (sent.saturating_mul(100) / total).min(100) as u8
}
