use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{config::AppConfig, upload::UploadConstraints, web::storage::ensure_storage_root};

#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        ensure_storage_root(&config.upload_dir)
            .await
            .context("failed to prepare upload directory")?;

        info!(
            upload_dir = %config.upload_dir.display(),
            max_bytes = config.constraints.max_bytes,
            allowed = %config.constraints.allowed_list(),
            "upload storage ready"
        );
        if config.admin_token.is_none() {
            warn!(
                "ADMIN_API_TOKEN is not set; falling back to placeholder bearer-token auth. Do not run this in production."
            );
        }

        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_dir
    }

    pub fn constraints(&self) -> &UploadConstraints {
        &self.config.constraints
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.config.admin_token.as_deref()
    }
}
