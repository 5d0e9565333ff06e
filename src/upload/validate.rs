use crate::upload::UploadFile;

const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;
const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Limits an image must satisfy before it is sent or stored.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadConstraints {
    pub allowed_types: Vec<mime::Mime>,
    pub max_bytes: u64,
}

impl Default for UploadConstraints {
    fn default() -> Self {
        Self {
            allowed_types: vec![
                mime::IMAGE_JPEG,
                mime::IMAGE_PNG,
                "image/webp".parse().unwrap_or(mime::IMAGE_STAR),
                mime::IMAGE_GIF,
            ],
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl UploadConstraints {
    /// Compares the essence (`type/subtype`) so parameters such as charset are ignored.
    pub fn allows_type(&self, content_type: &str) -> bool {
        let Ok(parsed) = content_type.trim().parse::<mime::Mime>() else {
            return false;
        };
        self.allowed_types
            .iter()
            .any(|allowed| allowed.essence_str() == parsed.essence_str())
    }

    pub fn allowed_list(&self) -> String {
        self.allowed_types
            .iter()
            .map(|m| m.essence_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn type_error(&self) -> String {
        format!("Invalid file type. Allowed types: {}", self.allowed_list())
    }

    pub fn size_error(&self) -> String {
        format!(
            "File is too large. Maximum size is {}",
            format_file_size(self.max_bytes)
        )
    }
}

/// Outcome of [`validate_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileValidation {
    pub valid: bool,
    pub error: Option<String>,
}

impl FileValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(message.into()),
        }
    }
}

pub fn validate_file(file: &UploadFile, constraints: &UploadConstraints) -> FileValidation {
    if !constraints.allows_type(&file.content_type) {
        return FileValidation::rejected(constraints.type_error());
    }

    let size = file.size();
    if size == 0 {
        return FileValidation::rejected("File is empty");
    }
    if size > constraints.max_bytes {
        return FileValidation::rejected(constraints.size_error());
    }

    FileValidation::ok()
}

/// Human-readable size in 1024 steps, at most two decimals (`1258291` is `1.2 MB`).
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_UNITS[unit])
}
