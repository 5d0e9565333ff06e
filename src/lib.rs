pub mod config;
pub mod session;
pub mod upload;
pub mod web;

pub use config::AppConfig;
pub use session::{
    ADMIN_TOKEN_KEY, ADMIN_USER_KEY, AdminUser, ExecutionContext, JsonFileStore, KeyValueStore,
    LOGIN_ROUTE, MemoryStore, Navigator, SessionGuard,
};
pub use upload::{
    FileValidation, HttpUploader, ProgressObserver, UploadConstraints, UploadController,
    UploadError, UploadFile, UploadPhase, UploadResult, UploadState, UploadedImage, Uploader,
    format_file_size, validate_file,
};
pub use web::AppState;
