use serde::Serialize;
use thiserror::Error;

/// Errors that cross the backend boundary.
///
/// Variants carry strings so the enum stays `Serialize` and can be returned
/// straight from a Tauri command.
#[derive(Error, Debug, Serialize)]
pub enum AppError {
    #[error("failed to open PTY: {0}")]
    OpenPty(String),

    #[error("failed to spawn shell {shell}: {message}")]
    Spawn { shell: String, message: String },

    #[error("PTY I/O error: {0}")]
    PtyIo(String),

    #[error("settings I/O error: {0}")]
    SettingsIo(String),

    #[error("invalid settings format: {0}")]
    SettingsFormat(String),

    #[error("tab not found: {0}")]
    TabNotFound(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SettingsFormat(err.to_string())
    }
}

// Allows `Result<T, AppError>` to be used where the frontend expects a string
impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.to_string()
    }
}
