//! Error types for tasktracker
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (unknown task, validation failure, id conflict, bad config)
//! - 4: Operation failed (disk error, unreadable data)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the tasktracker CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Coarse classification of an [`Error`], stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    CorruptData,
    Io,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Conflict => "conflict",
            ErrorKind::CorruptData => "corrupt_data",
            ErrorKind::Io => "io_failure",
            ErrorKind::Config => "config_error",
        }
    }
}

/// Main error type for store operations
#[derive(Error, Debug)]
pub enum Error {
    // Not found (exit code 2)
    #[error("Task not found: {0}")]
    TaskNotFound(u64),

    #[error("Archived task not found: {0}")]
    ArchivedTaskNotFound(u64),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // Validation / conflicts (exit code 2)
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Operation failures (exit code 4)
    #[error("Corrupt data in {path}: {reason}")]
    CorruptData { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a validation error for `field`
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TaskNotFound(_) | Error::ArchivedTaskNotFound(_) | Error::FileNotFound(_) => {
                ErrorKind::NotFound
            }
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::InvalidConfig(_) | Error::InvalidArgument(_) => ErrorKind::Config,
            Error::CorruptData { .. } => ErrorKind::CorruptData,
            Error::Io(_) | Error::Json(_) => ErrorKind::Io,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::NotFound
            | ErrorKind::Validation
            | ErrorKind::Conflict
            | ErrorKind::Config => exit_codes::USER_ERROR,
            ErrorKind::CorruptData | ErrorKind::Io => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured fields for machine-readable error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::TaskNotFound(id) | Error::ArchivedTaskNotFound(id) => {
                Some(serde_json::json!({ "id": id }))
            }
            Error::FileNotFound(path) => Some(serde_json::json!({ "path": path })),
            Error::Validation { field, reason } => {
                Some(serde_json::json!({ "field": field, "reason": reason }))
            }
            Error::CorruptData { path, reason } => {
                Some(serde_json::json!({ "path": path, "reason": reason }))
            }
            Error::Conflict(message)
            | Error::InvalidConfig(message)
            | Error::InvalidArgument(message) => Some(serde_json::json!({ "message": message })),
            Error::Io(_) | Error::Json(_) => None,
        }
    }
}

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub message: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            message: err.to_string(),
            code: err.exit_code(),
            kind: err.kind().as_str(),
            details: err.details(),
        }
    }
}
