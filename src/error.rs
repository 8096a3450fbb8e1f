//! Error handling module
//!
//! Provides unified error types for the gate. Validation findings are never
//! errors; everything here is a genuine fault that aborts the current step.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {op} failed, {} does not exist", path.display())]
    NotFound { op: &'static str, path: PathBuf },

    #[error("Permission denied: {op} failed for {}", path.display())]
    PermissionDenied { op: &'static str, path: PathBuf },

    #[error("I/O error: {op} failed for {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    /// Classify an I/O failure, keeping the path and the operation that hit it.
    pub fn io(op: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound => AppError::NotFound { op, path },
            io::ErrorKind::PermissionDenied => AppError::PermissionDenied { op, path },
            _ => AppError::Io { op, path, source },
        }
    }
}

/// Result type alias for gate operations
pub type AppResult<T> = Result<T, AppError>;

/// Extension for attaching the operation and path to raw `io::Result`s.
pub trait IoContext<T> {
    fn with_path(self, op: &'static str, path: impl AsRef<Path>) -> AppResult<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn with_path(self, op: &'static str, path: impl AsRef<Path>) -> AppResult<T> {
        self.map_err(|e| AppError::io(op, path, e))
    }
}

/// Helper function to create an invalid input error
pub fn invalid_input(msg: impl Into<String>) -> AppError {
    AppError::InvalidInput(msg.into())
}
