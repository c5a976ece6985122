//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Dataset storage error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File I/O error.
    #[error("Failed to {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A table could not be parsed or serialized.
    #[error("Failed to process CSV {path}: {message}")]
    Csv { path: PathBuf, message: String },

    /// A table is missing one of its canonical columns.
    #[error("Table {path} is missing column {column}")]
    MissingColumn { path: PathBuf, column: String },

    /// A copy or move would replace an existing file or directory.
    #[error("Refusing to overwrite existing {path}")]
    DestinationExists { path: PathBuf },

    /// Directory does not exist.
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Atomic write failed (temp file couldn't be renamed).
    #[error("Failed to complete write of {target_path}")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        target_path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: &csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            message: source.to_string(),
        }
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
