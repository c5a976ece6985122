//! Validation error types.
//!
//! Validation problems found in a dataset are [`dm_model::Issue`]s and never
//! surface here. These errors abort a run.

use std::path::PathBuf;
use thiserror::Error;

use dm_dictionary::DictionaryError;
use dm_store::StoreError;

#[derive(Debug, Error)]
pub enum ValidateError {
    /// A data file could not be read for content checks.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dictionary(#[from] DictionaryError),
}

impl ValidateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidateError>;
