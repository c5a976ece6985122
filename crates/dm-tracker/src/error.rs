//! Tracker error types.

use thiserror::Error;

use dm_dictionary::DictionaryError;
use dm_store::StoreError;
use dm_validate::ValidateError;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// Export headers do not fit the dictionary; nothing is written.
    #[error("Could not update tracker: {detail}")]
    SchemaIntegrity { detail: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dictionary(#[from] DictionaryError),

    #[error(transparent)]
    Validate(#[from] ValidateError),
}

impl TrackerError {
    pub(crate) fn integrity(detail: impl Into<String>) -> Self {
        Self::SchemaIntegrity {
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
