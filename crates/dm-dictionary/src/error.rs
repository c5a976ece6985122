#![deny(unsafe_code)]

use std::path::PathBuf;

use dm_model::ModelError;

#[derive(Debug, thiserror::Error)]
pub enum DictionaryError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {message}")]
    Csv { path: PathBuf, message: String },

    #[error("data dictionary {path} is missing required column {column}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("invalid data dictionary row for {variable}: {source}")]
    InvalidRow {
        variable: String,
        #[source]
        source: ModelError,
    },

    #[error("duplicate variable in data dictionary: {variable}")]
    DuplicateVariable { variable: String },

    #[error("variable {variable} references unknown variable {reference}")]
    UnknownReference { variable: String, reference: String },

    #[error("combination row {row} lists {member}, which is not a file-backed variable")]
    InvalidCombinationMember { row: String, member: String },

    #[error("variables derive from each other in a cycle: {chain}")]
    Cycle { chain: String },

    #[error("data dictionary has no row with dataType id")]
    MissingIdRow,

    #[error("known-good data dictionary not found: {path}")]
    MissingReference { path: PathBuf },

    #[error("Data dictionary has changed: {detail} ({path})")]
    Drift { path: PathBuf, detail: String },
}

impl DictionaryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
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

pub type Result<T> = std::result::Result<T, DictionaryError>;
