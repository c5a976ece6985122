use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid identifier format: {0}")]
    InvalidIdentifier(String),
    #[error("invalid suffix format: {0}")]
    InvalidSuffix(String),
    #[error("invalid session/run format: {0}")]
    InvalidSessionRun(String),
    #[error("invalid subject id: {0}")]
    InvalidSubject(String),
    #[error("file name does not match identifier format: {0}")]
    InvalidFileName(String),
    #[error("invalid allowed values {value}: {message}")]
    InvalidAllowedValues { value: String, message: String },
}

pub type Result<T> = std::result::Result<T, ModelError>;
