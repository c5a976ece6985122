//! Data dictionary for the study data monitor.
//!
//! The dictionary is the schema for a dataset: it declares every variable,
//! the folder datatype its files live in, allowed suffixes, expected
//! extensions and how tracker columns are derived. Loading validates the
//! cross references between rows; [`check_drift`] guards against the
//! dictionary changing underneath a dataset.

pub mod csv_utils;
pub mod dictionary;
pub mod drift;
pub mod error;
pub mod hash;

pub use dictionary::{DEFAULT_REDCAP_ID_COLUMN, DataDictionary};
pub use drift::check_drift;
pub use error::{DictionaryError, Result};
pub use hash::{file_sha256, sha256_hex};
