//! Core types for the study data monitor.
//!
//! Identifiers, data dictionary rows, validation issues and the rows of the
//! persisted monitoring tables. Nothing here touches the filesystem.

#![deny(unsafe_code)]

pub mod context;
pub mod dictionary;
pub mod error;
pub mod identifier;
pub mod issue;
pub mod records;

pub use context::{RunContext, TIMESTAMP_FORMAT};
pub use dictionary::{
    AllowedValues, DictionaryRow, Provenance, RedcapSource, SpecialColumn, SubjectRanges,
    VariableKind,
};
pub use error::{ModelError, Result};
pub use identifier::{
    Identifier, ParsedFileName, SessionRun, SubjectId, Suffix, parse_identifiers,
    unique_subject_sessions,
};
pub use issue::{EegReference, Issue, IssueCategory, PsychopyCompanion};
pub use records::{PendingEntry, PendingError, QaChecklistEntry, ValidatedFileRecord};
