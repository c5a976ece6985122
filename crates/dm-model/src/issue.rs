//! Validation issue types.
//!
//! Each variant carries only the data its message needs. The `errorType`
//! and `errorDetails` columns of the pending tables are rendered from here
//! so the wording stays in one place.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Problem category used for summaries and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IssueCategory {
    Naming,
    MissingFile,
    UnexpectedFile,
    EmptyFile,
    ContentMismatch,
    Combination,
    ImproperException,
}

impl IssueCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Naming => "naming",
            Self::MissingFile => "missing file",
            Self::UnexpectedFile => "unexpected file",
            Self::EmptyFile => "empty file",
            Self::ContentMismatch => "content mismatch",
            Self::Combination => "combination",
            Self::ImproperException => "improper exception",
        }
    }
}

/// Which companion file a psychopy `.log` failed to reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsychopyCompanion {
    Psydat,
    Csv,
}

impl PsychopyCompanion {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Psydat => "psydat",
            Self::Csv => "csv",
        }
    }
}

/// A `KEY=value` reference inside an EEG header or marker file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EegReference {
    /// `MarkerFile=` in the `.vhdr`.
    HeaderMarker,
    /// `DataFile=` in the `.vhdr`.
    HeaderData,
    /// `DataFile=` in the `.vmrk`.
    MarkerData,
}

impl EegReference {
    pub fn key(&self) -> &'static str {
        match self {
            Self::HeaderMarker => "MarkerFile",
            Self::HeaderData | Self::MarkerData => "DataFile",
        }
    }

    pub fn container(&self) -> &'static str {
        match self {
            Self::HeaderMarker | Self::HeaderData => "vhdr",
            Self::MarkerData => "vmrk",
        }
    }
}

/// Non-fatal validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Issue {
    // Naming
    UnmatchedName {
        file: String,
    },
    UnknownVariable {
        variable: String,
        file: String,
    },
    DisallowedSuffix {
        suffix: String,
        allowed: Vec<String>,
    },
    DisallowedExtension {
        extension: String,
        allowed: Vec<String>,
        file: String,
    },
    SubjectOutOfRange {
        subject: String,
        ranges: String,
        file: String,
    },

    // Presence
    MissingFile {
        file: String,
    },
    UnexpectedFile {
        file: String,
    },
    EmptyFile {
        path: String,
    },
    MisplacedFile {
        file: String,
        directory: String,
    },
    IssueFile,

    // Exceptions
    LoneDeviation,
    DeviationWithNoData,

    // Combination rows
    CombinationConflict {
        row: String,
    },
    CombinationEmpty {
        row: String,
    },

    // Content
    PsychopyNoData {
        path: String,
    },
    PsychopyLogReference {
        companion: PsychopyCompanion,
        found: Option<String>,
        expected: String,
    },
    PsychopyIdMissing {
        expected: String,
        column_present: bool,
    },
    PsychopyIdMismatch {
        values: Vec<String>,
        expected: String,
    },
    EegCrossReference {
        reference: EegReference,
        found: Option<String>,
        expected: String,
    },
}

impl Issue {
    /// Text written to the `errorType` column.
    pub fn error_type(&self) -> &'static str {
        match self {
            Issue::UnmatchedName { .. }
            | Issue::UnknownVariable { .. }
            | Issue::DisallowedSuffix { .. }
            | Issue::DisallowedExtension { .. }
            | Issue::SubjectOutOfRange { .. } => "Naming error",
            Issue::MissingFile { .. } => "Missing file",
            Issue::UnexpectedFile { .. } => "Unexpected file",
            Issue::EmptyFile { .. } => "Empty file",
            Issue::MisplacedFile { .. } => "Misplaced file",
            Issue::IssueFile => "Issue file",
            Issue::LoneDeviation | Issue::DeviationWithNoData => "Improper exception files",
            Issue::CombinationConflict { .. } | Issue::CombinationEmpty { .. } => {
                "Combination variable error"
            }
            Issue::PsychopyNoData { .. }
            | Issue::PsychopyLogReference { .. }
            | Issue::PsychopyIdMissing { .. }
            | Issue::PsychopyIdMismatch { .. } => "Psychopy error",
            Issue::EegCrossReference { .. } => "EEG error",
        }
    }

    pub fn category(&self) -> IssueCategory {
        match self {
            Issue::UnmatchedName { .. }
            | Issue::UnknownVariable { .. }
            | Issue::DisallowedSuffix { .. }
            | Issue::DisallowedExtension { .. }
            | Issue::SubjectOutOfRange { .. } => IssueCategory::Naming,
            Issue::MissingFile { .. } => IssueCategory::MissingFile,
            Issue::UnexpectedFile { .. } => IssueCategory::UnexpectedFile,
            Issue::EmptyFile { .. } => IssueCategory::EmptyFile,
            Issue::MisplacedFile { .. }
            | Issue::IssueFile
            | Issue::PsychopyNoData { .. }
            | Issue::PsychopyLogReference { .. }
            | Issue::PsychopyIdMissing { .. }
            | Issue::PsychopyIdMismatch { .. }
            | Issue::EegCrossReference { .. } => IssueCategory::ContentMismatch,
            Issue::LoneDeviation | Issue::DeviationWithNoData => IssueCategory::ImproperException,
            Issue::CombinationConflict { .. } | Issue::CombinationEmpty { .. } => {
                IssueCategory::Combination
            }
        }
    }

    /// Text written to the `errorDetails` column.
    pub fn details(&self) -> String {
        match self {
            Issue::UnmatchedName { file } => {
                format!("File {file} does not match expected identifier format")
            }
            Issue::UnknownVariable { variable, file } => {
                format!("Variable {variable} in file {file} not found in data dictionary")
            }
            Issue::DisallowedSuffix { suffix, allowed } => {
                format!("Suffix {suffix} not in allowed suffixes [{}]", allowed.join(", "))
            }
            Issue::DisallowedExtension {
                extension,
                allowed,
                file,
            } => format!(
                "File extension {extension} doesn't match expected extensions [{}] in file {file}",
                allowed.join(", ")
            ),
            Issue::SubjectOutOfRange {
                subject,
                ranges,
                file,
            } => format!(
                "Subject number {subject} not an allowed subject value {ranges} in file {file}"
            ),
            Issue::MissingFile { file } => format!("Expected file {file} not found"),
            Issue::UnexpectedFile { file } => format!("Unexpected file {file} found"),
            Issue::EmptyFile { path } => format!("Found empty file {path}"),
            Issue::MisplacedFile { file, directory } => {
                format!("Found file in wrong directory: {file} found in {directory}/")
            }
            Issue::IssueFile => "Found issue.txt in identifier's directory".to_string(),
            Issue::LoneDeviation => {
                "deviation.txt cannot signify only 1 file; use no-data.txt.".to_string()
            }
            Issue::DeviationWithNoData => {
                "Both deviation and no-data files present for identifier".to_string()
            }
            Issue::CombinationConflict { row } => {
                format!("Multiple variables present for combination row {row}, expected one.")
            }
            Issue::CombinationEmpty { row } => {
                format!("Combination row {row} has no variables present.")
            }
            Issue::PsychopyNoData { path } => format!("No data found in {path}"),
            Issue::PsychopyLogReference {
                companion,
                found: Some(found),
                expected,
            } => format!(
                "Incorrect .{ext} file {found} in .log file, expected {expected}",
                ext = companion.extension()
            ),
            Issue::PsychopyLogReference {
                companion,
                found: None,
                ..
            } => format!("No .{} file found in .log file", companion.extension()),
            Issue::PsychopyIdMissing {
                column_present: true,
                expected,
            } => format!("NaN value seen under ID in .csv file, expected {expected}"),
            Issue::PsychopyIdMissing {
                column_present: false,
                expected,
            } => format!("No ID column found in .csv file, expected {expected}"),
            Issue::PsychopyIdMismatch { values, expected } => format!(
                "ID value(s) [{}] in csvfile different from ID in filename ({expected})",
                values.join(", ")
            ),
            Issue::EegCrossReference {
                reference,
                found: Some(found),
                expected,
            } => format!(
                "Incorrect {} {found} in .{} file, expected {expected}",
                reference.key(),
                reference.container()
            ),
            Issue::EegCrossReference {
                reference,
                found: None,
                ..
            } => format!(
                "No {} found in .{} file",
                reference.key(),
                reference.container()
            ),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type(), self.details())
    }
}
