//! File name resolution against the data dictionary.

use std::sync::LazyLock;

use dm_dictionary::DataDictionary;
use dm_model::{Identifier, Issue, ParsedFileName};
use regex::Regex;

static EXCEPTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<id>sub-\d+_[\w\-]+_s\d+_r\d+_e\d+)-(?P<kind>deviation|no-data)\.txt$")
        .expect("Invalid exception file regex")
});

pub const ISSUE_FILE: &str = "issue.txt";
pub const LEGACY_DEVIATION_FILE: &str = "deviation.txt";
pub const LEGACY_NO_DATA_FILE: &str = "no-data.txt";

/// What a file in a group directory is, judged by its name alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileClass {
    Data(ParsedFileName),
    /// `<identifier>-deviation.txt`
    Deviation(Identifier),
    /// `<identifier>-no-data.txt`
    NoData(Identifier),
    /// Bare `deviation.txt`, legacy mode only.
    GroupDeviation,
    /// Bare `no-data.txt`, legacy mode only.
    GroupNoData,
    IssueFile,
    Unparsed,
}

impl FileClass {
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Self::Deviation(_) | Self::NoData(_) | Self::GroupDeviation | Self::GroupNoData
        )
    }
}

/// Resolves file names to identifiers and reports naming issues.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    dictionary: &'a DataDictionary,
    legacy_exceptions: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(dictionary: &'a DataDictionary, legacy_exceptions: bool) -> Self {
        Self {
            dictionary,
            legacy_exceptions,
        }
    }

    pub fn legacy_exceptions(&self) -> bool {
        self.legacy_exceptions
    }

    pub fn classify(&self, file_name: &str) -> FileClass {
        if file_name == ISSUE_FILE {
            return FileClass::IssueFile;
        }
        if self.legacy_exceptions {
            match file_name {
                LEGACY_DEVIATION_FILE => return FileClass::GroupDeviation,
                LEGACY_NO_DATA_FILE => return FileClass::GroupNoData,
                _ => {}
            }
        }
        if let Some(caps) = EXCEPTION_REGEX.captures(file_name)
            && let Ok(identifier) = caps["id"].parse::<Identifier>()
        {
            return if &caps["kind"] == "deviation" {
                FileClass::Deviation(identifier)
            } else {
                FileClass::NoData(identifier)
            };
        }
        match ParsedFileName::parse(file_name) {
            Ok(parsed) => FileClass::Data(parsed),
            Err(_) => FileClass::Unparsed,
        }
    }

    /// Parse a data file name, or explain every token that is wrong with it.
    pub fn resolve(&self, file_name: &str) -> Result<ParsedFileName, Vec<Issue>> {
        let Ok(parsed) = ParsedFileName::parse(file_name) else {
            return Err(vec![Issue::UnmatchedName {
                file: file_name.to_string(),
            }]);
        };
        let issues = self.check_file(&parsed, file_name);
        if issues.is_empty() {
            Ok(parsed)
        } else {
            Err(issues)
        }
    }

    /// Naming issues of a parsed data file.
    pub fn check_file(&self, parsed: &ParsedFileName, file_name: &str) -> Vec<Issue> {
        let Some(row) = self.dictionary.get(&parsed.identifier.variable) else {
            return vec![Issue::UnknownVariable {
                variable: parsed.identifier.variable.clone(),
                file: file_name.to_string(),
            }];
        };
        let mut issues = Vec::new();
        if !row
            .expected_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(&parsed.extension))
        {
            issues.push(Issue::DisallowedExtension {
                extension: parsed.extension.clone(),
                allowed: row.expected_extensions.clone(),
                file: file_name.to_string(),
            });
        }
        issues.extend(self.check_identifier(&parsed.identifier, file_name));
        issues
    }

    /// Subject range and suffix issues shared by data and exception files.
    ///
    /// Unknown variables are reported here as well so exception files for
    /// misspelled variables do not pass silently.
    pub fn check_identifier(&self, identifier: &Identifier, file_name: &str) -> Vec<Issue> {
        let Some(row) = self.dictionary.get(&identifier.variable) else {
            return vec![Issue::UnknownVariable {
                variable: identifier.variable.clone(),
                file: file_name.to_string(),
            }];
        };
        let mut issues = Vec::new();
        if let Some(ranges) = self.dictionary.subject_ranges()
            && !ranges.contains(identifier.subject.as_str())
        {
            issues.push(Issue::SubjectOutOfRange {
                subject: identifier.subject.to_string(),
                ranges: ranges.to_string(),
                file: file_name.to_string(),
            });
        }
        if !row.allowed_suffixes.contains(&identifier.suffix) {
            issues.push(Issue::DisallowedSuffix {
                suffix: identifier.suffix.to_string(),
                allowed: row.allowed_suffixes.iter().map(ToString::to_string).collect(),
            });
        }
        issues
    }
}
