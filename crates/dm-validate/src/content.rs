//! Content checks keyed by folder datatype.
//!
//! Each datatype that needs to look inside its files registers a
//! [`ContentCheck`]. The engine hands every non-empty, exactly named file of
//! an expected identifier to the check for its folder datatype.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use dm_model::{EegReference, Identifier, Issue, PsychopyCompanion};
use regex::Regex;

use crate::error::{Result, ValidateError};

static PSYDAT_REF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"saved data to\s(.+\.psydat)").expect("Invalid psydat reference regex")
});

static CSV_REF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"saved data to\s(.+\.csv)").expect("Invalid csv reference regex")
});

static MARKER_FILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"MarkerFile=(.+)").expect("Invalid MarkerFile regex"));

static DATA_FILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DataFile=(.+)").expect("Invalid DataFile regex"));

/// One file handed to a content check.
#[derive(Debug, Clone, Copy)]
pub struct ContentInput<'a> {
    pub identifier: &'a Identifier,
    /// Extension with its leading dot.
    pub extension: &'a str,
    pub path: &'a Path,
}

impl ContentInput<'_> {
    fn read_text(&self) -> Result<String> {
        let bytes = fs::read(self.path).map_err(|e| ValidateError::io(self.path, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Datatype-specific inspection of file contents.
pub trait ContentCheck: Send + Sync {
    /// Folder datatype this check applies to.
    fn datatype(&self) -> &str;

    fn check(&self, input: &ContentInput<'_>) -> Result<Vec<Issue>>;

    /// Extra issue reported when a file of this datatype is zero bytes.
    fn empty_file(&self, _relative_path: &str) -> Option<Issue> {
        None
    }
}

/// Registered content checks by datatype.
pub struct ContentRegistry {
    checks: BTreeMap<String, Box<dyn ContentCheck>>,
}

impl ContentRegistry {
    pub fn empty() -> Self {
        Self {
            checks: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, check: Box<dyn ContentCheck>) {
        self.checks.insert(check.datatype().to_string(), check);
    }

    pub fn get(&self, datatype: &str) -> Option<&dyn ContentCheck> {
        self.checks.get(datatype).map(Box::as_ref)
    }

    pub fn datatypes(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }
}

impl Default for ContentRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(PsychopyCheck));
        registry.register(Box::new(EegCheck));
        registry
    }
}

impl std::fmt::Debug for ContentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentRegistry")
            .field("datatypes", &self.checks.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Last path component of a reference written inside a file.
fn referenced_name(raw: &str) -> String {
    let trimmed = raw.trim_matches(|c: char| c == '\'' || c == '"' || c.is_whitespace());
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

/// PsychoPy task output: `.log`, `.csv` and `.psydat`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PsychopyCheck;

impl PsychopyCheck {
    fn check_log(&self, identifier: &Identifier, contents: &str) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (companion, regex) in [
            (PsychopyCompanion::Psydat, &*PSYDAT_REF_REGEX),
            (PsychopyCompanion::Csv, &*CSV_REF_REGEX),
        ] {
            let expected = identifier.file_name(&format!(".{}", companion.extension()));
            let found = regex
                .captures(contents)
                .map(|caps| referenced_name(&caps[1]));
            if found.as_deref() != Some(expected.as_str()) {
                issues.push(Issue::PsychopyLogReference {
                    companion,
                    found,
                    expected,
                });
            }
        }
        issues
    }

    fn check_csv(&self, identifier: &Identifier, contents: &str) -> Result<Vec<Issue>> {
        let expected = identifier.subject.to_string();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(contents.as_bytes());
        let headers: Vec<String> = match reader.headers() {
            Ok(headers) => headers
                .iter()
                .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
                .collect(),
            Err(_) => Vec::new(),
        };
        let Some(column) = headers
            .iter()
            .position(|h| h == "id")
            .or_else(|| headers.iter().position(|h| h == "participant"))
        else {
            return Ok(vec![Issue::PsychopyIdMissing {
                expected,
                column_present: false,
            }]);
        };

        let mut blank = false;
        let mut mismatched = BTreeSet::new();
        for record in reader.records() {
            let Ok(record) = record else {
                continue;
            };
            let value = record.get(column).unwrap_or("").trim();
            if value.is_empty() || value.eq_ignore_ascii_case("nan") {
                blank = true;
            } else if value != expected {
                mismatched.insert(value.to_string());
            }
        }
        if blank {
            return Ok(vec![Issue::PsychopyIdMissing {
                expected,
                column_present: true,
            }]);
        }
        if mismatched.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![Issue::PsychopyIdMismatch {
                values: mismatched.into_iter().collect(),
                expected,
            }])
        }
    }
}

impl ContentCheck for PsychopyCheck {
    fn datatype(&self) -> &str {
        "psychopy"
    }

    fn check(&self, input: &ContentInput<'_>) -> Result<Vec<Issue>> {
        match input.extension {
            ".log" => Ok(self.check_log(input.identifier, &input.read_text()?)),
            ".csv" => self.check_csv(input.identifier, &input.read_text()?),
            _ => Ok(Vec::new()),
        }
    }

    fn empty_file(&self, relative_path: &str) -> Option<Issue> {
        Some(Issue::PsychopyNoData {
            path: relative_path.to_string(),
        })
    }
}

/// BrainVision recordings: `.vhdr` header, `.vmrk` markers, `.eeg` data.
#[derive(Debug, Clone, Copy, Default)]
pub struct EegCheck;

impl EegCheck {
    fn check_reference(
        reference: EegReference,
        regex: &Regex,
        contents: &str,
        expected: String,
    ) -> Option<Issue> {
        let found = regex
            .captures(contents)
            .map(|caps| referenced_name(&caps[1]));
        if found.as_deref() == Some(expected.as_str()) {
            None
        } else {
            Some(Issue::EegCrossReference {
                reference,
                found,
                expected,
            })
        }
    }
}

impl ContentCheck for EegCheck {
    fn datatype(&self) -> &str {
        "eeg"
    }

    fn check(&self, input: &ContentInput<'_>) -> Result<Vec<Issue>> {
        let id = input.identifier;
        let issues = match input.extension {
            ".vhdr" => {
                let contents = input.read_text()?;
                [
                    Self::check_reference(
                        EegReference::HeaderMarker,
                        &MARKER_FILE_REGEX,
                        &contents,
                        id.file_name(".vmrk"),
                    ),
                    Self::check_reference(
                        EegReference::HeaderData,
                        &DATA_FILE_REGEX,
                        &contents,
                        id.file_name(".eeg"),
                    ),
                ]
                .into_iter()
                .flatten()
                .collect()
            }
            ".vmrk" => {
                let contents = input.read_text()?;
                Self::check_reference(
                    EegReference::MarkerData,
                    &DATA_FILE_REGEX,
                    &contents,
                    id.file_name(".eeg"),
                )
                .into_iter()
                .collect()
            }
            _ => Vec::new(),
        };
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn identifier(variable: &str) -> Identifier {
        format!("sub-3000001_{variable}_s1_r1_e1").parse().unwrap()
    }

    fn run(check: &dyn ContentCheck, id: &Identifier, ext: &str, contents: &str) -> Vec<Issue> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(id.file_name(ext));
        fs::write(&path, contents).unwrap();
        check
            .check(&ContentInput {
                identifier: id,
                extension: ext,
                path: &path,
            })
            .unwrap()
    }

    #[test]
    fn log_must_reference_both_companions() {
        let id = identifier("arrow-alert-v1-1_psychopy");
        let good = format!(
            "saved data to '/home/ra/{id}.psydat'\nsaved data to '/home/ra/{id}.csv'\n"
        );
        assert!(run(&PsychopyCheck, &id, ".log", &good).is_empty());

        let issues = run(
            &PsychopyCheck,
            &id,
            ".log",
            "saved data to 'C:\\data\\other.psydat'\n",
        );
        assert_eq!(issues.len(), 2);
        assert_eq!(
            issues[0].details(),
            format!("Incorrect .psydat file other.psydat in .log file, expected {id}.psydat")
        );
        assert_eq!(issues[1].details(), "No .csv file found in .log file");
    }

    #[test]
    fn csv_id_column_checks() {
        let id = identifier("arrow-alert-v1-1_psychopy");
        assert!(run(&PsychopyCheck, &id, ".csv", "participant,x\n3000001,1\n").is_empty());

        let issues = run(&PsychopyCheck, &id, ".csv", "trial,x\n1,2\n");
        assert_eq!(
            issues[0].details(),
            "No ID column found in .csv file, expected 3000001"
        );

        let issues = run(&PsychopyCheck, &id, ".csv", "id,x\n3000001,1\n,2\n");
        assert_eq!(
            issues[0].details(),
            "NaN value seen under ID in .csv file, expected 3000001"
        );

        let issues = run(
            &PsychopyCheck,
            &id,
            ".csv",
            "id,x\n3000009,1\n3000000,2\n3000009,3\n3000001,4\n",
        );
        assert_eq!(
            issues,
            vec![Issue::PsychopyIdMismatch {
                values: vec!["3000000".into(), "3000009".into()],
                expected: "3000001".into(),
            }]
        );
    }

    #[test]
    fn eeg_header_and_marker_references() {
        let id = identifier("all_eeg");
        let header = format!("DataFile={id}.eeg\nMarkerFile={id}.vmrk\n");
        assert!(run(&EegCheck, &id, ".vhdr", &header).is_empty());

        let issues = run(&EegCheck, &id, ".vhdr", "DataFile=wrong.eeg\n");
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].details(), "No MarkerFile found in .vhdr file");
        assert_eq!(
            issues[1].details(),
            format!("Incorrect DataFile wrong.eeg in .vhdr file, expected {id}.eeg")
        );

        let issues = run(&EegCheck, &id, ".vmrk", "DataFile=x.eeg\r\n");
        assert_eq!(
            issues[0].details(),
            format!("Incorrect DataFile x.eeg in .vmrk file, expected {id}.eeg")
        );
        assert!(run(&EegCheck, &id, ".eeg", "binary").is_empty());
    }

    #[test]
    fn registry_dispatches_by_datatype() {
        let registry = ContentRegistry::default();
        assert_eq!(registry.datatypes().collect::<Vec<_>>(), vec!["eeg", "psychopy"]);
        assert!(registry.get("zoom").is_none());
        let psychopy = registry.get("psychopy").unwrap();
        assert_eq!(
            psychopy.empty_file("a/b.csv"),
            Some(Issue::PsychopyNoData {
                path: "a/b.csv".into()
            })
        );
        assert_eq!(registry.get("eeg").unwrap().empty_file("a/b.eeg"), None);
    }
}
