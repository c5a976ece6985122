//! REDCap exports under `sourcedata/checked/redcap/`.
//!
//! Exports are named `<stem>_DATA_YYYY-MM-DD_HHMM.csv`. Only the newest
//! file of each stem is read. A stem ends with the dictionary's source name,
//! optionally followed by a session tag (`s1r1` or `s1`) when the instrument
//! is exported once per session.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use dm_model::{SessionRun, SubjectId};
use dm_store::{file_name_of, list_dirs_sorted, list_files_sorted, read_records};
use regex::Regex;
use tracing::{debug, info};

use crate::error::{Result, TrackerError};
use crate::value::TrackerValue;

static EXPORT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<stem>.+)_DATA_(?P<ts>\d{4}-\d{2}-\d{2}_\d{4})\.csv$")
        .expect("Invalid REDCap export regex")
});

static SESSION_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^s(?P<s>\d+)(?:r(?P<r>\d+))?$").expect("Invalid REDCap session tag regex")
});

const COMPLETE_SUFFIX: &str = "_complete";
const COMPLETE_VALUE: &str = "2";

/// How export headers are rewritten before use.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnRemap {
    #[default]
    Keep,
    /// Replace every header, in order.
    Replace(Vec<String>),
    /// Rename individual headers `old -> new`.
    Rename(Vec<(String, String)>),
}

impl ColumnRemap {
    fn apply(&self, headers: Vec<String>, path: &Path) -> Result<Vec<String>> {
        match self {
            Self::Keep => Ok(headers),
            Self::Replace(replacement) => {
                if replacement.len() != headers.len() {
                    return Err(TrackerError::integrity(format!(
                        "{} replacement columns given but {} has {} columns",
                        replacement.len(),
                        file_name_of(path),
                        headers.len()
                    )));
                }
                Ok(replacement.clone())
            }
            Self::Rename(pairs) => Ok(headers
                .into_iter()
                .map(|header| {
                    pairs
                        .iter()
                        .find(|(old, _)| *old == header)
                        .map_or(header, |(_, new)| new.clone())
                })
                .collect()),
        }
    }
}

/// Session an export covers, read from the end of its stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportSession {
    /// No session tag: one export for the whole study.
    All,
    Session { session: u32, run: Option<u32> },
}

impl ExportSession {
    fn covers(&self, session_run: SessionRun) -> bool {
        match self {
            Self::All => false,
            Self::Session { session, run } => {
                *session == session_run.session && run.is_none_or(|r| r == session_run.run)
            }
        }
    }
}

/// The newest export of one stem, headers already remapped.
#[derive(Debug, Clone)]
pub struct RedcapExport {
    path: PathBuf,
    stem: String,
    timestamp: String,
    headers: Vec<String>,
    records: Vec<Vec<String>>,
}

impl RedcapExport {
    fn load(path: PathBuf, stem: String, timestamp: String, remap: &ColumnRemap) -> Result<Self> {
        let (headers, records) = read_records(&path)?;
        let headers = remap.apply(headers, &path)?;
        debug!(path = %path.display(), records = records.len(), "loaded REDCap export");
        Ok(Self {
            path,
            stem,
            timestamp,
            headers,
            records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Header names that occur more than once, sorted.
    pub fn duplicate_headers(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for header in &self.headers {
            if !seen.insert(header.as_str()) {
                duplicates.insert(header.clone());
            }
        }
        duplicates.into_iter().collect()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    fn session_for(&self, source: &str) -> Option<ExportSession> {
        let stem = self.stem.to_ascii_lowercase();
        let source = source.to_ascii_lowercase();
        let start = stem.rfind(&source)?;
        let tag = &stem[start + source.len()..];
        if tag.is_empty() {
            return Some(ExportSession::All);
        }
        let caps = SESSION_TAG_REGEX.captures(tag)?;
        Some(ExportSession::Session {
            session: caps["s"].parse().ok()?,
            run: caps.name("r").and_then(|m| m.as_str().parse().ok()),
        })
    }

    /// Cell of `subject` in column `column`; `None` when the subject has no
    /// record.
    fn cell(&self, id_column: usize, column: usize, subject: &SubjectId) -> Option<&str> {
        self.records
            .iter()
            .find(|record| {
                record
                    .get(id_column)
                    .is_some_and(|id| same_subject(id, subject))
            })
            .map(|record| record.get(column).map_or("", String::as_str))
    }
}

fn same_subject(cell: &str, subject: &SubjectId) -> bool {
    let cell = cell.trim();
    if cell == subject.as_str() {
        return true;
    }
    // spreadsheets sometimes store ids as floats
    match (cell.parse::<f64>(), subject.number()) {
        (Ok(value), Some(number)) => value.fract() == 0.0 && value as u64 == number,
        _ => false,
    }
}

/// Every usable export found in the REDCap directory.
#[derive(Debug, Clone, Default)]
pub struct RedcapExports {
    exports: Vec<RedcapExport>,
}

impl RedcapExports {
    /// Load the newest export of every stem below `dir`. A missing directory
    /// yields no exports.
    pub fn discover(dir: &Path, remap: &ColumnRemap) -> Result<Self> {
        let mut newest: BTreeMap<String, (String, PathBuf)> = BTreeMap::new();
        for path in walk_files(dir)? {
            let name = file_name_of(&path);
            let Some(caps) = EXPORT_REGEX.captures(&name) else {
                debug!(file = %name, "ignoring file that is not a REDCap export");
                continue;
            };
            let stem = caps["stem"].to_string();
            let timestamp = caps["ts"].to_string();
            match newest.get(&stem) {
                Some((existing, _)) if *existing >= timestamp => {}
                _ => {
                    newest.insert(stem, (timestamp, path));
                }
            }
        }

        let mut exports = Vec::with_capacity(newest.len());
        for (stem, (timestamp, path)) in newest {
            exports.push(RedcapExport::load(path, stem, timestamp, remap)?);
        }
        info!(exports = exports.len(), "Found REDCap exports");
        Ok(Self { exports })
    }

    pub fn exports(&self) -> &[RedcapExport] {
        &self.exports
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }

    /// Index of the export holding `source` data for `session_run`.
    ///
    /// A session-tagged export matching the session wins; otherwise the
    /// newest untagged export is used. Unsuffixed variables only ever use
    /// untagged exports.
    pub fn select(&self, source: &str, session_run: Option<SessionRun>) -> Option<usize> {
        session_run
            .and_then(|sr| self.newest_matching(source, |session| session.covers(sr)))
            .or_else(|| self.newest_matching(source, |session| session == ExportSession::All))
    }

    fn newest_matching(
        &self,
        source: &str,
        matches: impl Fn(ExportSession) -> bool,
    ) -> Option<usize> {
        self.exports
            .iter()
            .enumerate()
            .filter(|(_, export)| export.session_for(source).is_some_and(&matches))
            .max_by(|(_, a), (_, b)| a.timestamp.cmp(&b.timestamp))
            .map(|(idx, _)| idx)
    }

    pub fn get(&self, index: usize) -> Option<&RedcapExport> {
        self.exports.get(index)
    }
}

fn walk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = list_files_sorted(dir)?;
    for sub in list_dirs_sorted(dir)? {
        files.extend(walk_files(&sub)?);
    }
    Ok(files)
}

/// Default export column for a REDCap variable.
pub fn completion_column(variable: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{variable}_{suffix}{COMPLETE_SUFFIX}"),
        None => format!("{variable}{COMPLETE_SUFFIX}"),
    }
}

/// A resolved REDCap lookup: which export and which column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedcapBinding {
    pub export: usize,
    pub id_column: usize,
    pub column: usize,
}

impl RedcapBinding {
    /// `*_complete` columns count `2` as done; any other column counts a
    /// non-empty cell. Subjects absent from the export read as `NA`.
    pub fn value(&self, exports: &RedcapExports, subject: &SubjectId) -> TrackerValue {
        let Some(export) = exports.get(self.export) else {
            return TrackerValue::Na;
        };
        let Some(cell) = export.cell(self.id_column, self.column, subject) else {
            return TrackerValue::Na;
        };
        let header = export.headers.get(self.column).map_or("", String::as_str);
        let cell = cell.trim();
        if header.ends_with(COMPLETE_SUFFIX) {
            TrackerValue::from_bool(cell == COMPLETE_VALUE || cell == "2.0")
        } else {
            TrackerValue::from_bool(!cell.is_empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn keeps_newest_export_per_stem() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "thrive_consent_DATA_2024-01-01_1230.csv", "record_id\n1\n");
        write(dir.path(), "thrive_consent_DATA_2024-02-01_0900.csv", "record_id\n2\n");
        write(dir.path(), "thrive_bbschilds1r1_DATA_2023-12-01_0900.csv", "record_id\n3\n");
        write(dir.path(), "notes.txt", "not an export");

        let exports = RedcapExports::discover(dir.path(), &ColumnRemap::Keep).unwrap();
        let stamps: Vec<(&str, &str)> = exports
            .exports()
            .iter()
            .map(|e| (e.stem(), e.timestamp()))
            .collect();
        assert_eq!(
            stamps,
            vec![
                ("thrive_bbschilds1r1", "2023-12-01_0900"),
                ("thrive_consent", "2024-02-01_0900"),
            ]
        );
    }

    #[test]
    fn selects_session_export_before_untagged() {
        let dir = TempDir::new().unwrap();
        for name in [
            "study_bbschild_DATA_2024-01-01_1230.csv",
            "study_bbschilds1r1_DATA_2024-01-01_1230.csv",
            "study_bbschilds2_DATA_2024-01-01_1230.csv",
        ] {
            write(dir.path(), name, "record_id\n");
        }
        let exports = RedcapExports::discover(dir.path(), &ColumnRemap::Keep).unwrap();
        let stem_of = |sr: Option<&str>| {
            let sr = sr.map(|s| s.parse::<SessionRun>().unwrap());
            exports
                .select("bbschild", sr)
                .map(|idx| exports.get(idx).unwrap().stem().to_string())
        };
        assert_eq!(stem_of(Some("s1_r1")).as_deref(), Some("study_bbschilds1r1"));
        assert_eq!(stem_of(Some("s2_r3")).as_deref(), Some("study_bbschilds2"));
        assert_eq!(stem_of(Some("s3_r1")).as_deref(), Some("study_bbschild"));
        assert_eq!(stem_of(None).as_deref(), Some("study_bbschild"));
        assert_eq!(exports.select("iqschild", None), None);
    }

    #[test]
    fn remaps_headers_before_use() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "x_consent_DATA_2024-01-01_1230.csv",
            "participant,consent_yn_complete\n3000001,2\n",
        );
        let remap = ColumnRemap::Rename(vec![
            ("participant".into(), "record_id".into()),
            ("consent_yn_complete".into(), "consent_complete".into()),
        ]);
        let exports = RedcapExports::discover(dir.path(), &remap).unwrap();
        assert_eq!(exports.exports()[0].headers(), ["record_id", "consent_complete"]);

        let replace = ColumnRemap::Replace(vec!["only_one".into()]);
        let err = RedcapExports::discover(dir.path(), &replace).unwrap_err();
        assert!(err.to_string().starts_with("Could not update tracker:"));
    }

    #[test]
    fn completion_and_presence_values() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "x_consent_DATA_2024-01-01_1230.csv",
            "record_id,consent_complete,notes\n3000001,2,\n3000002.0,1,seen\n",
        );
        let exports = RedcapExports::discover(dir.path(), &ColumnRemap::Keep).unwrap();
        let complete = RedcapBinding {
            export: 0,
            id_column: 0,
            column: 1,
        };
        let notes = RedcapBinding { column: 2, ..complete };
        let sub = |id: &str| SubjectId::new(id).unwrap();

        assert_eq!(complete.value(&exports, &sub("3000001")), TrackerValue::One);
        assert_eq!(complete.value(&exports, &sub("3000002")), TrackerValue::Zero);
        assert_eq!(complete.value(&exports, &sub("3000003")), TrackerValue::Na);
        assert_eq!(notes.value(&exports, &sub("3000001")), TrackerValue::Zero);
        assert_eq!(notes.value(&exports, &sub("3000002")), TrackerValue::One);
    }

    #[test]
    fn reports_duplicate_headers() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "x_consent_DATA_2024-01-01_1230.csv",
            "record_id,consent_complete,a,consent_complete,a\n",
        );
        let exports = RedcapExports::discover(dir.path(), &ColumnRemap::Keep).unwrap();
        assert_eq!(
            exports.exports()[0].duplicate_headers(),
            vec!["a", "consent_complete"]
        );
    }
}
