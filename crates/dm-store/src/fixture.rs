//! Generated datasets for integration tests.
//!
//! A base subject is described once as a set of templated paths and
//! contents. [`TemplateSubstitution`] fills the `{{name}}` placeholders in a
//! single pass, and [`FixtureContext`] hands out subject ids so every test
//! gets its own subject without shared counters.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::layout::DatasetLayout;

pub const BASE_SUBJECT: u64 = 3_000_000;
pub const DATASET_NAME: &str = "testdataset";
pub const SESSIONS: [&str; 3] = ["s1_r1", "s2_r1", "s3_r1"];
pub const CONSENT_EXPORT: &str = "thrive_thriveconsent_DATA_2024-01-01_1230.csv";
pub const EXPORT_STAMP: &str = "2024-01-01_1230";

pub const DICTIONARY_COLUMNS: [&str; 10] = [
    "variable",
    "dataType",
    "description",
    "detail",
    "allowedSuffix",
    "measureUnit",
    "allowedValues",
    "valueInfo",
    "provenance",
    "expectedFileExt",
];

const ALL_SUFFIXES: &str = "s1_r1_e1, s2_r1_e1, s3_r1_e1";

const BASE_DICTIONARY: &[[&str; 10]] = &[
    [
        "id",
        "id",
        "Participant ID",
        "",
        "NA",
        "",
        "[3000000,3009999],[3080000,3089999],[3090000,3099999]",
        "",
        r#"file: "thriveconsent"; variable: "record_id""#,
        "NA",
    ],
    [
        "consent",
        "consent",
        "Consent form completed",
        "",
        "NA",
        "",
        "NA, 0, 1",
        "",
        r#"file: "thriveconsent"; variable: """#,
        "NA",
    ],
    [
        "assent",
        "assent",
        "Assent form completed",
        "",
        "NA",
        "",
        "NA, 0, 1",
        "",
        r#"file: "thriveconsent"; variable: """#,
        "NA",
    ],
    [
        "arrow-alert-v1-1_psychopy",
        "psychopy",
        "Arrow alert task, version 1.1",
        "",
        ALL_SUFFIXES,
        "",
        "NA, 0, 1",
        "",
        "direct-psychopy",
        ".psydat, .csv, .log",
    ],
    [
        "arrow-alert-v1-2_psychopy",
        "psychopy",
        "Arrow alert task, version 1.2",
        "",
        ALL_SUFFIXES,
        "",
        "NA, 0, 1",
        "",
        "direct-psychopy",
        ".psydat, .csv, .log",
    ],
    [
        "arrow-alert_psychopy",
        "combination",
        "Arrow alert task, any version",
        "",
        ALL_SUFFIXES,
        "",
        "NA, 0, 1",
        "",
        r#"variables: "arrow-alert-v1-1_psychopy","arrow-alert-v1-2_psychopy""#,
        "NA",
    ],
    [
        "all_audacity",
        "audacity",
        "Audio recordings",
        "",
        ALL_SUFFIXES,
        "",
        "NA, 0, 1",
        "",
        "direct-audacity",
        ".zip.gpg",
    ],
    [
        "all_zoom",
        "zoom",
        "Video recordings",
        "",
        ALL_SUFFIXES,
        "",
        "NA, 0, 1",
        "",
        "direct-zoom",
        ".zip.gpg",
    ],
    [
        "all_eeg",
        "eeg",
        "EEG recordings",
        "",
        ALL_SUFFIXES,
        "",
        "NA, 0, 1",
        "",
        "direct-eeg",
        ".eeg, .vmrk, .vhdr",
    ],
    [
        "all_digi",
        "digi",
        "Digital task exports",
        "",
        ALL_SUFFIXES,
        "",
        "NA, 0, 1",
        "",
        "direct-digi",
        ".zip.gpg",
    ],
    [
        "abq",
        "redcap_data",
        "Adult behaviour questionnaire",
        "",
        ALL_SUFFIXES,
        "",
        "NA, 0, 1",
        "",
        r#"file: "bbschild"; variable: """#,
        "NA",
    ],
    [
        "iqs_status",
        "visit_status",
        "In-lab questionnaire visit complete",
        "",
        ALL_SUFFIXES,
        "",
        "NA, 0, 1",
        "",
        r#"variables: "iqs_data""#,
        "NA",
    ],
    [
        "bbs_status",
        "visit_status",
        "Brain and behaviour visit complete",
        "",
        ALL_SUFFIXES,
        "",
        "NA, 0, 1",
        "",
        r#"variables: "bbs_data""#,
        "NA",
    ],
    [
        "iqs_data",
        "visit_data",
        "In-lab questionnaire data present",
        "",
        ALL_SUFFIXES,
        "",
        "NA, 0, 1",
        "",
        r#"variables: "all_audacity","all_zoom""#,
        "NA",
    ],
    [
        "bbs_data",
        "visit_data",
        "Brain and behaviour data present",
        "",
        ALL_SUFFIXES,
        "",
        "NA, 0, 1",
        "",
        r#"variables: "arrow-alert_psychopy","all_eeg","all_digi""#,
        "NA",
    ],
];

/// Fills `{{name}}` placeholders from an explicit replacement map.
///
/// Substitution is a single left-to-right pass: replacement text is never
/// rescanned, and an unknown or unterminated placeholder is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateSubstitution {
    replacements: HashMap<String, String>,
}

impl TemplateSubstitution {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, placeholder: impl Into<String>, value: impl Into<String>) -> Self {
        self.replacements.insert(placeholder.into(), value.into());
        self
    }

    pub fn apply(&self, template: &str) -> io::Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                io::Error::other(format!("unterminated placeholder in {template:?}"))
            })?;
            let name = &after[..end];
            let value = self
                .replacements
                .get(name)
                .ok_or_else(|| io::Error::other(format!("unknown placeholder {{{{{name}}}}}")))?;
            out.push_str(value);
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Per-test source of fresh subject ids.
#[derive(Debug, Clone)]
pub struct FixtureContext {
    next_subject: u64,
}

impl Default for FixtureContext {
    fn default() -> Self {
        Self {
            next_subject: BASE_SUBJECT + 1,
        }
    }
}

impl FixtureContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_subject(&mut self) -> String {
        let id = self.next_subject;
        self.next_subject += 1;
        id.to_string()
    }
}

/// Relative path to a file in the raw tree.
pub fn raw_path(session: &str, datatype: &str, subject: &str, file: &str) -> String {
    format!("sourcedata/raw/{session}/{datatype}/sub-{subject}/{file}")
}

/// Relative path to a file in the checked tree.
pub fn checked_path(session: &str, datatype: &str, subject: &str, file: &str) -> String {
    format!("sourcedata/checked/sub-{subject}/{session}/{datatype}/{file}")
}

/// In-memory dataset: relative path to text contents, plus dictionary rows.
#[derive(Debug, Clone, Default)]
pub struct FixtureFiles {
    files: BTreeMap<String, String>,
    dictionary: Vec<Vec<String>>,
}

impl FixtureFiles {
    /// Complete raw and checked trees for one subject, all three sessions.
    pub fn base(subject: &str) -> io::Result<Self> {
        let substitution = TemplateSubstitution::new().with("sub", subject);
        let mut files = BTreeMap::new();
        for (path, contents) in base_templates() {
            files.insert(substitution.apply(&path)?, substitution.apply(&contents)?);
        }
        let dictionary = BASE_DICTIONARY
            .iter()
            .map(|row| row.iter().map(|v| (*v).to_string()).collect())
            .collect();
        Ok(Self { files, dictionary })
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.files.keys()
    }

    pub fn get(&self, path: &str) -> Option<&String> {
        self.files.get(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.files.remove(path)
    }

    /// Move a file; returns false when `from` is absent.
    pub fn rename(&mut self, from: &str, to: impl Into<String>) -> bool {
        match self.files.remove(from) {
            Some(contents) => {
                self.files.insert(to.into(), contents);
                true
            }
            None => false,
        }
    }

    /// Remove every file under a directory prefix; returns how many went.
    pub fn remove_dir(&mut self, prefix: &str) -> usize {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        let before = self.files.len();
        self.files.retain(|path, _| !path.starts_with(&prefix));
        before - self.files.len()
    }

    /// Append a data dictionary row (in [`DICTIONARY_COLUMNS`] order).
    pub fn add_dictionary_row(&mut self, row: [&str; 10]) {
        self.dictionary
            .push(row.iter().map(|v| (*v).to_string()).collect());
    }

    /// Overwrite one cell of the dictionary row for `variable`; returns
    /// false when the variable or column is unknown.
    pub fn set_dictionary_field(&mut self, variable: &str, column: &str, value: &str) -> bool {
        let Some(index) = DICTIONARY_COLUMNS.iter().position(|c| *c == column) else {
            return false;
        };
        match self.dictionary.iter_mut().find(|row| row[0] == variable) {
            Some(row) => {
                row[index] = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn dictionary_csv(&self) -> io::Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(DICTIONARY_COLUMNS).map_err(io::Error::other)?;
        for row in &self.dictionary {
            writer.write_record(row).map_err(io::Error::other)?;
        }
        let bytes = writer.into_inner().map_err(|e| io::Error::other(e.to_string()))?;
        String::from_utf8(bytes).map_err(io::Error::other)
    }

    /// Write everything below `root`, including both dictionary copies.
    pub fn write_to(&self, root: &Path) -> io::Result<DatasetLayout> {
        let layout = DatasetLayout::new(root);
        for (relative, contents) in &self.files {
            let path = root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, contents)?;
        }
        let dictionary = self.dictionary_csv()?;
        for path in [layout.datadict_path(), layout.datadict_latest_path()] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &dictionary)?;
        }
        fs::create_dir_all(layout.pending_dir())?;
        Ok(layout)
    }
}

fn base_templates() -> Vec<(String, String)> {
    let sub = "{{sub}}";
    let mut templates = Vec::new();
    for session in SESSIONS {
        let sre = format!("{session}_e1");
        let psychopy = format!("sub-{sub}_arrow-alert-v1-1_psychopy_{sre}");
        let eeg = format!("sub-{sub}_all_eeg_{sre}");
        let mut group: Vec<(&str, String, String)> = vec![
            (
                "psychopy",
                format!("{psychopy}.log"),
                format!(
                    "12.5074 \tEXP \tsaved data to '/home/ra/data/{psychopy}.psydat'\n\
                     12.5075 \tEXP \tsaved data to '/home/ra/data/{psychopy}.csv'\n"
                ),
            ),
            ("psychopy", format!("{psychopy}.psydat"), "psychopy data".to_string()),
            (
                "psychopy",
                format!("{psychopy}.csv"),
                format!("id,trial,response\n{sub},1,left\n{sub},2,right\n"),
            ),
            ("eeg", format!("{eeg}.eeg"), "eeg data".to_string()),
            (
                "eeg",
                format!("{eeg}.vhdr"),
                format!(
                    "Brain Vision Data Exchange Header File Version 1.0\n\
                     [Common Infos]\nDataFile={eeg}.eeg\nMarkerFile={eeg}.vmrk\n"
                ),
            ),
            (
                "eeg",
                format!("{eeg}.vmrk"),
                format!("Brain Vision Data Exchange Marker File, Version 1.0\n[Common Infos]\nDataFile={eeg}.eeg\n"),
            ),
        ];
        for (datatype, variable) in [
            ("audacity", "all_audacity"),
            ("zoom", "all_zoom"),
            ("digi", "all_digi"),
        ] {
            group.push((
                datatype,
                format!("sub-{sub}_{variable}_{sre}.zip.gpg"),
                "encrypted archive".to_string(),
            ));
        }
        for (datatype, file, contents) in group {
            templates.push((raw_path(session, datatype, sub, &file), contents.clone()));
            templates.push((checked_path(session, datatype, sub, &file), contents));
        }
    }
    templates.push((
        format!("sourcedata/checked/redcap/{CONSENT_EXPORT}"),
        format!("record_id,consent_complete,assent_complete\n{sub},2,2\n"),
    ));
    for session in SESSIONS {
        let compact = session.replace('_', "");
        templates.push((
            format!("sourcedata/checked/redcap/thrive_bbschild{compact}_DATA_{EXPORT_STAMP}.csv"),
            format!("record_id,abq_{session}_e1_complete\n{sub},2\n"),
        ));
    }
    templates
}

/// A dataset written to a temporary directory named [`DATASET_NAME`].
#[derive(Debug)]
pub struct DatasetFixture {
    _dir: TempDir,
    layout: DatasetLayout,
    subject: String,
}

impl DatasetFixture {
    /// Base dataset for a fresh subject, changed by `modify` before writing.
    pub fn create(
        ctx: &mut FixtureContext,
        modify: impl FnOnce(&mut FixtureFiles, &str),
    ) -> io::Result<Self> {
        let subject = ctx.next_subject();
        let mut files = FixtureFiles::base(&subject)?;
        modify(&mut files, &subject);
        Self::from_files(&files, subject)
    }

    pub fn from_files(files: &FixtureFiles, subject: String) -> io::Result<Self> {
        let dir = TempDir::new()?;
        let root = dir.path().join(DATASET_NAME);
        let layout = files.write_to(&root)?;
        Ok(Self {
            _dir: dir,
            layout,
            subject,
        })
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    pub fn root(&self) -> PathBuf {
        self.layout.root().to_path_buf()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
