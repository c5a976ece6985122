//! Group directory discovery for the raw and checked trees.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use dm_model::{SessionRun, SubjectId};
use dm_store::{DatasetLayout, list_dirs_sorted};
use regex::Regex;
use tracing::debug;

use crate::error::Result;

static DATATYPE_DIR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\D+$").expect("Invalid datatype directory regex"));

/// Which tree a validation pass reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// `sourcedata/raw/<s_r>/<datatype>/sub-<id>/`
    Raw,
    /// `sourcedata/checked/sub-<id>/<s_r>/<datatype>/`
    Checked,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Checked => "checked",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One leaf directory: the files of one subject, session-run and datatype.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Group {
    pub subject: SubjectId,
    pub session_run: SessionRun,
    pub datatype: String,
    pub dir: PathBuf,
    /// `dir` relative to the dataset root, `/` separated.
    pub relative: String,
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn parse_subject_dir(name: &str) -> Option<SubjectId> {
    name.strip_prefix("sub-")
        .and_then(|digits| SubjectId::new(digits).ok())
}

fn parse_datatype_dir(name: &str) -> Option<String> {
    DATATYPE_DIR_REGEX
        .is_match(name)
        .then(|| name.to_string())
}

/// Path of `dir` relative to `root` with forward slashes.
pub fn relative_path(root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    Ok(list_dirs_sorted(dir)?)
}

/// Every group directory of `stage`, sorted by subject, session-run and
/// datatype. Directories that do not fit the tree shape are skipped.
pub fn discover_groups(layout: &DatasetLayout, stage: Stage) -> Result<Vec<Group>> {
    let mut groups = Vec::new();
    match stage {
        Stage::Raw => {
            for session_dir in subdirs(&layout.raw_dir())? {
                let Ok(session_run) = dir_name(&session_dir).parse::<SessionRun>() else {
                    debug!(path = %session_dir.display(), "skipping non-session directory");
                    continue;
                };
                for datatype_dir in subdirs(&session_dir)? {
                    let Some(datatype) = parse_datatype_dir(&dir_name(&datatype_dir)) else {
                        continue;
                    };
                    for subject_dir in subdirs(&datatype_dir)? {
                        let Some(subject) = parse_subject_dir(&dir_name(&subject_dir)) else {
                            continue;
                        };
                        groups.push(Group {
                            subject,
                            session_run,
                            datatype: datatype.clone(),
                            relative: relative_path(layout.root(), &subject_dir),
                            dir: subject_dir,
                        });
                    }
                }
            }
        }
        Stage::Checked => {
            for subject_dir in subdirs(&layout.checked_dir())? {
                let Some(subject) = parse_subject_dir(&dir_name(&subject_dir)) else {
                    debug!(path = %subject_dir.display(), "skipping non-subject directory");
                    continue;
                };
                for session_dir in subdirs(&subject_dir)? {
                    let Ok(session_run) = dir_name(&session_dir).parse::<SessionRun>() else {
                        continue;
                    };
                    for datatype_dir in subdirs(&session_dir)? {
                        let Some(datatype) = parse_datatype_dir(&dir_name(&datatype_dir)) else {
                            continue;
                        };
                        groups.push(Group {
                            subject: subject.clone(),
                            session_run,
                            datatype,
                            relative: relative_path(layout.root(), &datatype_dir),
                            dir: datatype_dir,
                        });
                    }
                }
            }
        }
    }
    groups.sort();
    Ok(groups)
}
