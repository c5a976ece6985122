//! Identifier grammar for study data files.
//!
//! Every data file is named `sub-<id>_<variable>_s<S>_r<R>_e<E>[_<info>].<ext>`.
//! The variable token may itself contain underscores; the last
//! `_sN_rN_eN` group is always the suffix.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

static IDENTIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^sub-(?P<subject>\d+)_(?P<var>[\w\-]+)_(?P<sre>s\d+_r\d+_e\d+)$")
        .expect("Invalid identifier regex")
});

static FILE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^sub-(?P<subject>\d+)_(?P<var>[\w\-]+)_(?P<sre>s\d+_r\d+_e\d+)(?P<info>_[\w\-]+)?(?P<ext>(?:\.[a-zA-Z0-9]+)+)$",
    )
    .expect("Invalid file name regex")
});

static SUFFIX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^s(?P<s>\d+)_r(?P<r>\d+)_e(?P<e>\d+)$").expect("Invalid suffix regex")
});

static SESSION_RUN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^s(?P<s>\d+)_r(?P<r>\d+)$").expect("Invalid session regex"));

/// Numeric subject id as written in file names (without the `sub-` prefix).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();
        let digits = trimmed.strip_prefix("sub-").unwrap_or(trimmed);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ModelError::InvalidSubject(value));
        }
        Ok(Self(digits.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, used for range checks and numeric ordering.
    pub fn number(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    /// Directory name for this subject (`sub-<id>`).
    pub fn dir_name(&self) -> String {
        format!("sub-{}", self.0)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session and run pair (`s1_r1`), the unit of directory grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionRun {
    pub session: u32,
    pub run: u32,
}

impl fmt::Display for SessionRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}_r{}", self.session, self.run)
    }
}

impl FromStr for SessionRun {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = SESSION_RUN_REGEX
            .captures(s.trim())
            .ok_or_else(|| ModelError::InvalidSessionRun(s.to_string()))?;
        Ok(Self {
            session: parse_number(&caps["s"], s, ModelError::InvalidSessionRun)?,
            run: parse_number(&caps["r"], s, ModelError::InvalidSessionRun)?,
        })
    }
}

/// Session, run and encounter (`s1_r1_e1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Suffix {
    pub session: u32,
    pub run: u32,
    pub encounter: u32,
}

impl Suffix {
    pub fn new(session: u32, run: u32, encounter: u32) -> Self {
        Self {
            session,
            run,
            encounter,
        }
    }

    pub fn session_run(&self) -> SessionRun {
        SessionRun {
            session: self.session,
            run: self.run,
        }
    }
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}_r{}_e{}", self.session, self.run, self.encounter)
    }
}

impl FromStr for Suffix {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = SUFFIX_REGEX
            .captures(s.trim())
            .ok_or_else(|| ModelError::InvalidSuffix(s.to_string()))?;
        Ok(Self {
            session: parse_number(&caps["s"], s, ModelError::InvalidSuffix)?,
            run: parse_number(&caps["r"], s, ModelError::InvalidSuffix)?,
            encounter: parse_number(&caps["e"], s, ModelError::InvalidSuffix)?,
        })
    }
}

impl Serialize for Suffix {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Suffix {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn parse_number(digits: &str, whole: &str, err: fn(String) -> ModelError) -> Result<u32> {
    digits.parse().map_err(|_| err(whole.to_string()))
}

/// Structured key for one variable of one subject at one suffix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier {
    pub subject: SubjectId,
    pub variable: String,
    pub suffix: Suffix,
}

impl Identifier {
    pub fn new(subject: SubjectId, variable: impl Into<String>, suffix: Suffix) -> Self {
        Self {
            subject,
            variable: variable.into(),
            suffix,
        }
    }

    pub fn session_run(&self) -> SessionRun {
        self.suffix.session_run()
    }

    /// Human readable form stored in the `identifierDetails` column.
    pub fn detailed(&self, datatype: &str, combination_member: bool) -> String {
        let mut details = format!(
            "sub-{}/{}/{} ({})",
            self.subject, self.variable, self.suffix, datatype
        );
        if combination_member {
            details.push_str(" (combination)");
        }
        details
    }

    pub fn deviation_file_name(&self) -> String {
        format!("{self}-deviation.txt")
    }

    pub fn no_data_file_name(&self) -> String {
        format!("{self}-no-data.txt")
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!("{self}{extension}")
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}_{}_{}", self.subject, self.variable, self.suffix)
    }
}

impl FromStr for Identifier {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = IDENTIFIER_REGEX
            .captures(s.trim())
            .ok_or_else(|| ModelError::InvalidIdentifier(s.to_string()))?;
        Ok(Self {
            subject: SubjectId::new(&caps["subject"])?,
            variable: caps["var"].to_string(),
            suffix: caps["sre"].parse()?,
        })
    }
}

impl Serialize for Identifier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A data file name split into identifier, optional info string and extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFileName {
    pub identifier: Identifier,
    /// Free-form info token including its leading underscore.
    pub info: Option<String>,
    /// Full extension including the leading dot (`.zip.gpg`).
    pub extension: String,
}

impl ParsedFileName {
    pub fn parse(file_name: &str) -> Result<Self> {
        let caps = FILE_REGEX
            .captures(file_name)
            .ok_or_else(|| ModelError::InvalidFileName(file_name.to_string()))?;
        let identifier = Identifier {
            subject: SubjectId::new(&caps["subject"])?,
            variable: caps["var"].to_string(),
            suffix: caps["sre"].parse()?,
        };
        Ok(Self {
            identifier,
            info: caps.name("info").map(|m| m.as_str().to_string()),
            extension: caps["ext"].to_string(),
        })
    }

    /// True when the name is exactly `<identifier><extension>`.
    pub fn is_canonical(&self) -> bool {
        self.info.is_none()
    }
}

/// Parse identifier strings, failing on the first malformed entry.
pub fn parse_identifiers<S: AsRef<str>>(values: &[S]) -> Result<Vec<Identifier>> {
    values.iter().map(|v| v.as_ref().parse()).collect()
}

/// Unique `(subject, suffix)` pairs, sorted.
pub fn unique_subject_sessions(identifiers: &[Identifier]) -> Vec<(SubjectId, Suffix)> {
    identifiers
        .iter()
        .map(|id| (id.subject.clone(), id.suffix))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
