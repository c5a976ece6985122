//! Data dictionary row types.
//!
//! A dictionary row declares one variable. Its `provenance` and `dataType`
//! columns decide how the variable is checked and how its tracker column is
//! derived; that decision is captured once as a [`VariableKind`].

use std::fmt;

use crate::error::{ModelError, Result};
use crate::identifier::Suffix;

/// Parsed `provenance` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// `direct-<source>`: files are collected straight from an instrument.
    Direct { source: String },
    /// `variables: "a","b"`: derived from other dictionary variables.
    Variables(Vec<String>),
    /// `file: "<stem>"; variable: "<column>"`: read from a REDCap export.
    Redcap(RedcapSource),
    Other(String),
}

/// Where a REDCap-sourced variable lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedcapSource {
    /// Export name fragment, e.g. `thriveconsent` or `bbschild`.
    pub file: String,
    /// Declared column, `None` when the column name is derived from the variable.
    pub column: Option<String>,
}

impl Provenance {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(source) = raw.strip_prefix("direct-") {
            return Self::Direct {
                source: source.trim().to_string(),
            };
        }
        if let Some(rest) = raw.strip_prefix("variables:") {
            let variables = rest
                .split(',')
                .map(|v| v.trim().trim_matches('"').trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            return Self::Variables(variables);
        }
        if raw.starts_with("file:") {
            let mut file = None;
            let mut column = None;
            for part in raw.split(';') {
                let Some((key, value)) = part.split_once(':') else {
                    continue;
                };
                let value = value.trim().trim_matches('"').trim();
                match key.trim() {
                    "file" => file = Some(value.to_string()),
                    "variable" if !value.is_empty() => column = Some(value.to_string()),
                    _ => {}
                }
            }
            if let Some(file) = file.filter(|f| !f.is_empty()) {
                return Self::Redcap(RedcapSource { file, column });
            }
        }
        Self::Other(raw.to_string())
    }
}

/// Special tracker columns that always lead the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialColumn {
    Id,
    Consent,
    Assent,
}

impl SpecialColumn {
    pub fn from_data_type(data_type: &str) -> Option<Self> {
        match data_type {
            "id" => Some(Self::Id),
            "consent" => Some(Self::Consent),
            "assent" => Some(Self::Assent),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Consent => "consent",
            Self::Assent => "assent",
        }
    }
}

/// Closed set of variable kinds; every check and derivation dispatches on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableKind {
    Special(SpecialColumn),
    /// Files of `datatype` with the listed extensions.
    Direct {
        datatype: String,
        extensions: Vec<String>,
    },
    /// Logical OR of sibling direct variables.
    Combination { members: Vec<String> },
    /// Logical AND of constituent variables.
    Status { members: Vec<String> },
    Redcap(RedcapSource),
    Other,
}

impl VariableKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Special(_) => "special",
            Self::Direct { .. } => "direct",
            Self::Combination { .. } => "combination",
            Self::Status { .. } => "status",
            Self::Redcap(_) => "redcap",
            Self::Other => "other",
        }
    }

    /// Variables this one is derived from.
    pub fn members(&self) -> &[String] {
        match self {
            Self::Combination { members } | Self::Status { members } => members,
            _ => &[],
        }
    }
}

/// Allowed values of a column: numeric intervals or a literal list.
#[derive(Debug, Clone, PartialEq)]
pub enum AllowedValues {
    Intervals(Vec<(f64, f64)>),
    List(Vec<String>),
}

impl AllowedValues {
    /// Parse `[a,b][c,d]`, `[a,b],[c,d]` or `x, y, z`.
    pub fn parse(raw: &str) -> Result<Self> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if !compact.contains('[') {
            return Ok(Self::List(
                compact
                    .split(',')
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect(),
            ));
        }
        let mut intervals = Vec::new();
        for chunk in compact.split(['[', ']']) {
            if chunk.is_empty() || chunk == "," {
                continue;
            }
            let invalid = |message: &str| ModelError::InvalidAllowedValues {
                value: raw.to_string(),
                message: message.to_string(),
            };
            let (lower, upper) = chunk
                .split_once(',')
                .ok_or_else(|| invalid("interval needs two bounds"))?;
            let lower: f64 = lower.parse().map_err(|_| invalid("lower bound is not numeric"))?;
            let upper: f64 = upper.parse().map_err(|_| invalid("upper bound is not numeric"))?;
            intervals.push((lower, upper));
        }
        Ok(Self::Intervals(intervals))
    }

    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::List(values) => values.iter().any(|v| v == value.trim()),
            Self::Intervals(intervals) => {
                let Ok(number) = value.trim().parse::<f64>() else {
                    return false;
                };
                intervals
                    .iter()
                    .any(|(lower, upper)| *lower <= number && number <= *upper)
            }
        }
    }
}

/// Raw text of the allowed values is kept for error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectRanges {
    raw: String,
    values: AllowedValues,
}

impl SubjectRanges {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(Self {
            raw: raw.trim().to_string(),
            values: AllowedValues::parse(raw)?,
        })
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.values.contains(subject)
    }
}

impl fmt::Display for SubjectRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One declared variable.
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryRow {
    pub variable: String,
    pub data_type: String,
    pub description: String,
    pub allowed_suffixes: Vec<Suffix>,
    pub allowed_values: Option<String>,
    pub expected_extensions: Vec<String>,
    pub provenance: Provenance,
    pub kind: VariableKind,
}

impl DictionaryRow {
    /// Build a row from raw column text; `NA` and blanks mean "not set".
    pub fn from_columns(
        variable: &str,
        data_type: &str,
        description: &str,
        allowed_suffix: &str,
        allowed_values: &str,
        expected_ext: &str,
        provenance: &str,
    ) -> Result<Self> {
        let allowed_suffixes = split_list(allowed_suffix)
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<Suffix>>>()?;
        let expected_extensions: Vec<String> = split_list(expected_ext)
            .into_iter()
            .map(|ext| {
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect();
        let provenance = Provenance::parse(provenance);
        let data_type = data_type.trim().to_string();
        let kind = classify(&data_type, &expected_extensions, &provenance);
        Ok(Self {
            variable: variable.trim().to_string(),
            data_type,
            description: description.trim().to_string(),
            allowed_suffixes,
            allowed_values: non_na(allowed_values).map(str::to_string),
            expected_extensions,
            provenance,
            kind,
        })
    }

    /// Tracker column names for this row.
    pub fn tracker_columns(&self) -> Vec<String> {
        if self.allowed_suffixes.is_empty() {
            return vec![self.variable.clone()];
        }
        self.allowed_suffixes
            .iter()
            .map(|suffix| format!("{}_{}", self.variable, suffix))
            .collect()
    }
}

fn classify(data_type: &str, extensions: &[String], provenance: &Provenance) -> VariableKind {
    if let Some(special) = SpecialColumn::from_data_type(data_type) {
        return VariableKind::Special(special);
    }
    match provenance {
        Provenance::Variables(members) if data_type == "combination" => VariableKind::Combination {
            members: members.clone(),
        },
        Provenance::Variables(members) => VariableKind::Status {
            members: members.clone(),
        },
        Provenance::Redcap(source) => VariableKind::Redcap(source.clone()),
        _ if !extensions.is_empty() => VariableKind::Direct {
            datatype: data_type.to_string(),
            extensions: extensions.to_vec(),
        },
        _ => VariableKind::Other,
    }
}

fn non_na(value: &str) -> Option<&str> {
    let value = value.trim().trim_matches('"').trim();
    if value.is_empty() || value.eq_ignore_ascii_case("NA") {
        None
    } else {
        Some(value)
    }
}

fn split_list(value: &str) -> Vec<String> {
    non_na(value)
        .map(|v| {
            v.split(',')
                .map(|item| item.trim().trim_matches('"').trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
