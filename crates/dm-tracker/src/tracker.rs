//! The central tracker: one row per subject, one column per dictionary
//! variable and suffix.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use dm_dictionary::DataDictionary;
use dm_model::{DictionaryRow, Provenance, SpecialColumn, SubjectId, Suffix, VariableKind};
use dm_store::{DatasetLayout, read_records, write_records_atomic};
use dm_validate::{ValidationReport, discover_groups};
use tracing::{error, info, info_span, warn};

use crate::error::{Result, TrackerError};
use crate::redcap::{ColumnRemap, RedcapBinding, RedcapExports, completion_column};
use crate::rules::{
    Cell, CombinationRule, DirectRule, RedcapRule, RowValues, Rules, StatusRule, column_name,
};
use crate::value::TrackerValue;

/// Caller choices for one tracker update.
#[derive(Debug, Clone, Default)]
pub struct TrackerOptions {
    /// Derive `assent` from REDCap; otherwise it stays `NA`.
    pub child_data: bool,
    pub remap: ColumnRemap,
}

/// One subject's row, values aligned with the columns after `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerRow {
    pub subject: SubjectId,
    pub values: Vec<TrackerValue>,
}

/// A derived tracker, ready to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerTable {
    columns: Vec<String>,
    rows: Vec<TrackerRow>,
}

impl TrackerTable {
    /// Full header, starting with `id`.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TrackerRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, subject: &str, column: &str) -> Option<TrackerValue> {
        let idx = self.columns.iter().skip(1).position(|c| c == column)?;
        self.rows
            .iter()
            .find(|row| row.subject.as_str() == subject)
            .and_then(|row| row.values.get(idx).copied())
    }

    pub fn to_records(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                std::iter::once(row.subject.to_string())
                    .chain(row.values.iter().map(ToString::to_string))
                    .collect()
            })
            .collect()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_records_atomic(path, &self.columns, &self.to_records())?;
        Ok(())
    }
}

/// Subjects listed in an existing tracker file.
pub fn existing_subjects(path: &Path) -> Result<Vec<SubjectId>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let (headers, records) = read_records(path)?;
    let Some(id_idx) = headers.iter().position(|h| h == SpecialColumn::Id.column()) else {
        warn!(path = %path.display(), "existing tracker has no id column");
        return Ok(Vec::new());
    };
    let mut subjects = Vec::new();
    for record in records {
        let Some(raw) = record.get(id_idx).filter(|v| !v.is_empty()) else {
            continue;
        };
        match SubjectId::new(raw.as_str()) {
            Ok(subject) => subjects.push(subject),
            Err(e) => warn!(value = %raw, error = %e, "skipping tracker row"),
        }
    }
    Ok(subjects)
}

/// A REDCap lookup the dictionary asks for.
struct BindingRequest<'a> {
    column_key: String,
    source: &'a str,
    export_column: String,
    suffix: Option<Suffix>,
}

fn redcap_requests(dictionary: &DataDictionary, child_data: bool) -> Vec<BindingRequest<'_>> {
    let mut requests = Vec::new();
    let mut specials = vec![SpecialColumn::Consent];
    if child_data {
        specials.push(SpecialColumn::Assent);
    }
    for special in specials {
        let Some(row) = dictionary.special(special) else {
            warn!(column = special.column(), "no dictionary row; column stays NA");
            continue;
        };
        if let Provenance::Redcap(source) = &row.provenance {
            requests.push(BindingRequest {
                column_key: special.column().to_string(),
                source: &source.file,
                export_column: source
                    .column
                    .clone()
                    .unwrap_or_else(|| completion_column(special.column(), None)),
                suffix: None,
            });
        }
    }
    for row in dictionary.tracker_rows() {
        let VariableKind::Redcap(source) = &row.kind else {
            continue;
        };
        for suffix in suffixes_of(row) {
            let suffix_text = suffix.map(|s| s.to_string());
            let export_column = match (&source.column, &suffix_text) {
                (Some(column), Some(suffix)) => format!("{column}_{suffix}"),
                (Some(column), None) => column.clone(),
                (None, suffix) => completion_column(&row.variable, suffix.as_deref()),
            };
            requests.push(BindingRequest {
                column_key: column_name(&row.variable, suffix),
                source: &source.file,
                export_column,
                suffix,
            });
        }
    }
    requests
}

fn suffixes_of(row: &DictionaryRow) -> Vec<Option<Suffix>> {
    if row.allowed_suffixes.is_empty() {
        vec![None]
    } else {
        row.allowed_suffixes.iter().copied().map(Some).collect()
    }
}

/// Resolve every REDCap-backed column to an export and column index.
///
/// Runs before anything is written. Duplicate headers in a used export, or
/// a requested column missing from one, abort the update with every
/// offending column named. A missing export only leaves its columns `NA`.
pub fn bind_redcap(
    dictionary: &DataDictionary,
    exports: &RedcapExports,
    child_data: bool,
) -> Result<BTreeMap<String, RedcapBinding>> {
    let id_column = dictionary.redcap_id_column();
    let mut resolved = Vec::new();
    let mut missing_sources = BTreeSet::new();
    for request in redcap_requests(dictionary, child_data) {
        let session_run = request.suffix.map(|s| s.session_run());
        match exports.select(request.source, session_run) {
            Some(export) => resolved.push((request, export)),
            None => {
                if missing_sources.insert(request.source) {
                    warn!(source = request.source, "no REDCap export found; columns will be NA");
                }
            }
        }
    }

    let used: BTreeSet<usize> = resolved.iter().map(|(_, export)| *export).collect();
    let mut duplicates = Vec::new();
    for idx in &used {
        let Some(export) = exports.get(*idx) else {
            continue;
        };
        for column in export.duplicate_headers() {
            error!(file = %export.file_name(), %column, "duplicate column in REDCap export");
            duplicates.push(format!("{column} in {}", export.file_name()));
        }
    }
    if !duplicates.is_empty() {
        return Err(TrackerError::integrity(format!(
            "duplicate REDCap columns: {}",
            duplicates.join(", ")
        )));
    }

    let mut bindings = BTreeMap::new();
    let mut missing = BTreeSet::new();
    for (request, idx) in resolved {
        let Some(export) = exports.get(idx) else {
            continue;
        };
        let id_idx = export.column_index(&id_column);
        let column_idx = export.column_index(&request.export_column);
        if id_idx.is_none() {
            missing.insert((export.file_name(), id_column.clone()));
        }
        if column_idx.is_none() {
            missing.insert((export.file_name(), request.export_column.clone()));
        }
        if let (Some(id_column), Some(column)) = (id_idx, column_idx) {
            bindings.insert(
                request.column_key,
                RedcapBinding {
                    export: idx,
                    id_column,
                    column,
                },
            );
        }
    }
    if !missing.is_empty() {
        let details: Vec<String> = missing
            .iter()
            .map(|(file, column)| {
                error!(%file, %column, "column not found in REDCap export");
                format!("{column} not found in {file}")
            })
            .collect();
        return Err(TrackerError::integrity(details.join(", ")));
    }
    Ok(bindings)
}

/// Subjects to track: every subject with a group in the report's tree plus
/// every subject already in the tracker, in numeric order.
fn tracked_subjects(
    layout: &DatasetLayout,
    report: &ValidationReport,
) -> Result<Vec<SubjectId>> {
    let mut subjects: BTreeSet<SubjectId> = discover_groups(layout, report.stage())?
        .into_iter()
        .map(|group| group.subject)
        .collect();
    subjects.extend(report.identifiers().map(|id| id.subject.clone()));
    subjects.extend(existing_subjects(&layout.tracker_path())?);
    let mut subjects: Vec<SubjectId> = subjects.into_iter().collect();
    subjects.sort_by(|a, b| {
        a.number()
            .cmp(&b.number())
            .then_with(|| a.as_str().cmp(b.as_str()))
    });
    Ok(subjects)
}

fn derive_row(
    dictionary: &DataDictionary,
    rules: &Rules<'_>,
    subject: &SubjectId,
    columns: &[String],
) -> TrackerRow {
    let mut computed = RowValues::new();
    let fill = |row: &DictionaryRow, computed: &mut RowValues| {
        let Some(rule) = rules.for_kind(&row.kind) else {
            return;
        };
        for suffix in suffixes_of(row) {
            let cell = Cell {
                subject,
                row,
                suffix,
            };
            let value = rule.evaluate(&cell, computed);
            computed.insert(cell.column(), value);
        }
    };

    for special in [SpecialColumn::Consent, SpecialColumn::Assent] {
        if let Some(row) = dictionary.special(special) {
            fill(row, &mut computed);
        }
    }
    for row in dictionary.tracker_rows() {
        if matches!(row.kind, VariableKind::Direct { .. } | VariableKind::Redcap(_)) {
            fill(row, &mut computed);
        }
    }
    for variable in dictionary.derivation_order() {
        if let Some(row) = dictionary.get(variable) {
            fill(row, &mut computed);
        }
    }

    TrackerRow {
        subject: subject.clone(),
        values: columns
            .iter()
            .skip(1)
            .map(|column| computed.get(column).copied().unwrap_or_default())
            .collect(),
    }
}

/// Derive the tracker from a validation report and the REDCap exports.
pub fn derive_tracker(
    layout: &DatasetLayout,
    dictionary: &DataDictionary,
    report: &ValidationReport,
    exports: &RedcapExports,
    options: &TrackerOptions,
) -> Result<TrackerTable> {
    let bindings = bind_redcap(dictionary, exports, options.child_data)?;
    let rules = Rules {
        direct: DirectRule::new(report),
        combination: CombinationRule,
        status: StatusRule,
        redcap: RedcapRule::new(exports, &bindings),
    };
    let columns = dictionary.tracker_columns();
    let rows = tracked_subjects(layout, report)?
        .iter()
        .map(|subject| derive_row(dictionary, &rules, subject, &columns))
        .collect();
    Ok(TrackerTable { columns, rows })
}

/// Rebuild `central_tracker` from `report` and the exports under the
/// REDCap directory. Nothing is written when derivation fails.
pub fn update_tracker(
    layout: &DatasetLayout,
    dictionary: &DataDictionary,
    report: &ValidationReport,
    options: &TrackerOptions,
) -> Result<TrackerTable> {
    let span = info_span!("tracker_update", dataset = %layout.dataset_name(), stage = %report.stage());
    let _guard = span.enter();

    let exports = RedcapExports::discover(&layout.redcap_dir(), &options.remap)?;
    let table = derive_tracker(layout, dictionary, report, &exports, options)?;
    let path = layout.tracker_path();
    table.write(&path)?;
    info!(
        subjects = table.len(),
        columns = table.columns().len(),
        path = %path.display(),
        "Tracker updated"
    );
    Ok(table)
}
