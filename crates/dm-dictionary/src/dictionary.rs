//! Loaded data dictionary with integrity checks and lookups.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use dm_model::{DictionaryRow, SpecialColumn, SubjectRanges, Suffix, VariableKind};
use tracing::debug;

use crate::csv_utils::{CsvTable, get_field, read_csv_table};
use crate::error::{DictionaryError, Result};

const REQUIRED_COLUMNS: &[&str] = &[
    "variable",
    "dataType",
    "allowedSuffix",
    "expectedFileExt",
    "provenance",
];

/// Join column used when the `id` row does not declare one.
pub const DEFAULT_REDCAP_ID_COLUMN: &str = "record_id";

/// The project data dictionary.
///
/// Rows keep declaration order; tracker columns follow it.
#[derive(Debug, Clone)]
pub struct DataDictionary {
    rows: Vec<DictionaryRow>,
    index: HashMap<String, usize>,
    subject_ranges: Option<SubjectRanges>,
    derivation_order: Vec<String>,
}

impl DataDictionary {
    pub fn load(path: &Path) -> Result<Self> {
        let table = read_csv_table(path)?;
        let dictionary = Self::from_table(path, &table)?;
        debug!(
            path = %path.display(),
            variables = dictionary.rows.len(),
            "loaded data dictionary"
        );
        Ok(dictionary)
    }

    pub fn from_table(path: &Path, table: &CsvTable) -> Result<Self> {
        for column in REQUIRED_COLUMNS {
            if !table.headers.iter().any(|h| h == column) {
                return Err(DictionaryError::MissingColumn {
                    path: path.to_path_buf(),
                    column: (*column).to_string(),
                });
            }
        }
        let mut rows = Vec::with_capacity(table.rows.len());
        for raw in &table.rows {
            let variable = get_field(raw, "variable");
            if variable.is_empty() {
                continue;
            }
            let row = DictionaryRow::from_columns(
                &variable,
                &get_field(raw, "dataType"),
                &get_field(raw, "description"),
                &get_field(raw, "allowedSuffix"),
                &get_field(raw, "allowedValues"),
                &get_field(raw, "expectedFileExt"),
                &get_field(raw, "provenance"),
            )
            .map_err(|source| DictionaryError::InvalidRow {
                variable: variable.clone(),
                source,
            })?;
            rows.push(row);
        }
        Self::from_rows(rows)
    }

    pub fn from_rows(rows: Vec<DictionaryRow>) -> Result<Self> {
        let mut index = HashMap::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            if index.insert(row.variable.clone(), idx).is_some() {
                return Err(DictionaryError::DuplicateVariable {
                    variable: row.variable.clone(),
                });
            }
        }

        let id_row = rows
            .iter()
            .find(|row| row.kind == VariableKind::Special(SpecialColumn::Id))
            .ok_or(DictionaryError::MissingIdRow)?;
        let subject_ranges = id_row
            .allowed_values
            .as_deref()
            .map(SubjectRanges::parse)
            .transpose()
            .map_err(|source| DictionaryError::InvalidRow {
                variable: id_row.variable.clone(),
                source,
            })?;

        let mut dictionary = Self {
            rows,
            index,
            subject_ranges,
            derivation_order: Vec::new(),
        };
        dictionary.check_references()?;
        dictionary.derivation_order = dictionary.derive_order()?;
        Ok(dictionary)
    }

    fn check_references(&self) -> Result<()> {
        for row in &self.rows {
            for member in row.kind.members() {
                let Some(target) = self.get(member) else {
                    return Err(DictionaryError::UnknownReference {
                        variable: row.variable.clone(),
                        reference: member.clone(),
                    });
                };
                if matches!(row.kind, VariableKind::Combination { .. })
                    && !matches!(target.kind, VariableKind::Direct { .. })
                {
                    return Err(DictionaryError::InvalidCombinationMember {
                        row: row.variable.clone(),
                        member: member.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Derived variables ordered so every member is evaluated before its parent.
    fn derive_order(&self) -> Result<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            dictionary: &DataDictionary,
            variable: &str,
            marks: &mut HashMap<String, Mark>,
            stack: &mut Vec<String>,
            order: &mut Vec<String>,
        ) -> Result<()> {
            match marks.get(variable) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|v| v == variable).unwrap_or(0);
                    let mut chain = stack[start..].to_vec();
                    chain.push(variable.to_string());
                    return Err(DictionaryError::Cycle {
                        chain: chain.join(" -> "),
                    });
                }
                None => {}
            }
            let Some(row) = dictionary.get(variable) else {
                return Ok(());
            };
            marks.insert(variable.to_string(), Mark::Visiting);
            stack.push(variable.to_string());
            for member in row.kind.members() {
                visit(dictionary, member, marks, stack, order)?;
            }
            stack.pop();
            marks.insert(variable.to_string(), Mark::Done);
            if !row.kind.members().is_empty() {
                order.push(variable.to_string());
            }
            Ok(())
        }

        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        let mut order = Vec::new();
        for row in &self.rows {
            visit(self, &row.variable, &mut marks, &mut stack, &mut order)?;
        }
        Ok(order)
    }

    pub fn get(&self, variable: &str) -> Option<&DictionaryRow> {
        self.index.get(variable).map(|idx| &self.rows[*idx])
    }

    pub fn rows(&self) -> &[DictionaryRow] {
        &self.rows
    }

    pub fn datatype_of(&self, variable: &str) -> Option<&str> {
        self.get(variable).map(|row| row.data_type.as_str())
    }

    pub fn subject_ranges(&self) -> Option<&SubjectRanges> {
        self.subject_ranges.as_ref()
    }

    /// Combination row that lists `variable` as a member, if any.
    pub fn combination_of(&self, variable: &str) -> Option<&DictionaryRow> {
        self.combinations()
            .find(|row| row.kind.members().iter().any(|m| m == variable))
    }

    pub fn is_combination_member(&self, variable: &str) -> bool {
        self.combination_of(variable).is_some()
    }

    pub fn combinations(&self) -> impl Iterator<Item = &DictionaryRow> {
        self.rows
            .iter()
            .filter(|row| matches!(row.kind, VariableKind::Combination { .. }))
    }

    /// Every datatype that has file-backed variables.
    pub fn direct_datatypes(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .filter_map(|row| match &row.kind {
                VariableKind::Direct { datatype, .. } => Some(datatype.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Allowed suffixes of `variable`, empty when unknown or unsuffixed.
    pub fn allowed_suffixes(&self, variable: &str) -> &[Suffix] {
        self.get(variable)
            .map(|row| row.allowed_suffixes.as_slice())
            .unwrap_or(&[])
    }

    /// Combination and status variables, members first.
    pub fn derivation_order(&self) -> &[String] {
        &self.derivation_order
    }

    /// Rows that become tracker columns after `id, consent, assent`.
    pub fn tracker_rows(&self) -> impl Iterator<Item = &DictionaryRow> {
        self.rows
            .iter()
            .filter(|row| !matches!(row.kind, VariableKind::Special(_)))
    }

    /// Full tracker header in output order.
    pub fn tracker_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = [SpecialColumn::Id, SpecialColumn::Consent, SpecialColumn::Assent]
            .iter()
            .map(|c| c.column().to_string())
            .collect();
        for row in self.tracker_rows() {
            columns.extend(row.tracker_columns());
        }
        columns
    }

    /// Row declared for a special column, if present.
    pub fn special(&self, column: SpecialColumn) -> Option<&DictionaryRow> {
        self.rows
            .iter()
            .find(|row| row.kind == VariableKind::Special(column))
    }

    /// REDCap column holding subject ids.
    pub fn redcap_id_column(&self) -> String {
        self.special(SpecialColumn::Id)
            .and_then(|row| match &row.provenance {
                dm_model::Provenance::Redcap(source) => source.column.clone(),
                _ => None,
            })
            .unwrap_or_else(|| DEFAULT_REDCAP_ID_COLUMN.to_string())
    }
}
