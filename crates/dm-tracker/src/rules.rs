//! How each kind of dictionary variable turns into a tracker cell.

use std::collections::{BTreeMap, HashMap};

use dm_model::{DictionaryRow, Identifier, SubjectId, Suffix, VariableKind};
use dm_validate::ValidationReport;

use crate::redcap::{RedcapBinding, RedcapExports};
use crate::value::TrackerValue;

/// Values already computed for the current subject, keyed by column.
pub type RowValues = HashMap<String, TrackerValue>;

/// Tracker column of `variable` at `suffix`.
pub fn column_name(variable: &str, suffix: Option<Suffix>) -> String {
    match suffix {
        Some(suffix) => format!("{variable}_{suffix}"),
        None => variable.to_string(),
    }
}

/// One tracker cell to fill.
#[derive(Debug, Clone, Copy)]
pub struct Cell<'a> {
    pub subject: &'a SubjectId,
    pub row: &'a DictionaryRow,
    pub suffix: Option<Suffix>,
}

impl Cell<'_> {
    pub fn column(&self) -> String {
        column_name(&self.row.variable, self.suffix)
    }
}

/// Derivation strategy for one [`VariableKind`].
pub trait KindRule {
    fn evaluate(&self, cell: &Cell<'_>, computed: &RowValues) -> TrackerValue;
}

/// File-backed variables, read from a validation report.
///
/// No data, or a group holding only a no-data marker, is `0`. A deviation
/// is `1`. Otherwise `1` only when every expected file is present and the
/// identifier has no validation error.
#[derive(Debug, Clone, Copy)]
pub struct DirectRule<'a> {
    report: &'a ValidationReport,
}

impl<'a> DirectRule<'a> {
    pub fn new(report: &'a ValidationReport) -> Self {
        Self { report }
    }
}

impl KindRule for DirectRule<'_> {
    fn evaluate(&self, cell: &Cell<'_>, _computed: &RowValues) -> TrackerValue {
        let Some(suffix) = cell.suffix else {
            return TrackerValue::Na;
        };
        let identifier = Identifier::new(cell.subject.clone(), cell.row.variable.clone(), suffix);
        match self.report.outcome(&identifier) {
            None => TrackerValue::Zero,
            Some(outcome) if outcome.no_data => TrackerValue::Zero,
            Some(outcome) if outcome.deviation => TrackerValue::One,
            Some(outcome) => TrackerValue::from_bool(
                outcome.complete && self.report.errors_for(&identifier).next().is_none(),
            ),
        }
    }
}

fn member_values<'c>(
    cell: &'c Cell<'_>,
    computed: &'c RowValues,
) -> impl Iterator<Item = TrackerValue> + 'c {
    cell.row.kind.members().iter().map(move |member| {
        computed
            .get(&column_name(member, cell.suffix))
            .or_else(|| computed.get(member.as_str()))
            .copied()
            .unwrap_or_default()
    })
}

/// Any member present.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombinationRule;

impl KindRule for CombinationRule {
    fn evaluate(&self, cell: &Cell<'_>, computed: &RowValues) -> TrackerValue {
        TrackerValue::any(member_values(cell, computed))
    }
}

/// Every member present.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusRule;

impl KindRule for StatusRule {
    fn evaluate(&self, cell: &Cell<'_>, computed: &RowValues) -> TrackerValue {
        TrackerValue::all(member_values(cell, computed))
    }
}

/// REDCap-sourced cells, through bindings resolved up front.
#[derive(Debug, Clone, Copy)]
pub struct RedcapRule<'a> {
    exports: &'a RedcapExports,
    bindings: &'a BTreeMap<String, RedcapBinding>,
}

impl<'a> RedcapRule<'a> {
    pub fn new(exports: &'a RedcapExports, bindings: &'a BTreeMap<String, RedcapBinding>) -> Self {
        Self { exports, bindings }
    }
}

impl KindRule for RedcapRule<'_> {
    fn evaluate(&self, cell: &Cell<'_>, _computed: &RowValues) -> TrackerValue {
        self.bindings
            .get(&cell.column())
            .map_or(TrackerValue::Na, |binding| {
                binding.value(self.exports, cell.subject)
            })
    }
}

/// The rule set used for one derivation.
#[derive(Debug, Clone, Copy)]
pub struct Rules<'a> {
    pub direct: DirectRule<'a>,
    pub combination: CombinationRule,
    pub status: StatusRule,
    pub redcap: RedcapRule<'a>,
}

impl Rules<'_> {
    /// Rule for a row; `None` for kinds that never get a value.
    pub fn for_kind(&self, kind: &VariableKind) -> Option<&dyn KindRule> {
        match kind {
            VariableKind::Direct { .. } => Some(&self.direct),
            VariableKind::Combination { .. } => Some(&self.combination),
            VariableKind::Status { .. } => Some(&self.status),
            VariableKind::Redcap(_) | VariableKind::Special(_) => Some(&self.redcap),
            VariableKind::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_row() -> DictionaryRow {
        DictionaryRow::from_columns(
            "bbs_data",
            "visit_data",
            "Brain and behaviour data present",
            "s1_r1_e1",
            "NA, 0, 1",
            "NA",
            r#"variables: "arrow-alert_psychopy","all_eeg""#,
        )
        .unwrap()
    }

    #[test]
    fn derived_rules_read_member_columns() {
        let row = status_row();
        let subject = SubjectId::new("3000001").unwrap();
        let cell = Cell {
            subject: &subject,
            row: &row,
            suffix: Some("s1_r1_e1".parse().unwrap()),
        };
        assert_eq!(cell.column(), "bbs_data_s1_r1_e1");

        let mut computed = RowValues::new();
        computed.insert("arrow-alert_psychopy_s1_r1_e1".into(), TrackerValue::One);
        computed.insert("all_eeg_s1_r1_e1".into(), TrackerValue::Zero);
        assert_eq!(StatusRule.evaluate(&cell, &computed), TrackerValue::Zero);
        assert_eq!(CombinationRule.evaluate(&cell, &computed), TrackerValue::One);

        computed.remove("all_eeg_s1_r1_e1");
        assert_eq!(StatusRule.evaluate(&cell, &computed), TrackerValue::Na);

        computed.insert("arrow-alert_psychopy_s1_r1_e1".into(), TrackerValue::Zero);
        assert_eq!(CombinationRule.evaluate(&cell, &computed), TrackerValue::Zero);
    }
}
