use std::collections::BTreeMap;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use dm_dictionary::DataDictionary;
use dm_lifecycle::QaCycleReport;
use dm_model::IssueCategory;
use dm_tracker::{TrackerTable, TrackerValue};
use dm_validate::ValidationReport;

use dm_cli::pipeline::{RunSummary, ValidationSummary};

pub fn print_run(summary: &RunSummary) {
    print_validation(&summary.validation);
    if let Some(qa) = &summary.qa {
        print_qa(qa);
    }
    if let Some(tracker) = &summary.tracker {
        print_tracker(tracker);
    }
}

pub fn print_validation(summary: &ValidationSummary) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Tree"),
        header_cell("Groups"),
        header_cell("Identifiers"),
        header_cell("Errors"),
    ]);
    apply_summary_table_style(&mut table);
    for column in 1..4 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    let mut by_type: BTreeMap<&'static str, usize> = BTreeMap::new();
    for report in summary.reports() {
        table.add_row(vec![
            Cell::new(report.stage())
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(report.group_count()),
            Cell::new(report.identifiers().count()),
            count_cell(report.error_count(), Color::Red),
        ]);
        for record in report.records() {
            *by_type.entry(record.error_type()).or_default() += 1;
        }
    }
    println!("{table}");
    for path in &summary.snapshots {
        println!("Snapshot: {}", path.display());
    }
    print_error_types(&by_type, summary.reports());
}

fn print_error_types<'a>(
    by_type: &BTreeMap<&'static str, usize>,
    reports: impl Iterator<Item = &'a ValidationReport>,
) {
    if by_type.is_empty() {
        return;
    }
    let mut by_category: BTreeMap<IssueCategory, usize> = BTreeMap::new();
    for report in reports {
        for (category, count) in report.count_by_category() {
            *by_category.entry(category).or_default() += count;
        }
    }
    let mut table = Table::new();
    table.set_header(vec![header_cell("Error type"), header_cell("Count")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (error_type, count) in by_type {
        table.add_row(vec![Cell::new(error_type), count_cell(*count, Color::Red)]);
    }
    for (category, count) in by_category {
        table.add_row(vec![
            dim_cell(format!("{} (category)", category.label())),
            dim_cell(count),
        ]);
    }
    println!();
    println!("Errors:");
    println!("{table}");
}

pub fn print_qa(report: &QaCycleReport) {
    let mut table = Table::new();
    table.set_header(vec![header_cell("QA step"), header_cell("Identifiers")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    table.add_row(vec![Cell::new("Staged for QA"), Cell::new(report.staged.len())]);
    table.add_row(vec![
        Cell::new("Promoted to checked"),
        Cell::new(report.promoted.len()),
    ]);
    table.add_row(vec![
        Cell::new("Failed"),
        count_cell(report.failures.len(), Color::Red),
    ]);
    table.add_row(vec![
        dim_cell("Empty directories pruned"),
        dim_cell(report.pruned_dirs),
    ]);
    println!();
    println!("{table}");
    if !report.failures.is_empty() {
        eprintln!("QA failures:");
        for failure in &report.failures {
            eprintln!("- {}: {}", failure.identifier, failure.reason);
        }
    }
}

pub fn print_tracker(tracker: &TrackerTable) {
    let mut counts = [0usize; 3];
    for row in tracker.rows() {
        for value in &row.values {
            let idx = match value {
                TrackerValue::One => 0,
                TrackerValue::Zero => 1,
                TrackerValue::Na => 2,
            };
            counts[idx] += 1;
        }
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Subjects"),
        header_cell("Columns"),
        header_cell("1"),
        header_cell("0"),
        header_cell("NA"),
    ]);
    apply_table_style(&mut table);
    for column in 0..5 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    table.add_row(vec![
        Cell::new(tracker.len()),
        Cell::new(tracker.columns().len()),
        Cell::new(counts[0]).fg(Color::Green),
        count_cell(counts[1], Color::Yellow),
        dim_cell(counts[2]),
    ]);
    println!();
    println!("Tracker:");
    println!("{table}");
}

pub fn print_dictionary(dictionary: &DataDictionary) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Variable"),
        header_cell("Kind"),
        header_cell("Data type"),
        header_cell("Suffixes"),
        header_cell("Derived from"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    for row in dictionary.rows() {
        let members = row.kind.members();
        table.add_row(vec![
            Cell::new(&row.variable)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(row.kind.label()),
            Cell::new(&row.data_type),
            Cell::new(row.allowed_suffixes.len()),
            if members.is_empty() {
                dim_cell("-")
            } else {
                Cell::new(members.join(", "))
            },
        ]);
    }
    println!("{table}");
    println!(
        "{} variables, {} tracker columns",
        dictionary.rows().len(),
        dictionary.tracker_columns().len()
    );
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
