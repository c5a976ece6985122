//! Entry points that run one or all monitoring stages over a dataset.
//!
//! Every entry point checks the data dictionary against its known-good copy
//! before touching the dataset; a changed dictionary aborts the run.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use dm_dictionary::{DataDictionary, check_drift};
use dm_lifecycle::QaCycleReport;
use dm_model::RunContext;
use dm_store::{DatasetLayout, write_pending_errors, write_pending_files};
use dm_tracker::{ColumnRemap, TrackerOptions, TrackerTable, update_tracker};
use dm_validate::{Stage, ValidationEngine, ValidationReport};
use tracing::{info, info_span};

/// Which trees a run reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scope {
    #[default]
    Both,
    RawOnly,
    CheckedOnly,
}

impl Scope {
    pub fn includes_raw(self) -> bool {
        self != Self::CheckedOnly
    }

    pub fn includes_checked(self) -> bool {
        self != Self::RawOnly
    }

    /// Tree the tracker is derived from.
    pub fn tracker_stage(self) -> Stage {
        match self {
            Self::RawOnly => Stage::Raw,
            Self::Both | Self::CheckedOnly => Stage::Checked,
        }
    }
}

/// Options shared by every entry point.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Accept bare `deviation.txt` / `no-data.txt` as group exceptions.
    pub legacy_exceptions: bool,
    pub scope: Scope,
    pub no_qa: bool,
    pub child_data: bool,
    pub redcap_columns: ColumnRemap,
}

impl RunOptions {
    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions {
            child_data: self.child_data,
            remap: self.redcap_columns.clone(),
        }
    }
}

/// Reports of one validation run.
#[derive(Debug, Default)]
pub struct ValidationSummary {
    pub raw: Option<ValidationReport>,
    pub checked: Option<ValidationReport>,
    /// Pending snapshots written by this run.
    pub snapshots: Vec<PathBuf>,
}

impl ValidationSummary {
    pub fn reports(&self) -> impl Iterator<Item = &ValidationReport> {
        self.raw.iter().chain(self.checked.as_ref())
    }

    pub fn error_count(&self) -> usize {
        self.reports().map(ValidationReport::error_count).sum()
    }
}

/// Everything `run` did.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub validation: ValidationSummary,
    pub qa: Option<QaCycleReport>,
    pub tracker: Option<TrackerTable>,
}

impl RunSummary {
    /// Validation errors were recorded or a QA step failed.
    pub fn has_errors(&self) -> bool {
        self.validation.error_count() > 0 || self.qa.as_ref().is_some_and(|qa| !qa.is_clean())
    }
}

/// Fail on dictionary drift, then load the dictionary.
pub fn load_dictionary(layout: &DatasetLayout) -> Result<DataDictionary> {
    let current = layout.datadict_path();
    check_drift(&current, &layout.datadict_latest_path())?;
    DataDictionary::load(&current)
        .with_context(|| format!("load data dictionary {}", current.display()))
}

/// Validate the raw tree and, unless raw-only, the checked tree. Writes a
/// `pending-files` snapshot for the raw tree and one `pending-errors`
/// snapshot holding the errors of both.
pub fn run_raw_validation(
    root: &Path,
    options: &RunOptions,
    ctx: &RunContext,
) -> Result<ValidationSummary> {
    let layout = DatasetLayout::new(root);
    let dictionary = load_dictionary(&layout)?;
    validate_with(&layout, &dictionary, options, ctx)
}

fn validate_with(
    layout: &DatasetLayout,
    dictionary: &DataDictionary,
    options: &RunOptions,
    ctx: &RunContext,
) -> Result<ValidationSummary> {
    let span = info_span!("raw_validation", dataset = %layout.dataset_name());
    let _guard = span.enter();
    let start = Instant::now();

    let engine = ValidationEngine::new(dictionary, options.legacy_exceptions);
    let mut summary = ValidationSummary::default();
    let mut errors = Vec::new();
    if options.scope.includes_raw() {
        let report = engine
            .validate(layout, Stage::Raw)
            .context("validate raw tree")?;
        summary
            .snapshots
            .extend(write_pending_files(layout, ctx, &report.pending_entries(ctx))?);
        errors.extend(report.pending_errors(ctx));
        summary.raw = Some(report);
    }
    if options.scope.includes_checked() {
        let report = engine
            .validate(layout, Stage::Checked)
            .context("validate checked tree")?;
        errors.extend(report.pending_errors(ctx));
        summary.checked = Some(report);
    }
    // Both trees share one errors snapshot per run timestamp.
    summary
        .snapshots
        .extend(write_pending_errors(layout, ctx, &errors)?);
    info!(
        errors = summary.error_count(),
        snapshots = summary.snapshots.len(),
        duration_ms = start.elapsed().as_millis(),
        "validation complete"
    );
    Ok(summary)
}

/// Promote approved checklist rows, then stage newly passed identifiers.
pub fn run_qa_cycle(root: &Path, options: &RunOptions, ctx: &RunContext) -> Result<QaCycleReport> {
    let layout = DatasetLayout::new(root);
    let dictionary = load_dictionary(&layout)?;
    qa_with(&layout, &dictionary, options, ctx)
}

fn qa_with(
    layout: &DatasetLayout,
    dictionary: &DataDictionary,
    options: &RunOptions,
    ctx: &RunContext,
) -> Result<QaCycleReport> {
    dm_lifecycle::run_qa_cycle(layout, dictionary, ctx, options.legacy_exceptions)
        .context("run QA cycle")
}

/// Re-derive the central tracker from the tracked tree and REDCap exports.
pub fn run_tracker_update(root: &Path, options: &RunOptions) -> Result<TrackerTable> {
    let layout = DatasetLayout::new(root);
    let dictionary = load_dictionary(&layout)?;
    tracker_with(&layout, &dictionary, options)
}

fn tracker_with(
    layout: &DatasetLayout,
    dictionary: &DataDictionary,
    options: &RunOptions,
) -> Result<TrackerTable> {
    let report = ValidationEngine::new(dictionary, options.legacy_exceptions)
        .validate(layout, options.scope.tracker_stage())
        .context("validate tracked tree")?;
    let table = update_tracker(layout, dictionary, &report, &options.tracker_options())?;
    Ok(table)
}

/// Validation, then the QA cycle (unless `no_qa` or checked-only), then the
/// tracker. The dictionary is checked for drift before each stage.
pub fn run_all(root: &Path, options: &RunOptions, ctx: &RunContext) -> Result<RunSummary> {
    let layout = DatasetLayout::new(root);
    let span = info_span!("run", dataset = %layout.dataset_name(), timestamp = ctx.timestamp());
    let _guard = span.enter();

    let dictionary = load_dictionary(&layout)?;
    let validation = validate_with(&layout, &dictionary, options, ctx)?;

    let qa = if options.no_qa || !options.scope.includes_raw() {
        info!("skipping QA cycle");
        None
    } else {
        let dictionary = load_dictionary(&layout)?;
        Some(qa_with(&layout, &dictionary, options, ctx)?)
    };

    let dictionary = load_dictionary(&layout)?;
    let tracker = tracker_with(&layout, &dictionary, options)?;

    Ok(RunSummary {
        validation,
        qa,
        tracker: Some(tracker),
    })
}
