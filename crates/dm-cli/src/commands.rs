use anyhow::{Context, Result};
use tracing::info;

use dm_cli::pipeline::{
    RunOptions, RunSummary, Scope, ValidationSummary, run_all, run_qa_cycle, run_raw_validation,
    run_tracker_update,
};
use dm_dictionary::{DataDictionary, check_drift};
use dm_lifecycle::QaCycleReport;
use dm_model::RunContext;
use dm_store::DatasetLayout;
use dm_tracker::{ColumnRemap, TrackerTable};

use crate::cli::{
    DatasetArgs, DictionaryArgs, RedcapArgs, RunArgs, ScopeArgs, TrackerArgs, ValidateArgs,
};

fn scope(args: &ScopeArgs) -> Scope {
    if args.raw_only {
        Scope::RawOnly
    } else if args.checked_only {
        Scope::CheckedOnly
    } else {
        Scope::Both
    }
}

fn column_remap(args: &RedcapArgs) -> ColumnRemap {
    if !args.replace.is_empty() {
        ColumnRemap::Replace(args.replace.clone())
    } else if !args.map.is_empty() {
        ColumnRemap::Rename(args.map.clone())
    } else {
        ColumnRemap::Keep
    }
}

fn base_options(dataset: &DatasetArgs) -> RunOptions {
    RunOptions {
        legacy_exceptions: dataset.legacy_exceptions,
        ..RunOptions::default()
    }
}

pub fn run_run(args: &RunArgs) -> Result<RunSummary> {
    let options = RunOptions {
        scope: scope(&args.scope),
        no_qa: args.no_qa,
        child_data: args.redcap.child_data,
        redcap_columns: column_remap(&args.redcap),
        ..base_options(&args.dataset)
    };
    let ctx = RunContext::now();
    run_all(&args.dataset.dataset, &options, &ctx)
}

pub fn run_validate(args: &ValidateArgs) -> Result<ValidationSummary> {
    let options = RunOptions {
        scope: scope(&args.scope),
        ..base_options(&args.dataset)
    };
    let ctx = RunContext::now();
    run_raw_validation(&args.dataset.dataset, &options, &ctx)
}

pub fn run_qa(args: &DatasetArgs) -> Result<QaCycleReport> {
    let ctx = RunContext::now();
    run_qa_cycle(&args.dataset, &base_options(args), &ctx)
}

pub fn run_tracker(args: &TrackerArgs) -> Result<TrackerTable> {
    let options = RunOptions {
        scope: if args.raw_only {
            Scope::RawOnly
        } else {
            Scope::CheckedOnly
        },
        child_data: args.redcap.child_data,
        redcap_columns: column_remap(&args.redcap),
        ..base_options(&args.dataset)
    };
    run_tracker_update(&args.dataset.dataset, &options)
}

pub fn run_check_dictionary(args: &DictionaryArgs) -> Result<DataDictionary> {
    let layout = DatasetLayout::new(&args.dataset);
    let current = layout.datadict_path();
    let dictionary = DataDictionary::load(&current)
        .with_context(|| format!("load data dictionary {}", current.display()))?;
    check_drift(&current, &layout.datadict_latest_path())?;
    info!(variables = dictionary.rows().len(), "data dictionary is consistent");
    Ok(dictionary)
}
