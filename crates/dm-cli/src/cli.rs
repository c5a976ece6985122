//! CLI argument definitions for the data monitor.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "data-monitor",
    version,
    about = "Validate, QA and track a research study dataset",
    long_about = "Validate the raw and checked trees of a study dataset against its data \
                  dictionary, move passed data through QA into the checked tree and \
                  derive the central tracker from checked data and REDCap exports."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate, run the QA cycle and update the tracker.
    Run(RunArgs),

    /// Validate the raw and checked trees and write pending snapshots.
    Validate(ValidateArgs),

    /// Promote approved QA rows and stage newly passed identifiers.
    Qa(DatasetArgs),

    /// Re-derive the central tracker.
    Tracker(TrackerArgs),

    /// Load the data dictionary and compare it with its known-good copy.
    CheckDictionary(DictionaryArgs),
}

#[derive(Args)]
pub struct DatasetArgs {
    /// Dataset root (contains `sourcedata/` and `data-monitoring/`).
    #[arg(value_name = "DATASET")]
    pub dataset: PathBuf,

    /// Accept bare `deviation.txt` and `no-data.txt` as exceptions for a
    /// whole group directory.
    #[arg(long = "legacy-exceptions")]
    pub legacy_exceptions: bool,
}

#[derive(Args)]
pub struct ScopeArgs {
    /// Only read the raw tree; the tracker is derived from raw data.
    #[arg(long = "raw-only", conflicts_with = "checked_only")]
    pub raw_only: bool,

    /// Only read the checked tree; the QA cycle is skipped.
    #[arg(long = "checked-only")]
    pub checked_only: bool,
}

#[derive(Args)]
pub struct RedcapArgs {
    /// Derive assent from REDCap (otherwise the assent column is NA).
    #[arg(long = "child-data")]
    pub child_data: bool,

    /// Replace every REDCap export header, in order.
    #[arg(
        short = 'r',
        long = "replace",
        value_name = "COL",
        num_args = 1..,
        conflicts_with = "map"
    )]
    pub replace: Vec<String>,

    /// Rename REDCap export headers.
    #[arg(
        short = 'm',
        long = "map",
        value_name = "OLD:NEW",
        num_args = 1..,
        value_parser = parse_mapping
    )]
    pub map: Vec<(String, String)>,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub scope: ScopeArgs,

    #[command(flatten)]
    pub redcap: RedcapArgs,

    /// Skip the QA cycle.
    #[arg(long = "no-qa")]
    pub no_qa: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[command(flatten)]
    pub scope: ScopeArgs,
}

#[derive(Args)]
pub struct TrackerArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Derive the tracker from the raw tree instead of the checked tree.
    #[arg(long = "raw-only")]
    pub raw_only: bool,

    #[command(flatten)]
    pub redcap: RedcapArgs,
}

#[derive(Args)]
pub struct DictionaryArgs {
    /// Dataset root (contains `data-monitoring/data-dictionary/`).
    #[arg(value_name = "DATASET")]
    pub dataset: PathBuf,
}

fn parse_mapping(raw: &str) -> Result<(String, String), String> {
    let (old, new) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected OLD:NEW, got {raw:?}"))?;
    let (old, new) = (old.trim(), new.trim());
    if old.is_empty() || new.is_empty() {
        return Err(format!("expected OLD:NEW, got {raw:?}"));
    }
    Ok((old.to_string(), new.to_string()))
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
