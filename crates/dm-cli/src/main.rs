//! Data monitor CLI.

use clap::{ColorChoice, Parser};
use dm_cli::logging::{LogConfig, LogFormat, init_logging};
use std::io::{self, IsTerminal};
use tracing::level_filters::LevelFilter;

mod cli;
mod commands;
mod summary;

use crate::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use crate::commands::{run_check_dictionary, run_qa, run_run, run_tracker, run_validate};
use crate::summary::{print_dictionary, print_qa, print_run, print_tracker, print_validation};

/// Process exit code when a run finished but recorded validation errors.
const EXIT_ERRORS_RECORDED: i32 = 2;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let outcome = match &cli.command {
        Command::Run(args) => run_run(args).map(|summary| {
            print_run(&summary);
            summary.has_errors()
        }),
        Command::Validate(args) => run_validate(args).map(|summary| {
            print_validation(&summary);
            summary.error_count() > 0
        }),
        Command::Qa(args) => run_qa(args).map(|report| {
            print_qa(&report);
            !report.is_clean()
        }),
        Command::Tracker(args) => run_tracker(args).map(|table| {
            print_tracker(&table);
            false
        }),
        Command::CheckDictionary(args) => run_check_dictionary(args).map(|dictionary| {
            print_dictionary(&dictionary);
            false
        }),
    };
    let exit_code = match outcome {
        Ok(false) => 0,
        Ok(true) => EXIT_ERRORS_RECORDED,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig::default()
        .with_level(cli.verbosity.tracing_level_filter())
        .with_format(match cli.log_format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        })
        .with_log_file(cli.log_file.clone());
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
