//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - layers configuration (defaults, then `--config`, then flags)
//! - initializes logging
//! - dispatches to the pipeline stages or the read-only commands
//! - prints summaries to stdout

use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Command, RangeArgs, Stage};
use crate::domain::PipelineConfig;
use crate::error::AppError;
use crate::logging::{self, LogOptions};

pub mod pipeline;

use pipeline::StageInputs;

/// Entry point for the `mp` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    logging::init(&LogOptions {
        level: logging::level_from_flags(cli.log_level.as_deref(), cli.verbose, cli.quiet),
        file: config.log_file.clone(),
    })?;
    info!(data_dir = %config.data_dir.display(), "configuration loaded");

    dispatch(cli.command, &config)
}

/// Defaults, then the config file, then command-line overrides.
pub fn build_config(cli: &Cli) -> Result<PipelineConfig, AppError> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(path) = &cli.log_file {
        config.log_file = Some(path.clone());
    }
    if let Some(range) = range_args(&cli.command) {
        apply_range(&mut config, range);
    }
    config.validate()?;
    Ok(config)
}

fn range_args(command: &Command) -> Option<&RangeArgs> {
    match command {
        Command::Interpolate(args) => Some(&args.range),
        Command::Run(args) => Some(&args.range),
        Command::All(args) => Some(&args.range),
        _ => None,
    }
}

fn apply_range(config: &mut PipelineConfig, range: &RangeArgs) {
    if let Some(method) = range.method {
        config.interpolation = method;
    }
    if range.start.is_some() {
        config.start = range.start;
    }
    if range.end.is_some() {
        config.end = range.end;
    }
}

fn dispatch(command: Command, config: &PipelineConfig) -> Result<(), AppError> {
    let (stages, inputs): (Vec<Stage>, StageInputs) = match command {
        Command::List => return handle_list(config),
        Command::Report => return handle_report(config),
        Command::Fetch(args) => (
            vec![Stage::Fetch],
            StageInputs {
                categories: args.categories,
                files: Vec::new(),
            },
        ),
        Command::UnifyDate(args) => (
            vec![Stage::UnifyDate],
            StageInputs {
                categories: Vec::new(),
                files: args.files,
            },
        ),
        Command::Interpolate(args) => (
            vec![Stage::Interpolate],
            StageInputs {
                categories: Vec::new(),
                files: args.files.files,
            },
        ),
        Command::ToDta(args) => (
            vec![Stage::ToDta],
            StageInputs {
                categories: Vec::new(),
                files: args.files,
            },
        ),
        Command::Run(args) => (
            args.stages,
            StageInputs {
                categories: args.fetch.categories,
                files: args.files,
            },
        ),
        Command::All(args) => (
            Stage::ALL.to_vec(),
            StageInputs {
                categories: args.fetch.categories,
                files: Vec::new(),
            },
        ),
    };

    let run = pipeline::run_stages(config, &stages, &inputs)?;
    print!("{}", crate::report::format_run_summary(&run));
    Ok(())
}

fn handle_list(config: &PipelineConfig) -> Result<(), AppError> {
    crate::io::ensure_data_dir(&config.data_dir)?;
    let files = crate::io::list_data_files(&config.data_dir);
    print!("{}", crate::report::format_file_list(&config.data_dir, &files));
    Ok(())
}

fn handle_report(config: &PipelineConfig) -> Result<(), AppError> {
    crate::io::ensure_data_dir(&config.data_dir)?;
    let reports: Vec<_> = crate::report::key_files(config)
        .iter()
        .map(|path| {
            crate::report::analyze_file(path)
                .map_err(|e| format!("{}: {e}", crate::io::pretty_path(path)))
        })
        .collect();
    print!("{}", crate::report::format_quality_report(&reports));
    Ok(())
}
