//! Command-line parsing for the macro data pipeline.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! stage logic; `app` turns these structs into a `PipelineConfig` and dispatches.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::data::Category;
use crate::domain::InterpolationMethod;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "mp",
    version,
    about = "Macro data pipeline: fetch, normalize dates, convert to monthly, export to Stata"
)]
pub struct Cli {
    /// TOML config file (defaults are used for missing keys).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (overrides `data_dir` from the config file).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// More logging (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Explicit log level or filter (e.g. `debug`, `macro_pipeline=trace`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download raw indicator series into `<name>_raw.csv`.
    Fetch(FetchArgs),
    /// Normalize date labels of raw files into `<name>_std.csv`.
    UnifyDate(FilesArgs),
    /// Convert normalized files to monthly and build `unified_monthly.csv`.
    Interpolate(InterpolateArgs),
    /// Export monthly CSV files to Stata `.dta`.
    ToDta(FilesArgs),
    /// Run selected stages in pipeline order.
    Run(RunArgs),
    /// Run every stage: fetch, unify-date, interpolate, to-dta.
    All(AllArgs),
    /// List data files with sizes.
    List,
    /// Data-quality report for the normalized and monthly files.
    Report,
}

#[derive(Debug, Args, Clone, Default)]
pub struct FetchArgs {
    /// Categories to fetch (default: all).
    #[arg(long, value_enum, value_delimiter = ',')]
    pub categories: Vec<Category>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct FilesArgs {
    /// Input files (names are resolved against the data directory).
    #[arg(long, num_args = 1..)]
    pub files: Vec<String>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct RangeArgs {
    /// Interpolation method for quarterly series.
    #[arg(long, value_enum)]
    pub method: Option<InterpolationMethod>,

    /// First month of the unified dataset (YYYY-MM-DD).
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last month of the unified dataset (YYYY-MM-DD).
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct InterpolateArgs {
    #[command(flatten)]
    pub files: FilesArgs,

    #[command(flatten)]
    pub range: RangeArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Stage {
    Fetch,
    UnifyDate,
    Interpolate,
    ToDta,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Fetch, Stage::UnifyDate, Stage::Interpolate, Stage::ToDta];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::UnifyDate => "unify-date",
            Stage::Interpolate => "interpolate",
            Stage::ToDta => "to-dta",
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Stages to run; they always execute in pipeline order.
    #[arg(long, value_enum, value_delimiter = ',', required = true)]
    pub stages: Vec<Stage>,

    #[command(flatten)]
    pub fetch: FetchArgs,

    /// Input files for the first file-based stage.
    #[arg(long, num_args = 1..)]
    pub files: Vec<String>,

    #[command(flatten)]
    pub range: RangeArgs,
}

#[derive(Debug, Args, Clone, Default)]
pub struct AllArgs {
    #[command(flatten)]
    pub fetch: FetchArgs,

    #[command(flatten)]
    pub range: RangeArgs,
}
