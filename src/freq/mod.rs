//! Frequency conversion (the `interpolate` stage).
//!
//! Every date-normalized file is loaded as a numeric series, its native
//! frequency is detected from the spacing of its dates, and it is converted to a
//! monthly series (`<name>_monthly.csv`). All monthly series are then joined into
//! `unified_monthly.csv`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::domain::{Frequency, PipelineConfig, Series, StageReport, UnifiedDataset};
use crate::error::AppError;
use crate::io::{self, TableError};

pub mod convert;
pub mod interpolate;
pub mod unify;

pub use convert::to_monthly;
pub use unify::build_unified;

/// File name of the joined monthly dataset.
pub const UNIFIED_FILE: &str = "unified_monthly.csv";

/// Suffix of per-series monthly files.
pub const MONTHLY_SUFFIX: &str = "_monthly";

#[derive(Debug, Error)]
pub enum FrequencyError {
    #[error("need at least two observations to detect frequency (got {0})")]
    TooFewObservations(usize),

    #[error("irregular spacing: median gap of {median_days:.0} days matches no supported frequency")]
    Irregular { median_days: f64 },

    #[error("no series to join")]
    NoSeries,

    #[error("date range is empty")]
    EmptyRange,

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Classify a sorted date sequence by its median gap in days.
///
/// `< 10` daily, `10..=50` monthly, `50..120` quarterly, `> 300` annual.
pub fn detect_frequency(dates: &[NaiveDate]) -> Result<Frequency, FrequencyError> {
    if dates.len() < 2 {
        return Err(FrequencyError::TooFewObservations(dates.len()));
    }
    let mut gaps: Vec<i64> = dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days().abs())
        .collect();
    gaps.sort_unstable();

    let n = gaps.len();
    let median_days = if n % 2 == 1 {
        gaps[n / 2] as f64
    } else {
        (gaps[n / 2 - 1] + gaps[n / 2]) as f64 / 2.0
    };

    if median_days < 10.0 {
        Ok(Frequency::Daily)
    } else if median_days <= 50.0 {
        Ok(Frequency::Monthly)
    } else if median_days < 120.0 {
        Ok(Frequency::Quarterly)
    } else if median_days > 300.0 {
        Ok(Frequency::Annual)
    } else {
        Err(FrequencyError::Irregular { median_days })
    }
}

/// Output of the frequency stage.
#[derive(Debug, Clone)]
pub struct FrequencyOutput {
    pub report: StageReport,
    pub unified: UnifiedDataset,
    pub unified_path: PathBuf,
}

/// Runs frequency conversion and the unified join over a batch of files.
pub struct FrequencyConverter<'a> {
    config: &'a PipelineConfig,
}

impl<'a> FrequencyConverter<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Default inputs: every `*_std.csv` in the data directory.
    pub fn default_inputs(&self) -> Vec<PathBuf> {
        io::files_with_suffix(
            &self.config.data_dir,
            &format!("{}.csv", crate::dates::processor::STD_SUFFIX),
        )
    }

    /// Convert each file and write the unified dataset.
    ///
    /// Fails (exit code 3) only when no file produced a series.
    pub fn run(&self, files: &[PathBuf]) -> Result<FrequencyOutput, AppError> {
        let mut report = StageReport::new("interpolate");
        let mut monthly = Vec::new();

        for path in files {
            let name = io::pretty_path(path);
            match self.convert_file(path) {
                Ok((series, native, output)) => {
                    report.success(format!(
                        "{name} -> {} ({}, {} monthly rows)",
                        io::pretty_path(&output),
                        native.display_name(),
                        series.observations.len()
                    ));
                    monthly.push(series);
                }
                Err(e) => {
                    error!(file = %name, error = %e, "frequency conversion failed");
                    report.failure(format!("{name}: {e}"));
                }
            }
        }

        if monthly.is_empty() {
            return Err(AppError::no_series(
                "Frequency conversion produced no series (run `unify-date` first?).",
            ));
        }

        let unified = build_unified(&monthly, self.config.range())
            .map_err(|e| AppError::no_series(format!("Failed to build unified dataset: {e}")))?;
        let unified_path = self.config.data_path(UNIFIED_FILE);
        io::write_unified(&unified_path, &unified).map_err(|e| {
            AppError::input(format!("Failed to write unified dataset: {e}"))
        })?;

        info!(
            rows = unified.n_rows(),
            columns = unified.columns.len(),
            path = %unified_path.display(),
            "wrote unified dataset"
        );
        for (column, missing) in unified.missing_counts() {
            if missing > 0 {
                debug!(column = %column, missing, "missing values in unified dataset");
            }
        }

        Ok(FrequencyOutput {
            report,
            unified,
            unified_path,
        })
    }

    /// Load, detect, convert, and write one file.
    fn convert_file(&self, path: &Path) -> Result<(Series, Frequency, PathBuf), FrequencyError> {
        let name = series_name(path);
        let read = io::read_series(path, &name)?;
        for row_err in &read.row_errors {
            warn!(file = %io::pretty_path(path), line = row_err.line, "{}", row_err.message);
        }
        if !read.skipped_columns.is_empty() {
            debug!(
                file = %io::pretty_path(path),
                columns = ?read.skipped_columns,
                "ignoring non-numeric columns"
            );
        }

        let mut series = read.series;
        series.frequency = detect_frequency(&series.dates())?;
        let native = series.frequency;
        info!(series = %name, frequency = native.display_name(), rows = series.observations.len(), "detected frequency");

        let monthly = to_monthly(&series, self.config.interpolation);
        let output = self
            .config
            .data_path(&format!("{name}{MONTHLY_SUFFIX}.csv"));
        io::write_series(&output, &monthly)?;
        Ok((monthly, native, output))
    }
}

/// `cpi_std.csv` -> `cpi`.
pub fn series_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "series".to_string());
    stem.strip_suffix(crate::dates::processor::STD_SUFFIX)
        .unwrap_or(&stem)
        .to_string()
}
