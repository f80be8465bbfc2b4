//! Stage sequencing shared by every command.
//!
//! `fetch -> unify-date -> interpolate -> to-dta`
//!
//! Each stage reads its inputs from the data directory and writes its outputs
//! back there, so running a subset of stages is just skipping the others. Only
//! catastrophic conditions (missing data directory, no series for a stage that
//! needs them, fetch setup failure) return an `AppError`; everything else is
//! counted in the stage's `StageReport`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::cli::Stage;
use crate::data::{Category, DataFetcher, FetchReport, FredSource, SeriesSource};
use crate::dates::{DateProcessor, FileOutcome};
use crate::domain::{PipelineConfig, StageReport, UnifiedDataset};
use crate::dta::{DtaSummary, FormatConverter};
use crate::error::AppError;
use crate::freq::FrequencyConverter;
use crate::io;

/// Caller-selected inputs.
#[derive(Debug, Clone, Default)]
pub struct StageInputs {
    /// Empty means every category.
    pub categories: Vec<Category>,
    /// Explicit files for the first file-based stage; empty means discover.
    pub files: Vec<String>,
}

/// Everything a pipeline invocation produced.
#[derive(Debug, Clone, Default)]
pub struct PipelineRun {
    pub reports: Vec<StageReport>,
    pub fetch: Option<FetchReport>,
    pub dates: Vec<FileOutcome>,
    pub unified: Option<UnifiedDataset>,
    pub unified_path: Option<PathBuf>,
    pub exports: Vec<DtaSummary>,
    pub elapsed: Duration,
}

impl PipelineRun {
    pub fn total_failed(&self) -> usize {
        self.reports.iter().map(|r| r.failed).sum()
    }
}

/// Run `stages` (in pipeline order) against the FRED provider.
pub fn run_stages(
    config: &PipelineConfig,
    stages: &[Stage],
    inputs: &StageInputs,
) -> Result<PipelineRun, AppError> {
    execute(config, stages, inputs, || FredSource::from_env(&config.fetch))
}

/// Same as [`run_stages`] with a caller-supplied provider.
///
/// The provider is only built when `fetch` is selected.
pub fn execute<S, F>(
    config: &PipelineConfig,
    stages: &[Stage],
    inputs: &StageInputs,
    make_source: F,
) -> Result<PipelineRun, AppError>
where
    S: SeriesSource,
    F: FnOnce() -> Result<S, AppError>,
{
    let started = Instant::now();
    let mut stages = stages.to_vec();
    stages.sort();
    stages.dedup();

    let mut run = PipelineRun::default();
    let mut explicit_files = Some(inputs.files.as_slice()).filter(|f| !f.is_empty());
    let mut make_source = Some(make_source);

    for stage in stages {
        info!(stage = stage.name(), "starting stage");
        let stage_started = Instant::now();

        let report = match stage {
            Stage::Fetch => {
                std::fs::create_dir_all(&config.data_dir).map_err(|e| {
                    AppError::input(format!(
                        "Failed to create data directory '{}': {e}",
                        config.data_dir.display()
                    ))
                })?;
                let build = make_source
                    .take()
                    .ok_or_else(|| AppError::new(4, "Data source already consumed."))?;
                let source = build()?;
                let categories = if inputs.categories.is_empty() {
                    Category::ALL.to_vec()
                } else {
                    inputs.categories.clone()
                };
                let fetched = DataFetcher::new(source, config).run(&categories);
                let report = fetched.to_stage_report();
                run.fetch = Some(fetched);
                report
            }
            Stage::UnifyDate => {
                io::ensure_data_dir(&config.data_dir)?;
                let processor = DateProcessor::new(config);
                let files = select_files(config, explicit_files.take(), || processor.default_inputs())?;
                if files.is_empty() {
                    return Err(AppError::no_series(
                        "No raw files to normalize (run `fetch` first?).",
                    ));
                }
                let (report, outcomes) = processor.process_all(&files);
                run.dates = outcomes;
                report
            }
            Stage::Interpolate => {
                io::ensure_data_dir(&config.data_dir)?;
                let converter = FrequencyConverter::new(config);
                let files = select_files(config, explicit_files.take(), || converter.default_inputs())?;
                let output = converter.run(&files)?;
                run.unified = Some(output.unified);
                run.unified_path = Some(output.unified_path);
                output.report
            }
            Stage::ToDta => {
                io::ensure_data_dir(&config.data_dir)?;
                let converter = FormatConverter::new(config);
                let files = select_files(config, explicit_files.take(), || converter.default_inputs())?;
                let (report, exports) = converter.run(&files)?;
                run.exports = exports;
                report
            }
        };

        info!(
            stage = stage.name(),
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed_ms = stage_started.elapsed().as_millis() as u64,
            "stage finished"
        );
        run.reports.push(report);
    }

    run.elapsed = started.elapsed();
    Ok(run)
}

/// Resolve explicit names against the data directory, or discover defaults.
fn select_files(
    config: &PipelineConfig,
    explicit: Option<&[String]>,
    discover: impl FnOnce() -> Vec<PathBuf>,
) -> Result<Vec<PathBuf>, AppError> {
    let Some(names) = explicit else {
        return Ok(discover());
    };
    let (found, missing) = io::resolve_files(&config.data_dir, names);
    for path in &missing {
        warn!(path = %path.display(), "input file not found");
    }
    if found.is_empty() {
        return Err(AppError::input(format!(
            "None of the requested files exist in {}.",
            config.data_dir.display()
        )));
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FetchError;
    use crate::domain::DateRange;
    use chrono::NaiveDate;
    use std::fs;

    struct NoNetwork;

    impl SeriesSource for NoNetwork {
        fn fetch(
            &self,
            series_id: &str,
            _range: DateRange,
        ) -> Result<Vec<(NaiveDate, Option<f64>)>, FetchError> {
            Err(FetchError::Status {
                series_id: series_id.to_string(),
                status: 404,
            })
        }
    }

    fn no_source() -> Result<NoNetwork, AppError> {
        panic!("provider must not be built without the fetch stage")
    }

    fn config(dir: &std::path::Path) -> PipelineConfig {
        PipelineConfig {
            data_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn missing_data_dir_is_exit_code_2() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir.path().join("nope"));
        let err = execute(&cfg, &[Stage::UnifyDate], &StageInputs::default(), no_source).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn stages_run_in_pipeline_order_regardless_of_request_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("cpi_raw.csv"),
            "月份,value\n2020年01月份,1\n2020年02月份,2\n2020年03月份,3\n",
        )
        .unwrap();
        let cfg = config(dir.path());
        let run = execute(
            &cfg,
            &[Stage::Interpolate, Stage::UnifyDate, Stage::Interpolate],
            &StageInputs::default(),
            no_source,
        )
        .unwrap();
        let names: Vec<_> = run.reports.iter().map(|r| r.stage).collect();
        assert_eq!(names, vec!["unify-date", "interpolate"]);
        assert_eq!(run.unified.unwrap().n_rows(), 3);
    }

    #[test]
    fn fetch_failures_are_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dir.path().join("fresh"));
        cfg.fetch.max_retries = 0;
        cfg.fetch.request_interval_secs = 0;
        let inputs = StageInputs {
            categories: vec![Category::Wage],
            files: Vec::new(),
        };
        let run = execute(&cfg, &[Stage::Fetch], &inputs, || Ok(NoNetwork)).unwrap();
        assert_eq!(run.reports[0].failed, 1);
        assert!(dir.path().join("fresh").is_dir());
        assert_eq!(run.fetch.unwrap().categories_failed, vec![Category::Wage]);
    }

    #[test]
    fn explicit_files_that_do_not_exist_are_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let inputs = StageInputs {
            categories: Vec::new(),
            files: vec!["ghost.csv".into()],
        };
        let err = execute(&cfg, &[Stage::UnifyDate], &inputs, no_source).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
