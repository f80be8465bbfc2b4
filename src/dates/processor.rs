//! File-level date normalization (the `unify-date` stage).
//!
//! For each raw file we locate the period column, convert every label with
//! [`parse_period_label`], and write a `<name>_std.csv` whose first column is the
//! canonical `date`. A bad label costs one row, never the file; a bad file costs
//! one file, never the stage.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{error, info, warn};

use super::{format_date, parse_period_label};
use crate::domain::{PipelineConfig, StageReport};
use crate::io::{self, DATE_COLUMN, Table, TableError};

/// Header names recognized as the period column, in priority order.
const DATE_COLUMN_CANDIDATES: [&str; 8] =
    ["date", "月份", "季度", "报告日", "日期", "code", "period", "time"];

/// Suffixes marking a freshly fetched file.
const RAW_SUFFIXES: [&str; 2] = ["_raw", "_原始数据"];

/// Suffix of date-normalized files.
pub const STD_SUFFIX: &str = "_std";

/// Per-file result of the date stage.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub date_column: String,
    pub rows_read: usize,
    pub rows_converted: usize,
    pub rows_failed: usize,
    pub duplicates: usize,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

/// Runs date normalization over a batch of files.
pub struct DateProcessor<'a> {
    config: &'a PipelineConfig,
}

impl<'a> DateProcessor<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Default inputs: every `*_raw.csv` in the data directory.
    pub fn default_inputs(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for suffix in RAW_SUFFIXES {
            files.extend(io::files_with_suffix(&self.config.data_dir, &format!("{suffix}.csv")));
        }
        files.sort();
        files
    }

    /// Normalize each file; failures are logged and counted.
    pub fn process_all(&self, files: &[PathBuf]) -> (StageReport, Vec<FileOutcome>) {
        let mut report = StageReport::new("unify-date");
        let mut outcomes = Vec::new();

        for path in files {
            let name = io::pretty_path(path);
            match normalize_file(path, &self.config.data_dir) {
                Ok(outcome) if outcome.rows_converted > 0 => {
                    info!(
                        file = %name,
                        output = %io::pretty_path(&outcome.output),
                        rows = outcome.rows_converted,
                        failed_rows = outcome.rows_failed,
                        "normalized dates"
                    );
                    report.success(format!(
                        "{name} -> {} ({} rows, {} ~ {}, {} bad labels)",
                        io::pretty_path(&outcome.output),
                        outcome.rows_converted,
                        outcome.first.map(format_date).unwrap_or_default(),
                        outcome.last.map(format_date).unwrap_or_default(),
                        outcome.rows_failed,
                    ));
                    outcomes.push(outcome);
                }
                Ok(outcome) => {
                    warn!(file = %name, rows = outcome.rows_read, "no row had a recognizable date");
                    report.failure(format!("{name}: no recognizable dates in `{}`", outcome.date_column));
                }
                Err(e) => {
                    error!(file = %name, error = %e, "date normalization failed");
                    report.failure(format!("{name}: {e}"));
                }
            }
        }

        (report, outcomes)
    }
}

/// Normalize one file into `output_dir`.
///
/// Writes nothing when no row converts; the caller decides whether that is a
/// failure.
pub fn normalize_file(input: &Path, output_dir: &Path) -> Result<FileOutcome, TableError> {
    let read = io::read_table(input)?;
    for row_err in &read.row_errors {
        warn!(file = %io::pretty_path(input), line = row_err.line, "{}", row_err.message);
    }
    let table = read.table;

    let date_idx = find_date_column(&table.headers).ok_or_else(|| TableError::Empty {
        path: input.to_path_buf(),
    })?;
    let date_column = table.headers[date_idx].clone();

    let mut converted: Vec<(NaiveDate, Vec<String>)> = Vec::with_capacity(table.rows.len());
    let mut rows_failed = read.row_errors.len();

    for (row_idx, row) in table.rows.iter().enumerate() {
        let label = row.get(date_idx).map(String::as_str).unwrap_or("");
        match parse_period_label(label) {
            Ok(date) => converted.push((date, row.clone())),
            Err(e) => {
                rows_failed += 1;
                warn!(
                    file = %io::pretty_path(input),
                    line = row_idx + 2,
                    error = %e,
                    "skipping row"
                );
            }
        }
    }

    let rows_read = table.rows.len();
    let rows_before = converted.len();
    converted.sort_by_key(|(date, _)| *date);
    converted.dedup_by_key(|(date, _)| *date);
    let duplicates = rows_before - converted.len();
    if duplicates > 0 {
        warn!(file = %io::pretty_path(input), duplicates, "dropped rows with repeated dates");
    }

    let output = output_dir.join(std_file_name(input));
    let outcome = FileOutcome {
        input: input.to_path_buf(),
        output: output.clone(),
        date_column: date_column.clone(),
        rows_read,
        rows_converted: converted.len(),
        rows_failed,
        duplicates,
        first: converted.first().map(|(d, _)| *d),
        last: converted.last().map(|(d, _)| *d),
    };

    if converted.is_empty() {
        return Ok(outcome);
    }

    let mut headers = Vec::with_capacity(table.headers.len() + 1);
    headers.push(DATE_COLUMN.to_string());
    for (idx, h) in table.headers.iter().enumerate() {
        if idx == date_idx {
            headers.push(format!("{h}_orig"));
        } else {
            headers.push(h.clone());
        }
    }

    let rows = converted
        .into_iter()
        .map(|(date, row)| {
            let mut out = Vec::with_capacity(row.len() + 1);
            out.push(format_date(date));
            out.extend(row);
            out
        })
        .collect();

    io::write_table(&output, &Table { headers, rows })?;
    Ok(outcome)
}

fn find_date_column(headers: &[String]) -> Option<usize> {
    for candidate in DATE_COLUMN_CANDIDATES {
        if let Some(idx) = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(candidate))
        {
            return Some(idx);
        }
    }
    if headers.is_empty() { None } else { Some(0) }
}

/// `cpi_raw.csv` -> `cpi_std.csv`; `notes.csv` -> `notes_std.csv`.
pub fn std_file_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "series".to_string());
    let base = RAW_SUFFIXES
        .iter()
        .find_map(|suffix| stem.strip_suffix(suffix))
        .unwrap_or(&stem);
    format!("{base}{STD_SUFFIX}.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn std_file_name_replaces_raw_suffix() {
        assert_eq!(std_file_name(Path::new("data/cpi_raw.csv")), "cpi_std.csv");
        assert_eq!(std_file_name(Path::new("GDP_原始数据.csv")), "GDP_std.csv");
        assert_eq!(std_file_name(Path::new("wages.tsv")), "wages_std.csv");
    }

    #[test]
    fn normalize_file_skips_bad_rows_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("gdp_raw.csv");
        fs::write(
            &input,
            "季度,value\n2020年第2季度,2\n2020年第1季度,1\n不知道,9\n2020年第1季度,7\n",
        )
        .unwrap();

        let outcome = normalize_file(&input, dir.path()).unwrap();
        assert_eq!(outcome.date_column, "季度");
        assert_eq!(outcome.rows_read, 4);
        assert_eq!(outcome.rows_failed, 1);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.rows_converted, 2);

        let text = fs::read_to_string(dir.path().join("gdp_std.csv")).unwrap();
        assert_eq!(
            text,
            "date,季度_orig,value\n2020-03-31,2020年第1季度,1\n2020-06-30,2020年第2季度,2\n"
        );
    }

    #[test]
    fn process_all_counts_missing_and_unparseable_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ok_raw.csv"), "date,value\n2020-01-01,1\n").unwrap();
        fs::write(dir.path().join("junk_raw.csv"), "date,value\nsoon,1\n").unwrap();

        let config = PipelineConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let processor = DateProcessor::new(&config);
        let mut inputs = processor.default_inputs();
        inputs.push(dir.path().join("absent_raw.csv"));

        let (report, outcomes) = processor.process_all(&inputs);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(outcomes.len(), 1);
        assert!(dir.path().join("ok_std.csv").exists());
        assert!(!dir.path().join("junk_std.csv").exists());
    }
}
