//! Stata export (the `to-dta` stage).
//!
//! Each monthly CSV becomes a `.dta` file next to it. Columns Stata cannot
//! hold in a fixed-width type are dropped with a warning rather than coerced;
//! the stage only fails a file on I/O errors or when nothing is left to write.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::domain::{PipelineConfig, StageReport};
use crate::error::AppError;
use crate::freq::MONTHLY_SUFFIX;
use crate::io::{self, DATE_COLUMN, TableError};

pub mod names;
pub mod writer;

pub use writer::{ColumnData, DtaColumn, DtaDataset};

/// Sanitized names that only restate the date and carry no data.
const LABEL_ONLY_COLUMNS: &[&str] = &["month", "quarter", "report_date", "date_cn"];

/// Suffix of the original-label backup columns written by `unify-date`.
const BACKUP_SUFFIX: &str = "_orig";

#[derive(Debug, Error)]
pub enum DtaError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no exportable columns remain")]
    NoColumns,

    #[error("too many variables for Stata ({0})")]
    TooManyVariables(usize),

    #[error("too many observations for Stata ({0})")]
    TooManyObservations(usize),

    #[error("column `{column}` has a different row count")]
    LengthMismatch { column: String },

    #[error("column `{column}` holds values that do not fit a fixed-width string")]
    ValueTooLong { column: String },

    #[error("not a valid ASCII name or label: {0:?}")]
    InvalidText(String),
}

/// Why a column was left out of the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    NonAscii,
    TooLong(usize),
    DateBackup,
    LabelOnly,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::NonAscii => write!(f, "contains non-ASCII text"),
            DropReason::TooLong(n) => write!(f, "{n}-byte text needs strL"),
            DropReason::DateBackup => write!(f, "original date label backup"),
            DropReason::LabelOnly => write!(f, "period label only"),
        }
    }
}

/// Summary of one converted file.
#[derive(Debug, Clone)]
pub struct DtaSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub rows: usize,
    pub rows_before_start: usize,
    pub columns: Vec<String>,
    pub dropped: Vec<(String, DropReason)>,
}

pub struct FormatConverter<'a> {
    config: &'a PipelineConfig,
}

impl<'a> FormatConverter<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Default inputs: every `*_monthly.csv`, which includes `unified_monthly.csv`.
    pub fn default_inputs(&self) -> Vec<PathBuf> {
        io::files_with_suffix(&self.config.data_dir, &format!("{MONTHLY_SUFFIX}.csv"))
    }

    pub fn run(&self, files: &[PathBuf]) -> Result<(StageReport, Vec<DtaSummary>), AppError> {
        if files.is_empty() {
            return Err(AppError::no_series(
                "No monthly files to convert (run `interpolate` first?).",
            ));
        }

        let mut report = StageReport::new("to-dta");
        let mut summaries = Vec::new();
        for path in files {
            let name = io::pretty_path(path);
            match self.convert_file(path) {
                Ok(summary) => {
                    report.success(format!(
                        "{name} -> {} ({} rows x {} vars, {} dropped)",
                        io::pretty_path(&summary.output),
                        summary.rows,
                        summary.columns.len(),
                        summary.dropped.len()
                    ));
                    summaries.push(summary);
                }
                Err(e) => {
                    error!(file = %name, error = %e, "Stata export failed");
                    report.failure(format!("{name}: {e}"));
                }
            }
        }
        Ok((report, summaries))
    }

    pub fn convert_file(&self, path: &Path) -> Result<DtaSummary, DtaError> {
        let output = path.with_extension("dta");
        let read = io::read_table(path)?;
        for row_err in &read.row_errors {
            warn!(file = %io::pretty_path(path), line = row_err.line, "{}", row_err.message);
        }

        let (dataset, rows_before_start, dropped) = build_dataset(
            &read.table,
            self.config.start,
            &self.config.dta.label,
        )?;
        for (column, reason) in &dropped {
            warn!(file = %io::pretty_path(path), column = %column, reason = %reason, "dropping column");
        }
        if rows_before_start > 0 {
            debug!(file = %io::pretty_path(path), rows = rows_before_start, "dropped rows before start date");
        }

        let bytes = writer::encode(&dataset)?;
        std::fs::write(&output, bytes).map_err(|source| DtaError::Write {
            path: output.clone(),
            source,
        })?;
        info!(
            path = %output.display(),
            rows = dataset.n_obs(),
            vars = dataset.columns.len(),
            "wrote Stata file"
        );

        Ok(DtaSummary {
            input: path.to_path_buf(),
            output,
            rows: dataset.n_obs(),
            rows_before_start,
            columns: dataset.columns.iter().map(|c| c.name.clone()).collect(),
            dropped,
        })
    }
}

/// Type every column of `table`, dropping what Stata cannot store.
///
/// Returns the dataset, the number of rows before `start`, and the drops.
pub fn build_dataset(
    table: &io::Table,
    start: Option<NaiveDate>,
    dataset_label: &str,
) -> Result<(DtaDataset, usize, Vec<(String, DropReason)>), DtaError> {
    let date_idx = table.column_index(DATE_COLUMN);
    let dates: Vec<Option<NaiveDate>> = match date_idx {
        Some(idx) => table.column(idx).map(io::parse_iso_date).collect(),
        None => vec![None; table.rows.len()],
    };

    // Undated rows are kept; only rows known to precede `start` go.
    let keep: Vec<usize> = (0..table.rows.len())
        .filter(|&r| match (start, dates[r]) {
            (Some(s), Some(d)) => d >= s,
            _ => true,
        })
        .collect();
    let rows_before_start = table.rows.len() - keep.len();

    let names = names::unique_names(&table.headers);
    let mut columns = Vec::new();
    let mut dropped = Vec::new();

    for (idx, header) in table.headers.iter().enumerate() {
        let name = &names[idx];
        let label = names::ascii_label(header, name);

        if Some(idx) == date_idx {
            columns.push(DtaColumn {
                name: name.clone(),
                label,
                data: ColumnData::Date(keep.iter().map(|&r| dates[r]).collect()),
            });
            continue;
        }
        if header.ends_with(BACKUP_SUFFIX) {
            dropped.push((header.clone(), DropReason::DateBackup));
            continue;
        }
        if LABEL_ONLY_COLUMNS.contains(&name.as_str()) {
            dropped.push((header.clone(), DropReason::LabelOnly));
            continue;
        }

        let cells: Vec<&str> = keep.iter().map(|&r| table.rows[r][idx].as_str()).collect();
        let all_missing = cells.iter().all(|c| io::is_missing_cell(c));
        if all_missing || io::is_numeric_column(cells.iter().copied()) {
            columns.push(DtaColumn {
                name: name.clone(),
                label,
                data: ColumnData::Double(cells.iter().map(|c| io::parse_cell(c)).collect()),
            });
            continue;
        }

        if cells.iter().any(|c| !c.is_ascii()) {
            dropped.push((header.clone(), DropReason::NonAscii));
            continue;
        }
        let width = cells.iter().map(|c| c.len()).max().unwrap_or(0).max(1);
        if width > writer::MAX_STR_WIDTH {
            dropped.push((header.clone(), DropReason::TooLong(width)));
            continue;
        }
        columns.push(DtaColumn {
            name: name.clone(),
            label,
            data: ColumnData::Str {
                width,
                values: cells.iter().map(|c| c.to_string()).collect(),
            },
        });
    }

    if columns.is_empty() {
        return Err(DtaError::NoColumns);
    }

    let dataset = DtaDataset {
        label: dataset_label.chars().filter(char::is_ascii).take(80).collect(),
        timestamp: Local::now().naive_local(),
        columns,
    };
    Ok((dataset, rows_before_start, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;

    fn table(headers: &[&str], rows: &[&[&str]]) -> io::Table {
        io::Table {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn columns_are_typed_and_unsupported_ones_dropped() {
        let t = table(
            &["date", "cpi", "note", "date_orig", "月份", "备注"],
            &[
                &["2020-01-01", "1.5", "ok", "2020年01月份", "2020年01月份", "说明"],
                &["2020-02-01", "", "fine", "2020年02月份", "2020年02月份", "x"],
            ],
        );
        let (ds, before, dropped) = build_dataset(&t, None, "lbl").unwrap();
        let names: Vec<_> = ds.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["date", "cpi", "note"]);
        assert_eq!(before, 0);
        assert_eq!(
            dropped,
            vec![
                ("date_orig".to_string(), DropReason::DateBackup),
                ("月份".to_string(), DropReason::LabelOnly),
                ("备注".to_string(), DropReason::NonAscii),
            ]
        );
        assert_eq!(ds.columns[1].data, ColumnData::Double(vec![Some(1.5), None]));
        assert!(matches!(ds.columns[2].data, ColumnData::Str { width: 4, .. }));
    }

    #[test]
    fn oversized_text_is_dropped() {
        let long = "x".repeat(3000);
        let t = table(&["date", "blob"], &[&["2020-01-01", long.as_str()]]);
        let (_, _, dropped) = build_dataset(&t, None, "lbl").unwrap();
        assert_eq!(dropped, vec![("blob".to_string(), DropReason::TooLong(3000))]);
    }

    #[test]
    fn rows_before_start_are_filtered() {
        let t = table(
            &["date", "v"],
            &[&["2007-12-01", "1"], &["2008-01-01", "2"], &["", "3"]],
        );
        let start = NaiveDate::from_ymd_opt(2008, 1, 1);
        let (ds, before, _) = build_dataset(&t, start, "lbl").unwrap();
        assert_eq!(before, 1);
        assert_eq!(ds.n_obs(), 2);
        assert_eq!(ds.columns[1].data, ColumnData::Double(vec![Some(2.0), Some(3.0)]));
    }

    #[test]
    fn only_dropped_columns_is_an_error() {
        let t = table(&["备注"], &[&["说明"]]);
        assert!(matches!(build_dataset(&t, None, "lbl"), Err(DtaError::NoColumns)));
    }

    #[test]
    fn run_writes_dta_next_to_each_input() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("cpi_monthly.csv"),
            "date,cpi\n2020-01-01,1\n2020-02-01,2\n",
        )
        .unwrap();
        fs::write(dir.path().join("bad_monthly.csv"), "备注\n说明\n").unwrap();
        let config = PipelineConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let converter = FormatConverter::new(&config);
        let (report, summaries) = converter.run(&converter.default_inputs()).unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(summaries[0].rows, 2);
        let bytes = fs::read(dir.path().join("cpi_monthly.dta")).unwrap();
        assert!(bytes.starts_with(b"<stata_dta>"));
    }

    proptest! {
        #[test]
        fn ascii_input_never_fails(
            headers in proptest::collection::vec("[ -~]{0,40}", 1..6),
            cells in proptest::collection::vec("[ -~]{0,12}", 0..30),
        ) {
            let width = headers.len();
            let rows: Vec<Vec<String>> = cells.chunks(width).filter(|c| c.len() == width).map(|c| c.to_vec()).collect();
            let t = io::Table { headers: headers.clone(), rows };
            match build_dataset(&t, None, "lbl") {
                Ok((ds, _, _)) => {
                    prop_assert!(writer::encode(&ds).is_ok());
                }
                // Every header may be a backup or label-only column.
                Err(DtaError::NoColumns) => {}
                Err(e) => prop_assert!(false, "unexpected error: {e}"),
            }
        }
    }
}
