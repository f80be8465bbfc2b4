//! Delimited-text ingest and output.
//!
//! Every stage reads and writes plain delimited files keyed by a `date` column.
//! This module turns those files into either a raw string `Table` (date and
//! format stages) or a numeric `Series` (frequency stage), and back.
//!
//! Design goals:
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Tolerant headers** (BOM stripped, duplicate names made unique)
//! - **Deterministic output** (stable column order, empty cell for missing values)

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{Frequency, Observation, Series, UnifiedDataset};

/// Name of the canonical date column every normalized file carries.
pub const DATE_COLUMN: &str = "date";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("'{path}' has no `{column}` column")]
    MissingColumn { path: PathBuf, column: String },

    #[error("'{path}' contains no usable rows")]
    Empty { path: PathBuf },
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    /// 1-based line number in the source file (header is line 1).
    pub line: usize,
    pub message: String,
}

/// A raw table of string cells; every row has `headers.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |r| r.get(idx).map(String::as_str).unwrap_or(""))
    }
}

/// Ingest output: table + row errors.
#[derive(Debug, Clone)]
pub struct TableRead {
    pub table: Table,
    pub row_errors: Vec<RowError>,
}

/// Read a delimited file into a string table.
///
/// Short rows are padded with empty cells and long rows are truncated, so the
/// table is always rectangular.
pub fn read_table(path: &Path) -> Result<TableRead, TableError> {
    let file = File::open(path).map_err(|source| TableError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let raw_headers = reader
        .headers()
        .map_err(|source| TableError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    let headers = dedupe_headers(raw_headers.iter().map(normalize_header_name));
    let width = headers.len();

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header, and lines are 1-based.
        let line = idx + 2;
        match result {
            Ok(record) => {
                let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
                row.resize(width, String::new());
                rows.push(row);
            }
            Err(e) => row_errors.push(RowError {
                line,
                message: format!("CSV parse error: {e}"),
            }),
        }
    }

    debug!(path = %path.display(), rows = rows.len(), columns = width, "read table");

    Ok(TableRead {
        table: Table { headers, rows },
        row_errors,
    })
}

/// Write a string table as comma-separated text.
pub fn write_table(path: &Path, table: &Table) -> Result<(), TableError> {
    let write_err = |source| TableError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(write_err)?;
    writer.write_record(&table.headers).map_err(write_err)?;
    for row in &table.rows {
        writer.write_record(row).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| write_err(csv::Error::from(e)))?;
    Ok(())
}

/// Result of loading a numeric series from a date-keyed file.
#[derive(Debug, Clone)]
pub struct SeriesRead {
    pub series: Series,
    /// Non-numeric columns that were left out.
    pub skipped_columns: Vec<String>,
    pub row_errors: Vec<RowError>,
}

/// Load a normalized (`date`-keyed) file as a numeric series.
///
/// Only numeric columns are carried; `frequency` is a placeholder that the
/// caller replaces after detection.
pub fn read_series(path: &Path, name: &str) -> Result<SeriesRead, TableError> {
    let TableRead {
        table,
        mut row_errors,
    } = read_table(path)?;

    let date_idx = table
        .column_index(DATE_COLUMN)
        .ok_or_else(|| TableError::MissingColumn {
            path: path.to_path_buf(),
            column: DATE_COLUMN.to_string(),
        })?;

    let mut value_cols = Vec::new();
    let mut skipped_columns = Vec::new();
    for (idx, header) in table.headers.iter().enumerate() {
        if idx == date_idx {
            continue;
        }
        if is_numeric_column(table.column(idx)) {
            value_cols.push(idx);
        } else {
            skipped_columns.push(header.clone());
        }
    }

    let mut observations = Vec::with_capacity(table.rows.len());
    for (row_idx, row) in table.rows.iter().enumerate() {
        let raw_date = row.get(date_idx).map(String::as_str).unwrap_or("");
        let Some(date) = parse_iso_date(raw_date) else {
            row_errors.push(RowError {
                line: row_idx + 2,
                message: format!("Invalid date '{raw_date}' (expected YYYY-MM-DD)."),
            });
            continue;
        };
        let values = value_cols
            .iter()
            .map(|&c| row.get(c).and_then(|s| parse_cell(s)))
            .collect();
        observations.push(Observation { date, values });
    }

    if observations.is_empty() {
        return Err(TableError::Empty {
            path: path.to_path_buf(),
        });
    }

    let columns = value_cols.iter().map(|&c| table.headers[c].clone()).collect();
    let (series, duplicates) = Series::from_rows(name, Frequency::Monthly, columns, observations);
    if duplicates > 0 {
        warn!(path = %path.display(), duplicates, "dropped rows with repeated dates");
    }

    Ok(SeriesRead {
        series,
        skipped_columns,
        row_errors,
    })
}

/// Write a series as `date,<columns...>`.
pub fn write_series(path: &Path, series: &Series) -> Result<(), TableError> {
    write_observations(path, &series.columns, &series.observations)
}

/// Write the unified dataset as `date,<columns...>`.
pub fn write_unified(path: &Path, dataset: &UnifiedDataset) -> Result<(), TableError> {
    write_observations(path, &dataset.columns, &dataset.rows)
}

fn write_observations(
    path: &Path,
    columns: &[String],
    rows: &[Observation],
) -> Result<(), TableError> {
    let mut headers = Vec::with_capacity(columns.len() + 1);
    headers.push(DATE_COLUMN.to_string());
    headers.extend(columns.iter().cloned());

    let rows = rows
        .iter()
        .map(|o| {
            let mut row = Vec::with_capacity(o.values.len() + 1);
            row.push(o.date.format("%Y-%m-%d").to_string());
            row.extend(o.values.iter().map(|v| format_cell(*v)));
            row
        })
        .collect();

    write_table(path, &Table { headers, rows })
}

/// True for cells that represent a missing value.
pub fn is_missing_cell(s: &str) -> bool {
    let s = s.trim();
    s.is_empty()
        || s == "."
        || s.eq_ignore_ascii_case("na")
        || s.eq_ignore_ascii_case("nan")
        || s.eq_ignore_ascii_case("null")
}

/// Parse a numeric cell; missing markers and non-finite values become `None`.
pub fn parse_cell(s: &str) -> Option<f64> {
    if is_missing_cell(s) {
        return None;
    }
    let v = s.trim().replace(',', "").parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

/// A column is numeric when it has at least one value and every non-missing
/// cell parses as a number.
pub fn is_numeric_column<'a>(cells: impl Iterator<Item = &'a str>) -> bool {
    let mut seen = false;
    for cell in cells {
        if is_missing_cell(cell) {
            continue;
        }
        if parse_cell(cell).is_none() {
            return false;
        }
        seen = true;
    }
    seen
}

/// Parse `YYYY-MM-DD`, ignoring any trailing time component.
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn format_cell(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("tab") => b'\t',
        _ => b',',
    }
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

/// Make header names unique: the second `x` becomes `x_1`, the third `x_2`, ...
pub fn dedupe_headers(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();
    for name in names {
        let count = seen.entry(name.clone()).or_insert(0);
        if *count == 0 {
            out.push(name);
        } else {
            out.push(format!("{name}_{count}"));
        }
        *count += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn read_table_strips_bom_and_dedupes_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "t.csv", "\u{feff}date,v,v\n2020-01-01,1,2\n2020-02-01,3\n");
        let read = read_table(&path).unwrap();
        assert_eq!(read.table.headers, vec!["date", "v", "v_1"]);
        assert_eq!(read.table.rows[1], vec!["2020-02-01", "3", ""]);
    }

    #[test]
    fn read_series_keeps_numeric_columns_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "cpi_std.csv",
            "date,label,value\n2020-02-01,b,2.5\n2020-01-01,a,.\nbad,c,1\n",
        );
        let read = read_series(&path, "cpi").unwrap();
        assert_eq!(read.series.columns, vec!["value"]);
        assert_eq!(read.skipped_columns, vec!["label"]);
        assert_eq!(read.row_errors.len(), 1);
        assert_eq!(read.series.column_values(0), vec![None, Some(2.5)]);
    }

    #[test]
    fn parse_cell_handles_missing_markers_and_thousands() {
        assert_eq!(parse_cell("1,234.5"), Some(1234.5));
        assert_eq!(parse_cell("NaN"), None);
        assert_eq!(parse_cell("."), None);
        assert_eq!(parse_cell("abc"), None);
    }

    #[test]
    fn write_then_read_series_preserves_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let series = Series {
            name: "x".into(),
            frequency: Frequency::Monthly,
            unit: None,
            columns: vec!["a".into(), "b".into()],
            observations: vec![Observation {
                date: NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(),
                values: vec![Some(1.5), None],
            }],
        };
        write_series(&path, &series).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "date,a,b\n2021-03-01,1.5,\n");
    }
}
