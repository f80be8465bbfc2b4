//! Data-quality reporting over the files in the data directory.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::dates::processor::STD_SUFFIX;
use crate::domain::PipelineConfig;
use crate::freq::{MONTHLY_SUFFIX, UNIFIED_FILE};
use crate::io::{self, DATE_COLUMN, TableError};

pub mod format;

pub use format::*;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnQuality {
    pub name: String,
    pub missing: usize,
    /// Share of rows missing, in percent.
    pub missing_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileQuality {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
    pub column_quality: Vec<ColumnQuality>,
}

/// Files worth inspecting: the unified dataset first, then monthly, then normalized.
pub fn key_files(config: &PipelineConfig) -> Vec<PathBuf> {
    let unified = config.data_path(UNIFIED_FILE);
    let mut out = Vec::new();
    if unified.is_file() {
        out.push(unified.clone());
    }
    for suffix in [MONTHLY_SUFFIX, STD_SUFFIX] {
        out.extend(
            io::files_with_suffix(&config.data_dir, &format!("{suffix}.csv"))
                .into_iter()
                .filter(|p| *p != unified),
        );
    }
    out
}

/// Row/column counts, date span, and per-column missing counts of one file.
pub fn analyze_file(path: &Path) -> Result<FileQuality, TableError> {
    let table = io::read_table(path)?.table;
    let rows = table.rows.len();

    let dates: Vec<NaiveDate> = table
        .column_index(DATE_COLUMN)
        .map(|idx| table.column(idx).filter_map(io::parse_iso_date).collect())
        .unwrap_or_default();

    let column_quality = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.as_str() != DATE_COLUMN)
        .map(|(idx, h)| {
            let missing = table.column(idx).filter(|c| io::is_missing_cell(c)).count();
            let missing_pct = if rows == 0 {
                0.0
            } else {
                missing as f64 * 100.0 / rows as f64
            };
            ColumnQuality {
                name: h.clone(),
                missing,
                missing_pct,
            }
        })
        .collect();

    Ok(FileQuality {
        path: path.to_path_buf(),
        rows,
        columns: table.headers.len(),
        first: dates.iter().min().copied(),
        last: dates.iter().max().copied(),
        column_quality,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn analyze_counts_missing_per_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_monthly.csv");
        fs::write(&path, "date,a,b\n2020-02-01,1,\n2020-01-01,,\n2020-03-01,3,4\n2020-04-01,4,.\n").unwrap();

        let q = analyze_file(&path).unwrap();
        assert_eq!((q.rows, q.columns), (4, 3));
        assert_eq!(q.first, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(q.last, NaiveDate::from_ymd_opt(2020, 4, 1));
        assert_eq!(q.column_quality[0].missing, 1);
        assert_eq!(q.column_quality[1].missing, 3);
        assert!((q.column_quality[1].missing_pct - 75.0).abs() < 1e-9);
    }

    #[test]
    fn key_files_lists_unified_once_and_first() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["unified_monthly.csv", "cpi_monthly.csv", "cpi_std.csv", "cpi_raw.csv"] {
            fs::write(dir.path().join(name), "date\n").unwrap();
        }
        let cfg = PipelineConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let names: Vec<_> = key_files(&cfg).iter().map(|p| io::pretty_path(p)).collect();
        assert_eq!(names, vec!["unified_monthly.csv", "cpi_monthly.csv", "cpi_std.csv"]);
    }
}
