//! Data-directory discovery.
//!
//! Stages either take an explicit `--files` list or pick up every file in the
//! data directory that matches their input suffix. Both paths go through here so
//! the selection order is deterministic.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// A file in the data directory with its size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl DataFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Fail with exit code 2 unless `dir` is an existing directory.
pub fn ensure_data_dir(dir: &Path) -> Result<(), AppError> {
    if !dir.exists() {
        return Err(AppError::input(format!(
            "Data directory not found: {}",
            dir.display()
        )));
    }
    if !dir.is_dir() {
        return Err(AppError::input(format!(
            "Expected a directory, got a file: {}",
            dir.display()
        )));
    }
    Ok(())
}

/// Files in `dir` whose name ends with `suffix` (case-insensitive), sorted by name.
pub fn files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let suffix = suffix.to_ascii_lowercase();
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut out: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.to_lowercase().ends_with(&suffix))
                == Some(true)
        })
        .collect();
    out.sort();
    out
}

/// Every `.csv` / `.tsv` / `.dta` file in `dir`, sorted by name.
pub fn list_data_files(dir: &Path) -> Vec<DataFile> {
    let mut out = Vec::new();
    for ext in [".csv", ".tsv", ".dta"] {
        for path in files_with_suffix(dir, ext) {
            let size_bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            out.push(DataFile { path, size_bytes });
        }
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

/// Resolve an explicit `--files` list against the data directory.
///
/// Bare names are looked up inside `dir`; paths with a directory component are
/// used as given. Missing files are returned separately so the caller can count
/// them as failures instead of aborting.
pub fn resolve_files(dir: &Path, names: &[String]) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut found = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        let given = PathBuf::from(name);
        let path = if given.components().count() > 1 || given.is_absolute() {
            given
        } else {
            dir.join(given)
        };
        if path.is_file() {
            found.push(path);
        } else {
            missing.push(path);
        }
    }
    (found, missing)
}

/// Human-readable file size (`1.5KB`).
pub fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1}{unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1}TB")
}

/// File name without the directory, for log lines and reports.
pub fn pretty_path(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_match_is_sorted_and_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_raw.csv", "a_RAW.CSV", "c_std.csv", "notes.txt"] {
            fs::write(dir.path().join(name), "date\n").unwrap();
        }
        let names: Vec<String> = files_with_suffix(dir.path(), "_raw.csv")
            .iter()
            .map(|p| pretty_path(p))
            .collect();
        assert_eq!(names, vec!["a_RAW.CSV", "b_raw.csv"]);
    }

    #[test]
    fn resolve_files_splits_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.csv"), "date\n").unwrap();
        let (found, missing) =
            resolve_files(dir.path(), &["x.csv".to_string(), "y.csv".to_string()]);
        assert_eq!(found.len(), 1);
        assert_eq!(missing.len(), 1);
    }

    #[test]
    fn missing_data_dir_is_input_error() {
        let err = ensure_data_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn human_size_units() {
        assert_eq!(human_size(512), "512.0B");
        assert_eq!(human_size(1536), "1.5KB");
    }
}
