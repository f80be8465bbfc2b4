//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the stage code stays free of presentation concerns
//! - output changes are localized (important for snapshot-style tests)

use std::path::Path;

use crate::app::pipeline::PipelineRun;
use crate::domain::StageReport;
use crate::io::{self, DataFile};

use super::FileQuality;

/// `list`: data files with sizes.
pub fn format_file_list(dir: &Path, files: &[DataFile]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Data directory: {}\n", dir.display()));
    if files.is_empty() {
        out.push_str("(no csv/dta files)\n");
        return out;
    }

    out.push_str(&format!("{:<40} {:>10}\n", "file", "size"));
    out.push_str(&format!("{:-<40} {:-<10}\n", "", ""));
    let mut total = 0;
    for f in files {
        total += f.size_bytes;
        out.push_str(&format!(
            "{:<40} {:>10}\n",
            truncate(&f.file_name(), 40),
            io::human_size(f.size_bytes)
        ));
    }
    out.push_str(&format!("{} files, {}\n", files.len(), io::human_size(total)));
    out
}

/// `report`: one block per file.
pub fn format_quality_report(reports: &[Result<FileQuality, String>]) -> String {
    let mut out = String::new();
    out.push_str("=== mp - data quality report ===\n");
    if reports.is_empty() {
        out.push_str("(no normalized or monthly files; run `unify-date` / `interpolate` first)\n");
        return out;
    }

    for report in reports {
        out.push('\n');
        match report {
            Ok(q) => out.push_str(&format_file_quality(q)),
            Err(e) => out.push_str(&format!("! {e}\n")),
        }
    }
    out
}

fn format_file_quality(q: &FileQuality) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", io::pretty_path(&q.path)));
    out.push_str(&format!("  rows={} cols={}", q.rows, q.columns));
    match (q.first, q.last) {
        (Some(first), Some(last)) => out.push_str(&format!(" | {first} ~ {last}\n")),
        _ => out.push_str(" | no dates\n"),
    }
    for c in &q.column_quality {
        if c.missing == 0 {
            continue;
        }
        out.push_str(&format!(
            "  {:<32} missing {:>6} ({:>5.1}%)\n",
            truncate(&c.name, 32),
            c.missing,
            c.missing_pct
        ));
    }
    if q.column_quality.iter().all(|c| c.missing == 0) {
        out.push_str("  no missing values\n");
    }
    out
}

/// One stage: counts plus a line per file.
pub fn format_stage_report(report: &StageReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "[{}] {} succeeded, {} failed\n",
        report.stage, report.succeeded, report.failed
    ));
    for detail in &report.details {
        out.push_str(&format!("  {detail}\n"));
    }
    out
}

/// Every stage of a run, followed by totals and elapsed time.
pub fn format_run_summary(run: &PipelineRun) -> String {
    let mut out = String::new();
    for report in &run.reports {
        out.push_str(&format_stage_report(report));
    }

    if let Some(fetch) = &run.fetch {
        if !fetch.categories_failed.is_empty() {
            let names: Vec<&str> = fetch.categories_failed.iter().map(|c| c.name()).collect();
            out.push_str(&format!("Failed categories: {}\n", names.join(", ")));
        }
    }
    if let (Some(unified), Some(path)) = (&run.unified, &run.unified_path) {
        out.push_str(&format!(
            "Unified dataset: {} ({} months x {} series)\n",
            io::pretty_path(path),
            unified.n_rows(),
            unified.columns.len()
        ));
    }

    let total: usize = run.reports.iter().map(|r| r.total()).sum();
    out.push_str(&format!(
        "Done: {} stage(s), {} file(s), {} failed, {:.1}s\n",
        run.reports.len(),
        total,
        run.total_failed(),
        run.elapsed.as_secs_f64()
    ));
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
