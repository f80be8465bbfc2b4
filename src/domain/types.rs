//! Shared domain types.
//!
//! These types are kept lightweight so every stage can build them from a
//! delimited file, transform them, and write them back out:
//!
//! - `Frequency` / `InterpolationMethod` (configuration enums)
//! - `Series` + `Observation` (one indicator, possibly several value columns)
//! - `UnifiedDataset` (all series joined on a monthly axis)
//! - `StageReport` (success/failure counts every stage returns)

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Native sampling frequency of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Monthly,
    Quarterly,
    Annual,
}

impl Frequency {
    pub fn display_name(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Annual => "annual",
        }
    }
}

/// How quarterly anchors are filled in to monthly values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Straight line between consecutive anchors.
    #[default]
    Linear,
    /// Natural cubic spline through all anchors of a column.
    Cubic,
    /// Hold the previous anchor until the next one.
    Step,
}

/// One dated row of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    /// One entry per `Series::columns`; `None` is a missing value.
    pub values: Vec<Option<f64>>,
}

/// A named indicator with one or more numeric value columns.
///
/// Invariant: `observations` are strictly increasing by date.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub frequency: Frequency,
    pub unit: Option<String>,
    pub columns: Vec<String>,
    pub observations: Vec<Observation>,
}

impl Series {
    /// Build a series from unordered rows, sorting by date and keeping the first
    /// row of every duplicated date.
    ///
    /// Returns the series and the number of duplicate rows discarded.
    pub fn from_rows(
        name: impl Into<String>,
        frequency: Frequency,
        columns: Vec<String>,
        mut rows: Vec<Observation>,
    ) -> (Self, usize) {
        // Stable sort keeps the original order among equal dates.
        rows.sort_by_key(|o| o.date);
        let before = rows.len();
        rows.dedup_by_key(|o| o.date);
        let dropped = before - rows.len();

        (
            Self {
                name: name.into(),
                frequency,
                unit: None,
                columns,
                observations: rows,
            },
            dropped,
        )
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Values of a single column, aligned with `observations`.
    pub fn column_values(&self, col: usize) -> Vec<Option<f64>> {
        self.observations
            .iter()
            .map(|o| o.values.get(col).copied().flatten())
            .collect()
    }
}

/// All series outer-joined on a monthly date axis.
///
/// Invariant: exactly one row per calendar month between the first and last row,
/// dates are month starts.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Observation>,
}

impl UnifiedDataset {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Missing-cell count per column.
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let missing = self
                    .rows
                    .iter()
                    .filter(|r| r.values.get(idx).copied().flatten().is_none())
                    .count();
                (name.clone(), missing)
            })
            .collect()
    }
}

/// Outcome counts of one pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub succeeded: usize,
    pub failed: usize,
    /// Human-readable detail lines (one per processed item).
    pub details: Vec<String>,
}

impl StageReport {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            ..Default::default()
        }
    }

    pub fn success(&mut self, detail: impl Into<String>) {
        self.succeeded += 1;
        self.details.push(detail.into());
    }

    pub fn failure(&mut self, detail: impl Into<String>) {
        self.failed += 1;
        self.details.push(detail.into());
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Months since year 0 (`year * 12 + month0`); consecutive months differ by one.
pub fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

/// Inverse of [`month_index`], returning the month start.
pub fn month_from_index(index: i32) -> Option<NaiveDate> {
    let year = index.div_euclid(12);
    let month0 = index.rem_euclid(12) as u32;
    NaiveDate::from_ymd_opt(year, month0 + 1, 1)
}
