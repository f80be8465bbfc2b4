//! Batch download of catalog indicators with bounded retry.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::thread;

use chrono::{Datelike, NaiveDate};
use tracing::{error, info, warn};

use super::catalog::{Category, INDICATORS, Indicator};
use super::{FetchError, SeriesSource};
use crate::dates;
use crate::domain::{Frequency, Observation, PipelineConfig, Series, StageReport};
use crate::io;

/// Suffix of downloaded files; `unify-date` picks these up.
pub const RAW_SUFFIX: &str = "_raw";

/// Outcome of one fetch batch.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub succeeded: Vec<String>,
    /// `(indicator, reason)`
    pub failed: Vec<(String, String)>,
    pub categories_ok: Vec<Category>,
    pub categories_failed: Vec<Category>,
    pub written: Vec<PathBuf>,
}

impl FetchReport {
    pub fn to_stage_report(&self) -> StageReport {
        let mut report = StageReport::new("fetch");
        for (name, path) in self.succeeded.iter().zip(&self.written) {
            let description = INDICATORS
                .iter()
                .find(|i| i.name == name.as_str())
                .map(|i| format!(" ({})", i.description))
                .unwrap_or_default();
            report.success(format!("{name}{description} -> {}", io::pretty_path(path)));
        }
        for (name, reason) in &self.failed {
            report.failure(format!("{name}: {reason}"));
        }
        report
    }
}

pub struct DataFetcher<'a, S: SeriesSource> {
    source: S,
    config: &'a PipelineConfig,
}

impl<'a, S: SeriesSource> DataFetcher<'a, S> {
    pub fn new(source: S, config: &'a PipelineConfig) -> Self {
        Self { source, config }
    }

    /// Fetch every indicator of `categories`; failures are recorded, never fatal.
    pub fn run(&self, categories: &[Category]) -> FetchReport {
        let mut report = FetchReport::default();
        let mut first_request = true;

        for &category in categories {
            let indicators = super::indicators_for(&[category]);
            let mut category_ok = false;

            for indicator in indicators {
                match self.fetch_indicator(indicator, &mut first_request) {
                    Ok(path) => {
                        info!(indicator = indicator.name, path = %path.display(), "fetched indicator");
                        report.succeeded.push(indicator.name.to_string());
                        report.written.push(path);
                        category_ok = true;
                    }
                    Err(reason) => {
                        error!(indicator = indicator.name, error = %reason, "fetch failed");
                        report.failed.push((indicator.name.to_string(), reason));
                    }
                }
            }

            if category_ok {
                report.categories_ok.push(category);
            } else {
                warn!(category = category.name(), "every indicator in category failed");
                report.categories_failed.push(category);
            }
        }
        report
    }

    fn fetch_indicator(&self, indicator: &Indicator, first_request: &mut bool) -> Result<PathBuf, String> {
        let mut columns: Vec<Vec<(NaiveDate, Option<f64>)>> = Vec::with_capacity(indicator.columns.len());
        for col in indicator.columns {
            if !*first_request {
                pause(self.config.fetch.request_interval());
            }
            *first_request = false;
            let obs = self
                .fetch_with_retry(col.series_id)
                .map_err(|e| e.to_string())?;
            columns.push(obs);
        }

        let series = assemble(indicator, columns);
        if series.observations.is_empty() {
            return Err("no observations".to_string());
        }
        let path = self
            .config
            .data_path(&format!("{}{RAW_SUFFIX}.csv", indicator.name));
        io::write_series(&path, &series).map_err(|e| e.to_string())?;
        Ok(path)
    }

    /// First attempt plus up to `max_retries` retries on transient errors.
    pub fn fetch_with_retry(&self, series_id: &str) -> Result<Vec<(NaiveDate, Option<f64>)>, FetchError> {
        let fetch = &self.config.fetch;
        let range = self.config.range();
        let mut last_error = None;

        for attempt in 0..=fetch.max_retries {
            if attempt > 0 {
                warn!(series_id, attempt, max_retries = fetch.max_retries, "retrying");
                pause(fetch.retry_delay());
            }
            match self.source.fetch(series_id, range) {
                Ok(obs) => return Ok(obs),
                Err(e) if e.is_transient() => {
                    warn!(series_id, error = %e, "transient fetch error");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Empty {
            series_id: series_id.to_string(),
        }))
    }
}

fn pause(d: std::time::Duration) {
    if !d.is_zero() {
        thread::sleep(d);
    }
}

/// FRED stamps a period with its first day; the pipeline anchors quarters and
/// years at their last day.
fn period_end(frequency: Frequency, date: NaiveDate) -> NaiveDate {
    let end = match frequency {
        Frequency::Quarterly => dates::quarter_end(date.year(), date.month0() / 3 + 1),
        Frequency::Annual => NaiveDate::from_ymd_opt(date.year(), 12, 31),
        Frequency::Daily | Frequency::Monthly => None,
    };
    end.unwrap_or(date)
}

/// Outer-join the per-column observations on date and append any spread.
fn assemble(indicator: &Indicator, columns: Vec<Vec<(NaiveDate, Option<f64>)>>) -> Series {
    let width = indicator.columns.len();
    let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    for (col, obs) in columns.into_iter().enumerate() {
        for (date, value) in obs {
            let date = period_end(indicator.frequency, date);
            let row = by_date.entry(date).or_insert_with(|| vec![None; width]);
            // First value wins on a repeated date.
            if row[col].is_none() {
                row[col] = value;
            }
        }
    }

    let mut names: Vec<String> = indicator.columns.iter().map(|c| c.column.to_string()).collect();
    let spread_idx = indicator.spread.and_then(|s| {
        let a = names.iter().position(|n| n == s.minuend)?;
        let b = names.iter().position(|n| n == s.subtrahend)?;
        Some((a, b, s.column))
    });
    if let Some((_, _, column)) = spread_idx {
        names.push(column.to_string());
    }

    let rows = by_date
        .into_iter()
        .map(|(date, mut values)| {
            if let Some((a, b, _)) = spread_idx {
                let spread = match (values[a], values[b]) {
                    (Some(x), Some(y)) => Some(x - y),
                    _ => None,
                };
                values.push(spread);
            }
            Observation { date, values }
        })
        .collect();

    let (mut series, _) = Series::from_rows(indicator.name, indicator.frequency, names, rows);
    series.unit = Some(indicator.unit.to_string());
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::catalog::INDICATORS;
    use crate::domain::{DateRange, FetchConfig};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Replays scripted responses per series id and counts calls.
    #[derive(Default)]
    struct MockSource {
        script: RefCell<HashMap<String, Vec<Result<Vec<(NaiveDate, Option<f64>)>, FetchError>>>>,
        calls: RefCell<HashMap<String, usize>>,
    }

    impl MockSource {
        fn with(self, id: &str, responses: Vec<Result<Vec<(NaiveDate, Option<f64>)>, FetchError>>) -> Self {
            self.script.borrow_mut().insert(id.to_string(), responses);
            self
        }

        fn calls(&self, id: &str) -> usize {
            self.calls.borrow().get(id).copied().unwrap_or(0)
        }
    }

    impl SeriesSource for &MockSource {
        fn fetch(&self, series_id: &str, _range: DateRange) -> Result<Vec<(NaiveDate, Option<f64>)>, FetchError> {
            *self.calls.borrow_mut().entry(series_id.to_string()).or_insert(0) += 1;
            let mut script = self.script.borrow_mut();
            match script.get_mut(series_id) {
                Some(queue) if !queue.is_empty() => queue.remove(0),
                _ => Err(FetchError::Status {
                    series_id: series_id.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn unavailable(id: &str) -> FetchError {
        FetchError::Status {
            series_id: id.to_string(),
            status: 503,
        }
    }

    fn config(dir: &std::path::Path) -> PipelineConfig {
        PipelineConfig {
            data_dir: dir.to_path_buf(),
            fetch: FetchConfig {
                max_retries: 2,
                retry_delay_secs: 0,
                request_interval_secs: 0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn transient_errors_are_retried_until_success() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let source = MockSource::default().with(
            "CPIAUCSL",
            vec![Err(unavailable("CPIAUCSL")), Ok(vec![(d(2020, 1, 1), Some(1.0))])],
        );
        let fetcher = DataFetcher::new(&source, &cfg);
        assert!(fetcher.fetch_with_retry("CPIAUCSL").is_ok());
        assert_eq!(source.calls("CPIAUCSL"), 2);
    }

    #[test]
    fn retries_are_bounded_and_permanent_errors_stop_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let source = MockSource::default().with(
            "A",
            vec![Err(unavailable("A")), Err(unavailable("A")), Err(unavailable("A")), Err(unavailable("A"))],
        );
        let fetcher = DataFetcher::new(&source, &cfg);
        assert!(fetcher.fetch_with_retry("A").unwrap_err().is_transient());
        assert_eq!(source.calls("A"), 3);

        assert!(fetcher.fetch_with_retry("MISSING").is_err());
        assert_eq!(source.calls("MISSING"), 1);
    }

    #[test]
    fn batch_continues_past_failed_category() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let source = MockSource::default()
            .with("DGS2", vec![Ok(vec![(d(2024, 1, 2), Some(4.0)), (d(2024, 1, 3), Some(4.1))])])
            .with("DGS10", vec![Ok(vec![(d(2024, 1, 2), Some(4.5)), (d(2024, 1, 4), Some(4.2))])]);

        let report = DataFetcher::new(&source, &cfg).run(&[Category::Wage, Category::Bond]);
        assert_eq!(report.categories_failed, vec![Category::Wage]);
        assert_eq!(report.categories_ok, vec![Category::Bond]);
        assert_eq!(report.succeeded, vec!["bond"]);
        assert_eq!(report.failed.len(), 1);

        let text = fs::read_to_string(dir.path().join("bond_raw.csv")).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "date,rate_2y,rate_10y,spread");
        assert_eq!(lines[1], "2024-01-02,4,4.5,0.5");
        assert_eq!(lines[2], "2024-01-03,4.1,,");
        assert_eq!(lines[3], "2024-01-04,,4.2,");

        let stage = report.to_stage_report();
        assert_eq!((stage.succeeded, stage.failed), (1, 1));
        assert!(stage.details[0].starts_with("bond (Treasury constant-maturity yields"));
    }

    #[test]
    fn quarter_start_dates_are_written_as_quarter_ends() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let source = MockSource::default().with(
            "GDPC1",
            vec![Ok(vec![
                (d(2020, 1, 1), Some(100.0)),
                (d(2020, 4, 1), Some(103.0)),
                (d(2020, 7, 1), Some(106.0)),
                (d(2020, 10, 1), Some(109.0)),
            ])],
        );
        let report = DataFetcher::new(&source, &cfg).run(&[Category::Macro]);
        assert!(report.succeeded.contains(&"gdp".to_string()));

        let text = fs::read_to_string(dir.path().join("gdp_raw.csv")).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "date,value",
                "2020-03-31,100",
                "2020-06-30,103",
                "2020-09-30,106",
                "2020-12-31,109",
            ]
        );
    }

    #[test]
    fn annual_dates_move_to_year_end_and_monthly_stay_put() {
        let wage = INDICATORS.iter().find(|i| i.name == "wage").unwrap();
        let s = assemble(wage, vec![vec![(d(2019, 1, 1), Some(50.0)), (d(2020, 1, 1), Some(60.0))]]);
        assert_eq!(s.dates(), vec![d(2019, 12, 31), d(2020, 12, 31)]);

        assert_eq!(period_end(Frequency::Monthly, d(2020, 4, 1)), d(2020, 4, 1));
        assert_eq!(period_end(Frequency::Daily, d(2020, 4, 7)), d(2020, 4, 7));
        assert_eq!(period_end(Frequency::Quarterly, d(2020, 11, 15)), d(2020, 12, 31));
    }

    #[test]
    fn assemble_keeps_single_column_indicators_as_value() {
        let cpi = INDICATORS.iter().find(|i| i.name == "cpi").unwrap();
        let s = assemble(cpi, vec![vec![(d(2020, 2, 1), Some(2.0)), (d(2020, 1, 1), None)]]);
        assert_eq!(s.columns, vec!["value"]);
        assert_eq!(s.dates(), vec![d(2020, 1, 1), d(2020, 2, 1)]);
        assert_eq!(s.unit.as_deref(), Some("index 1982-84=100"));
    }
}
