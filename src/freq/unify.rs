//! Outer join of monthly series on a shared month axis.

use std::collections::HashMap;

use super::FrequencyError;
use crate::domain::{
    DateRange, Observation, Series, UnifiedDataset, month_from_index, month_index,
};
use crate::io::dedupe_headers;

/// Join monthly series into one row per month.
///
/// The axis runs from `range.start` (or the earliest observation) to
/// `range.end` (or the latest observation). Months a series does not cover are
/// `None`.
pub fn build_unified(series: &[Series], range: DateRange) -> Result<UnifiedDataset, FrequencyError> {
    let (start, end) = range.month_bounds();
    let data_lo = series.iter().filter_map(|s| s.first_date()).min();
    let data_hi = series.iter().filter_map(|s| s.last_date()).max();

    let lo = start.or(data_lo).ok_or(FrequencyError::NoSeries)?;
    let hi = end.or(data_hi).ok_or(FrequencyError::NoSeries)?;
    let (lo, hi) = (month_index(lo), month_index(hi));
    if lo > hi {
        return Err(FrequencyError::EmptyRange);
    }

    let columns = dedupe_headers(
        series
            .iter()
            .flat_map(|s| s.columns.iter().map(move |c| unified_column_name(s, c))),
    );

    let lookups: Vec<HashMap<i32, &Observation>> = series
        .iter()
        .map(|s| s.observations.iter().map(|o| (month_index(o.date), o)).collect())
        .collect();

    let mut rows = Vec::with_capacity((hi - lo + 1) as usize);
    for idx in lo..=hi {
        let Some(date) = month_from_index(idx) else {
            continue;
        };
        let mut values = Vec::with_capacity(columns.len());
        for (s, lookup) in series.iter().zip(&lookups) {
            match lookup.get(&idx) {
                Some(obs) => values.extend((0..s.columns.len()).map(|c| obs.values.get(c).copied().flatten())),
                None => values.extend(std::iter::repeat_n(None, s.columns.len())),
            }
        }
        rows.push(Observation { date, values });
    }

    Ok(UnifiedDataset { columns, rows })
}

/// `cpi` + `value` -> `cpi`; `bond` + `spread` -> `bond_spread`.
fn unified_column_name(series: &Series, column: &str) -> String {
    if series.columns.len() == 1 && column.eq_ignore_ascii_case("value") {
        series.name.clone()
    } else {
        format!("{}_{}", series.name, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Frequency;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn monthly(name: &str, cols: &[&str], rows: Vec<(NaiveDate, Vec<Option<f64>>)>) -> Series {
        Series {
            name: name.into(),
            frequency: Frequency::Monthly,
            unit: None,
            columns: cols.iter().map(|c| c.to_string()).collect(),
            observations: rows
                .into_iter()
                .map(|(date, values)| Observation { date, values })
                .collect(),
        }
    }

    #[test]
    fn outer_join_leaves_gaps_as_missing() {
        let cpi = monthly("cpi", &["value"], vec![(d(2020, 1), vec![Some(1.0)]), (d(2020, 3), vec![Some(3.0)])]);
        let bond = monthly(
            "bond",
            &["rate_2y", "spread"],
            vec![(d(2020, 2), vec![Some(2.0), Some(0.5)])],
        );
        let u = build_unified(&[cpi, bond], DateRange::default()).unwrap();
        assert_eq!(u.columns, vec!["cpi", "bond_rate_2y", "bond_spread"]);
        assert_eq!(u.n_rows(), 3);
        assert_eq!(u.rows[0].values, vec![Some(1.0), None, None]);
        assert_eq!(u.rows[1].values, vec![None, Some(2.0), Some(0.5)]);
        assert_eq!(u.missing_counts()[0], ("cpi".to_string(), 1));
    }

    #[test]
    fn configured_range_pads_and_clips() {
        let cpi = monthly("cpi", &["value"], vec![(d(2020, 1), vec![Some(1.0)]), (d(2021, 1), vec![Some(2.0)])]);
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2019, 11, 15),
            end: NaiveDate::from_ymd_opt(2020, 2, 29),
        };
        let u = build_unified(&[cpi], range).unwrap();
        let dates: Vec<_> = u.rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(2019, 11), d(2019, 12), d(2020, 1), d(2020, 2)]);
        assert_eq!(u.rows[2].values, vec![Some(1.0)]);
    }

    #[test]
    fn no_series_and_no_range_is_an_error() {
        assert!(matches!(
            build_unified(&[], DateRange::default()),
            Err(FrequencyError::NoSeries)
        ));
    }

    proptest! {
        #[test]
        fn one_row_per_month_in_range(
            start_year in 1990i32..2020,
            start_month in 1u32..=12,
            span in 0i32..240,
            offsets in proptest::collection::vec(0i32..300, 0..40),
        ) {
            let start = d(start_year, start_month);
            let end = month_from_index(month_index(start) + span).unwrap();
            let rows = offsets
                .iter()
                .filter_map(|o| month_from_index(month_index(start) - 30 + o))
                .collect::<HashSet<_>>()
                .into_iter()
                .map(|date| (date, vec![Some(1.0)]))
                .collect::<Vec<_>>();
            let mut s = monthly("x", &["value"], rows);
            s.observations.sort_by_key(|o| o.date);

            let u = build_unified(&[s], DateRange { start: Some(start), end: Some(end) }).unwrap();
            prop_assert_eq!(u.n_rows() as i32, span + 1);
            prop_assert_eq!(u.rows.first().unwrap().date, start);
            prop_assert_eq!(u.rows.last().unwrap().date, end);
            for w in u.rows.windows(2) {
                prop_assert_eq!(month_index(w[1].date) - month_index(w[0].date), 1);
            }
        }
    }
}
