//! Series-level frequency conversion to a monthly axis.
//!
//! - daily / monthly: mean of each calendar month's values
//! - quarterly: anchor each value at its month, fill the gaps by interpolation
//! - annual: repeat each year's value for January through December

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use super::interpolate;
use crate::domain::{
    Frequency, InterpolationMethod, Observation, Series, month_from_index, month_index,
};

/// Convert any supported series to monthly observations keyed by month start.
pub fn to_monthly(series: &Series, method: InterpolationMethod) -> Series {
    let observations = match series.frequency {
        Frequency::Daily | Frequency::Monthly => monthly_means(series),
        Frequency::Quarterly => interpolate_quarterly(series, method),
        Frequency::Annual => repeat_annual(series),
    };

    Series {
        name: series.name.clone(),
        frequency: Frequency::Monthly,
        unit: series.unit.clone(),
        columns: series.columns.clone(),
        observations,
    }
}

/// Average every column over the observations falling in each month.
fn monthly_means(series: &Series) -> Vec<Observation> {
    let width = series.columns.len();
    let mut buckets: BTreeMap<i32, Vec<(f64, usize)>> = BTreeMap::new();

    for obs in &series.observations {
        let acc = buckets
            .entry(month_index(obs.date))
            .or_insert_with(|| vec![(0.0, 0); width]);
        for (slot, value) in acc.iter_mut().zip(&obs.values) {
            if let Some(v) = value {
                slot.0 += v;
                slot.1 += 1;
            }
        }
    }

    buckets
        .into_iter()
        .filter_map(|(idx, acc)| {
            let date = month_from_index(idx)?;
            let values = acc
                .into_iter()
                .map(|(sum, n)| if n > 0 { Some(sum / n as f64) } else { None })
                .collect();
            Some(Observation { date, values })
        })
        .collect()
}

/// Anchor quarterly values at their months and interpolate each column on its
/// own anchors. The output spans the first through last anchored month.
fn interpolate_quarterly(series: &Series, method: InterpolationMethod) -> Vec<Observation> {
    let anchored = monthly_means(series);
    let (Some(first), Some(last)) = (anchored.first(), anchored.last()) else {
        return Vec::new();
    };
    let months: Vec<i32> = (month_index(first.date)..=month_index(last.date)).collect();

    let filled: Vec<Vec<Option<f64>>> = (0..series.columns.len())
        .map(|col| {
            let anchors: Vec<(i32, f64)> = anchored
                .iter()
                .filter_map(|o| o.values.get(col).copied().flatten().map(|v| (month_index(o.date), v)))
                .collect();
            interpolate::fill(&anchors, &months, method)
        })
        .collect();

    months
        .iter()
        .enumerate()
        .filter_map(|(row, &idx)| {
            let date = month_from_index(idx)?;
            let values = filled.iter().map(|col| col[row]).collect();
            Some(Observation { date, values })
        })
        .collect()
}

/// Repeat each year's (mean) value across its twelve months.
fn repeat_annual(series: &Series) -> Vec<Observation> {
    let width = series.columns.len();
    let mut years: BTreeMap<i32, Vec<(f64, usize)>> = BTreeMap::new();
    for obs in &series.observations {
        let acc = years
            .entry(obs.date.year())
            .or_insert_with(|| vec![(0.0, 0); width]);
        for (slot, value) in acc.iter_mut().zip(&obs.values) {
            if let Some(v) = value {
                slot.0 += v;
                slot.1 += 1;
            }
        }
    }

    let mut out = Vec::with_capacity(years.len() * 12);
    for (year, acc) in years {
        let values: Vec<Option<f64>> = acc
            .into_iter()
            .map(|(sum, n)| if n > 0 { Some(sum / n as f64) } else { None })
            .collect();
        for month in 1..=12 {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
                out.push(Observation {
                    date,
                    values: values.clone(),
                });
            }
        }
    }
    out
}
