//! Period-label parsing.
//!
//! Statistical sources label observations in several ways: `2020年3月份`,
//! `2020年第1季度`, `A0501_sj.2019`, `2020-03-31`. This module maps every
//! recognized label to one canonical calendar date:
//!
//! - monthly labels map to the first day of the month
//! - quarterly labels map to the last day of the (last) quarter
//! - annual labels map to December 31
//! - full dates are kept as-is
//!
//! The file-level stage lives in `processor`.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

pub mod processor;

pub use processor::{DateProcessor, FileOutcome, normalize_file};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateFormatError {
    #[error("unrecognized date format: '{input}'")]
    Unrecognized { input: String },

    #[error("date out of range: '{input}'")]
    OutOfRange { input: String },
}

/// Which label pattern matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `YYYY年MM月份`
    ChineseMonth,
    /// `YYYY年第Q季度` or `YYYY年第Q1-Q2季度`
    ChineseQuarter,
    /// `prefix.YYYY`
    AnnualCode,
    /// `YYYY-MM-DD` with an optional time suffix
    Standard,
    /// `YYYY/MM/DD`
    Slash,
    /// `YYYY-MM`
    YearMonth,
    /// `YYYYQn` or `YYYY-Qn`
    QuarterCode,
    /// `YYYY`
    Year,
}

static CN_QUARTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})\s*年\s*第\s*(\d)(?:\s*-\s*(\d))?\s*季度").expect("valid regex")
});
static CN_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s*年\s*(\d{1,2})\s*月").expect("valid regex"));
static STANDARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[ T].*)?$").expect("valid regex")
});
static SLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})$").expect("valid regex"));
static YEAR_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})$").expect("valid regex"));
static QUARTER_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)(\d{4})-?Q(\d)$").expect("valid regex"));
static ANNUAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+\.(\d{4})$").expect("valid regex"));
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})$").expect("valid regex"));

/// Classify a label without converting it.
pub fn detect_format(label: &str) -> Option<DateFormat> {
    let s = label.trim();
    if CN_QUARTER.is_match(s) {
        Some(DateFormat::ChineseQuarter)
    } else if CN_MONTH.is_match(s) {
        Some(DateFormat::ChineseMonth)
    } else if STANDARD.is_match(s) {
        Some(DateFormat::Standard)
    } else if SLASH.is_match(s) {
        Some(DateFormat::Slash)
    } else if YEAR_MONTH.is_match(s) {
        Some(DateFormat::YearMonth)
    } else if QUARTER_CODE.is_match(s) {
        Some(DateFormat::QuarterCode)
    } else if ANNUAL_CODE.is_match(s) {
        Some(DateFormat::AnnualCode)
    } else if YEAR.is_match(s) {
        Some(DateFormat::Year)
    } else {
        None
    }
}

/// Convert a period label to its canonical date.
pub fn parse_period_label(label: &str) -> Result<NaiveDate, DateFormatError> {
    let s = label.trim();
    let format = detect_format(s).ok_or_else(|| DateFormatError::Unrecognized {
        input: label.to_string(),
    })?;
    let out_of_range = || DateFormatError::OutOfRange {
        input: label.to_string(),
    };

    let date = match format {
        DateFormat::ChineseQuarter => {
            let caps = CN_QUARTER.captures(s).ok_or_else(out_of_range)?;
            let year = cap_num::<i32>(&caps, 1).ok_or_else(out_of_range)?;
            let first = cap_num::<u32>(&caps, 2).ok_or_else(out_of_range)?;
            let last = cap_num::<u32>(&caps, 3).unwrap_or(first);
            if !(1..=4).contains(&first) || !(first..=4).contains(&last) {
                return Err(out_of_range());
            }
            quarter_end(year, last)
        }
        DateFormat::ChineseMonth => {
            let caps = CN_MONTH.captures(s).ok_or_else(out_of_range)?;
            ymd(cap_num(&caps, 1), cap_num(&caps, 2), Some(1))
        }
        DateFormat::Standard => {
            let caps = STANDARD.captures(s).ok_or_else(out_of_range)?;
            ymd(cap_num(&caps, 1), cap_num(&caps, 2), cap_num(&caps, 3))
        }
        DateFormat::Slash => {
            let caps = SLASH.captures(s).ok_or_else(out_of_range)?;
            ymd(cap_num(&caps, 1), cap_num(&caps, 2), cap_num(&caps, 3))
        }
        DateFormat::YearMonth => {
            let caps = YEAR_MONTH.captures(s).ok_or_else(out_of_range)?;
            ymd(cap_num(&caps, 1), cap_num(&caps, 2), Some(1))
        }
        DateFormat::QuarterCode => {
            let caps = QUARTER_CODE.captures(s).ok_or_else(out_of_range)?;
            let year = cap_num::<i32>(&caps, 1).ok_or_else(out_of_range)?;
            let q = cap_num::<u32>(&caps, 2).ok_or_else(out_of_range)?;
            if !(1..=4).contains(&q) {
                return Err(out_of_range());
            }
            quarter_end(year, q)
        }
        DateFormat::AnnualCode => {
            let caps = ANNUAL_CODE.captures(s).ok_or_else(out_of_range)?;
            ymd(cap_num(&caps, 1), Some(12), Some(31))
        }
        DateFormat::Year => ymd(s.parse().ok(), Some(12), Some(31)),
    };

    date.ok_or_else(out_of_range)
}

/// Canonical string form used in every normalized file.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Last calendar day of quarter `q` (1-4).
pub fn quarter_end(year: i32, q: u32) -> Option<NaiveDate> {
    match q {
        1 => NaiveDate::from_ymd_opt(year, 3, 31),
        2 => NaiveDate::from_ymd_opt(year, 6, 30),
        3 => NaiveDate::from_ymd_opt(year, 9, 30),
        4 => NaiveDate::from_ymd_opt(year, 12, 31),
        _ => None,
    }
}

fn ymd(year: Option<i32>, month: Option<u32>, day: Option<u32>) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year?, month?, day?)
}

fn cap_num<T: std::str::FromStr>(caps: &regex::Captures<'_>, idx: usize) -> Option<T> {
    caps.get(idx)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn recognizes_every_label_family() {
        assert_eq!(parse_period_label("2020年3月份").unwrap(), d(2020, 3, 1));
        assert_eq!(parse_period_label("2020年11月").unwrap(), d(2020, 11, 1));
        assert_eq!(parse_period_label("2020年第2季度").unwrap(), d(2020, 6, 30));
        assert_eq!(parse_period_label("2020年第1-3季度").unwrap(), d(2020, 9, 30));
        assert_eq!(parse_period_label("A0501_sj.2019").unwrap(), d(2019, 12, 31));
        assert_eq!(parse_period_label("2021-02-28").unwrap(), d(2021, 2, 28));
        assert_eq!(parse_period_label("2021-02-28 00:00:00").unwrap(), d(2021, 2, 28));
        assert_eq!(parse_period_label("2021/2/3").unwrap(), d(2021, 2, 3));
        assert_eq!(parse_period_label("2021-07").unwrap(), d(2021, 7, 1));
        assert_eq!(parse_period_label("2021Q4").unwrap(), d(2021, 12, 31));
        assert_eq!(parse_period_label("2021-q1").unwrap(), d(2021, 3, 31));
        assert_eq!(parse_period_label("1999").unwrap(), d(1999, 12, 31));
    }

    #[test]
    fn unrecognized_label_names_the_input() {
        let err = parse_period_label("last spring").unwrap_err();
        assert_eq!(
            err,
            DateFormatError::Unrecognized {
                input: "last spring".to_string()
            }
        );
        assert!(err.to_string().contains("last spring"));
    }

    #[test]
    fn impossible_periods_are_out_of_range() {
        assert!(matches!(
            parse_period_label("2020年第5季度"),
            Err(DateFormatError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_period_label("2020年13月份"),
            Err(DateFormatError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_period_label("2021-02-30"),
            Err(DateFormatError::OutOfRange { .. })
        ));
    }

    #[test]
    fn every_pattern_compiles() {
        for re in [
            &CN_QUARTER, &CN_MONTH, &STANDARD, &SLASH, &YEAR_MONTH, &QUARTER_CODE, &ANNUAL_CODE, &YEAR,
        ] {
            assert!(!LazyLock::force(re).as_str().is_empty());
        }
    }

    #[test]
    fn detect_format_prefers_quarter_over_month() {
        assert_eq!(detect_format("2020年第1季度"), Some(DateFormat::ChineseQuarter));
        assert_eq!(detect_format("2020年1月份"), Some(DateFormat::ChineseMonth));
        assert_eq!(detect_format("hello"), None);
    }

    proptest! {
        #[test]
        fn quarter_labels_map_to_quarter_end(year in 1950i32..2100, q in 1u32..=4) {
            let date = parse_period_label(&format!("{year}年第{q}季度")).unwrap();
            prop_assert_eq!(date.year(), year);
            prop_assert_eq!(date.month(), q * 3);
            // Next day starts a new month.
            prop_assert_eq!(date.succ_opt().unwrap().day(), 1);
        }

        #[test]
        fn month_labels_map_to_month_start(year in 1950i32..2100, m in 1u32..=12) {
            let date = parse_period_label(&format!("{year}年{m}月份")).unwrap();
            prop_assert_eq!((date.year(), date.month(), date.day()), (year, m, 1));
        }

        #[test]
        fn annual_codes_map_to_year_end(prefix in "[A-Za-z0-9_]{1,12}", year in 1950i32..2100) {
            let date = parse_period_label(&format!("{prefix}.{year}")).unwrap();
            prop_assert_eq!((date.year(), date.month(), date.day()), (year, 12, 31));
        }
    }
}
