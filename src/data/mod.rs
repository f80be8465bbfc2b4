//! Raw data acquisition (the `fetch` stage).

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::DateRange;

pub mod catalog;
pub mod fetcher;
pub mod fred;

pub use catalog::{Category, INDICATORS, Indicator, indicators_for};
pub use fetcher::{DataFetcher, FetchReport, RAW_SUFFIX};
pub use fred::FredSource;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{series_id}: request failed: {message}")]
    Network {
        series_id: String,
        message: String,
        /// Connect and timeout errors are worth retrying.
        transient: bool,
    },

    #[error("{series_id}: HTTP {status}")]
    Status { series_id: String, status: u16 },

    #[error("{series_id}: unreadable response: {message}")]
    Parse { series_id: String, message: String },

    #[error("{series_id}: no observations returned")]
    Empty { series_id: String },
}

impl FetchError {
    /// Connect/timeout failures, HTTP 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network { transient, .. } => *transient,
            FetchError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            FetchError::Parse { .. } | FetchError::Empty { .. } => false,
        }
    }
}

/// A provider of dated observations keyed by series id.
pub trait SeriesSource {
    fn fetch(
        &self,
        series_id: &str,
        range: DateRange,
    ) -> Result<Vec<(NaiveDate, Option<f64>)>, FetchError>;
}
