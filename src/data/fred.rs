//! FRED observations API.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use super::{FetchError, SeriesSource};
use crate::domain::{DateRange, FetchConfig};
use crate::error::AppError;

pub const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

const API_KEY_VAR: &str = "FRED_API_KEY";

pub struct FredSource {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FredSource {
    /// Build a client from `FRED_API_KEY` (environment or `.env`).
    pub fn from_env(config: &FetchConfig) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var(API_KEY_VAR)
            .map_err(|_| AppError::new(4, format!("Missing {API_KEY_VAR} in environment (.env).")))?;
        Self::new(api_key, config)
    }

    pub fn new(api_key: impl Into<String>, config: &FetchConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("macro-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: config.base_url.clone(),
        })
    }
}

impl SeriesSource for FredSource {
    fn fetch(
        &self,
        series_id: &str,
        range: DateRange,
    ) -> Result<Vec<(NaiveDate, Option<f64>)>, FetchError> {
        let mut req = self.client.get(&self.base_url).query(&[
            ("series_id", series_id),
            ("api_key", self.api_key.as_str()),
            ("file_type", "json"),
        ]);
        if let Some(start) = range.start {
            req = req.query(&[("observation_start", start.to_string())]);
        }
        if let Some(end) = range.end {
            req = req.query(&[("observation_end", end.to_string())]);
        }

        let resp = req.send().map_err(|e| FetchError::Network {
            series_id: series_id.to_string(),
            transient: e.is_connect() || e.is_timeout(),
            message: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                series_id: series_id.to_string(),
                status: status.as_u16(),
            });
        }

        let body: ObservationsResponse = resp.json().map_err(|e| FetchError::Parse {
            series_id: series_id.to_string(),
            message: e.to_string(),
        })?;
        debug!(series_id, observations = body.observations.len(), "FRED response");
        parse_observations(series_id, body)
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

fn parse_observations(
    series_id: &str,
    body: ObservationsResponse,
) -> Result<Vec<(NaiveDate, Option<f64>)>, FetchError> {
    let mut out = Vec::with_capacity(body.observations.len());
    for obs in body.observations {
        let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").map_err(|e| {
            FetchError::Parse {
                series_id: series_id.to_string(),
                message: format!("invalid date '{}': {e}", obs.date),
            }
        })?;
        out.push((date, parse_value(&obs.value)));
    }
    if out.is_empty() {
        return Err(FetchError::Empty {
            series_id: series_id.to_string(),
        });
    }
    Ok(out)
}

/// FRED marks missing observations with `.`.
fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed == "." || trimmed.is_empty() {
        return None;
    }
    let v = trimmed.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
