//! Pipeline configuration.
//!
//! A single `PipelineConfig` is built once per invocation (defaults, then an
//! optional TOML file, then CLI flags) and passed by reference to every stage.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::{InterpolationMethod, month_start};
use crate::error::AppError;

/// Inclusive calendar bounds applied by the frequency and format stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Bounds snapped to month starts (for the monthly axis).
    pub fn month_bounds(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        (self.start.map(month_start), self.end.map(month_start))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Extra attempts after the first failed request.
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    /// Pause between consecutive indicator requests.
    pub request_interval_secs: u64,
    pub base_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_secs: 2,
            request_interval_secs: 1,
            base_url: crate::data::fred::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(self.request_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DtaConfig {
    /// Dataset label written into every `.dta` header (ASCII, max 80 bytes).
    pub label: String,
}

impl Default for DtaConfig {
    fn default() -> Self {
        Self {
            label: "macro-pipeline monthly dataset".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub interpolation: InterpolationMethod,
    pub log_file: Option<PathBuf>,
    pub fetch: FetchConfig,
    pub dta: DtaConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            start: None,
            end: None,
            interpolation: InterpolationMethod::Linear,
            log_file: None,
            fetch: FetchConfig::default(),
            dta: DtaConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a TOML config file; missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::input(format!("Failed to read config '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
            .map_err(|e| AppError::input(format!("Invalid config '{}': {e}", path.display())))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start,
            end: self.end,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(AppError::input(format!(
                    "Invalid date range: start {start} is after end {end}."
                )));
            }
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::input("`fetch.timeout_secs` must be > 0."));
        }
        if !self.dta.label.is_ascii() {
            return Err(AppError::input("`dta.label` must be ASCII."));
        }
        Ok(())
    }

    pub fn data_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }
}
