//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - series and dataset types (`Series`, `Observation`, `UnifiedDataset`)
//! - configuration (`PipelineConfig`, `FetchConfig`, `DateRange`)
//! - month arithmetic helpers shared by the frequency and format stages

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
