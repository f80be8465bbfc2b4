//! Tracing subscriber setup.
//!
//! Console output goes to stderr so stdout stays clean for stage summaries.
//! `RUST_LOG` overrides the level picked from the command line.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub level: String,
    /// Extra plain-text sink, appended to.
    pub file: Option<PathBuf>,
}

/// `--log-level` wins over `-q`, which wins over `-v`/`-vv`.
pub fn level_from_flags(explicit: Option<&str>, verbose: u8, quiet: bool) -> String {
    if let Some(level) = explicit {
        return level.to_string();
    }
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    level.to_string()
}

pub fn init(opts: &LogOptions) -> Result<(), AppError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&opts.level));

    let file_layer = match &opts.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AppError::input(format!("Failed to open log file '{}': {e}", path.display()))
                })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::input(format!("Failed to initialize logging: {e}")))
}
