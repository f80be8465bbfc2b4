//! `macro-pipeline` library crate.
//!
//! The binary (`mp`) is a thin wrapper around this library so that:
//!
//! - every stage is testable without spawning processes
//! - stages can be driven from other tools (notebooks, schedulers)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod dates;
pub mod domain;
pub mod dta;
pub mod error;
pub mod freq;
pub mod io;
pub mod logging;
pub mod math;
pub mod report;
