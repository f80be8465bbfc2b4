//! Input/output helpers.
//!
//! - delimited-text ingest and output (`table`)
//! - data-directory discovery (`discover`)

pub mod discover;
pub mod table;

pub use discover::*;
pub use table::*;
