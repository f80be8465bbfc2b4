//! Numerical utilities.

pub mod spline;

pub use spline::*;
