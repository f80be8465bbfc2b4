//! Application-level error carrying a process exit code.
//!
//! Exit codes:
//! - `2` configuration / input problems (bad config, missing data directory)
//! - `3` a stage produced no series
//! - `4` fetch setup failures (missing API key, HTTP client construction)
//!
//! Per-row and per-file failures never become an `AppError`; stages log and count
//! them, and only conditions that make the whole run meaningless abort.

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Configuration or input problem (exit code 2).
    pub fn input(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }

    /// A stage finished without producing any series (exit code 3).
    pub fn no_series(message: impl Into<String>) -> Self {
        Self::new(3, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_exit_codes() {
        assert_eq!(AppError::input("x").exit_code(), 2);
        assert_eq!(AppError::no_series("x").exit_code(), 3);
        assert_eq!(AppError::new(4, "net").to_string(), "net");
    }
}
