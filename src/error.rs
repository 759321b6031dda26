//! Error types for Ratekeeper.

use thiserror::Error;

/// Main error type for Ratekeeper operations.
#[derive(Error, Debug)]
pub enum RatekeeperError {
    /// A limiter was constructed with a zero window or request budget
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed request trace input
    #[error("Trace error on line {line}: {message}")]
    Trace {
        /// 1-based line number in the trace
        line: usize,
        /// What was wrong with the line
        message: String,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for RatekeeperError {
    fn from(err: config::ConfigError) -> Self {
        RatekeeperError::Config(err.to_string())
    }
}

/// Result type alias for Ratekeeper operations.
pub type Result<T> = std::result::Result<T, RatekeeperError>;
