//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while setting up logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log level, format, or a directive is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A global subscriber could not be installed (usually: one already is).
    #[error("Initialization error: {0}")]
    Init(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
