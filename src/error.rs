//! Error types for the obb-eval library.

use thiserror::Error;

/// Result type for obb-eval operations.
pub type Result<T> = std::result::Result<T, ObbEvalError>;

/// Error types that can occur while loading data or computing metrics.
#[derive(Error, Debug)]
pub enum ObbEvalError {
    /// Error during JSON parsing or serialization.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error during I/O operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed annotation or proposal data (box arity, dangling ids, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Mutually exclusive arguments supplied together, or none supplied.
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// Unknown annotation set, unsupported AP mode or unusable thresholds.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
