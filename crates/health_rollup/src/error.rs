//! Error types for the aggregation core.

use health_source::{SampleError, SourceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RollupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Invalid sample: {0}")]
    Sample(#[from] SampleError),

    #[error("Timed out: {0}")]
    Timeout(&'static str),
}

impl RollupError {
    /// Whether the underlying cause is a missing grant rather than a failure.
    pub fn is_access_problem(&self) -> bool {
        matches!(self, RollupError::Source(e) if e.is_access_problem())
    }
}

/// Result type alias for aggregation operations.
pub type RollupResult<T> = Result<T, RollupError>;
