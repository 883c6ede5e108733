//! Error types shared by the lattice crates.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by core value parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid score format: {0:?}")]
    InvalidScoreFormat(String),

    #[error("invalid parameter pattern for {name}: {reason}")]
    InvalidPattern { name: String, reason: String },
}
