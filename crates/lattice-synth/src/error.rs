//! Synthesizer error types.

use thiserror::Error;

/// Result type alias for rendering operations.
pub type SynthResult<T> = Result<T, SynthError>;

/// Structural failures that abort a render. No partial text is ever
/// returned alongside one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthError {
    #[error("resource {resource}: host {host} has volumes but no resolvable address")]
    MissingAddress { resource: String, host: String },

    #[error("resource {resource}: required parameter {param} has no value")]
    MissingRequired { resource: String, param: String },

    #[error("constraint {edge} references a resource missing from the graph")]
    UnknownEndpoint { edge: String },

    #[error("constraint {edge} has conflicting infinite scores")]
    ConflictingScore { edge: String },

    #[error("no free replication port between {base} and {max}")]
    PortsExhausted { base: u16, max: u16 },
}
