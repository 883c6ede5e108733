//! Error types for graph mutation.

use lattice_core::{PairKey, ResourceKey};
use thiserror::Error;

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur while mutating the resource graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("resource name already in use: {0}")]
    DuplicateName(String),

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("edge {edge} references missing resource {endpoint}")]
    DanglingEdge { edge: String, endpoint: ResourceKey },

    #[error("edge {edge} does not belong to connection {pair}")]
    EndpointMismatch { edge: String, pair: PairKey },
}
