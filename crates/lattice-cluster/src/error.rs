use lattice_core::CoreError;
use lattice_dryrun::DryRunError;
use lattice_graph::GraphError;
use lattice_synth::SynthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Synth(#[from] SynthError),

    #[error(transparent)]
    DryRun(#[from] DryRunError),

    #[error("{object} has incorrect fields: {}", fields.join(", "))]
    Incorrect { object: String, fields: Vec<String> },

    #[error("{0} has no changes to commit")]
    NothingToCommit(String),

    #[error("volume resource not found: {0}")]
    UnknownVolume(String),

    #[error("volume resource already exists: {0}")]
    DuplicateVolume(String),
}

pub type ClusterResult<T> = Result<T, ClusterError>;
