use thiserror::Error;

#[derive(Debug, Error)]
pub enum DryRunError {
    #[error("evaluation failed: {0:#}")]
    Evaluation(#[from] anyhow::Error),
}

pub type DryRunResult<T> = Result<T, DryRunError>;
