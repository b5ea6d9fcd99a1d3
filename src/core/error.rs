use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CovError>;

/// Failure taxonomy for the whole run. `Usage` and `Config` are reported at the CLI
/// boundary with exit code 1; everything else aborts the pipeline.
#[derive(Debug, Error)]
pub enum CovError {
    #[error("{0}")]
    Usage(String),

    #[error("input mismatch: {0}")]
    InputMismatch(String),

    #[error("alignment provider failure: {0}")]
    Provider(#[from] rust_htslib::errors::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to write tabular output: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}
