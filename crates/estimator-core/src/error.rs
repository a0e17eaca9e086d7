//! Error taxonomy for the estimation core
//!
//! Every error carries a human-readable description and a stable,
//! machine-readable kind that the HTTP layer serializes alongside it.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the model lifecycle manager and estimation engine
#[derive(Debug, Error)]
pub enum EstimatorError {
    /// Artifact or data file missing at the expected path. Non-fatal at
    /// startup: the service degrades instead of refusing to start.
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    /// Artifact bytes failed to deserialize or validate. Fatal to the
    /// load attempt; during replace it triggers backup restoration.
    #[error("corrupt model artifact: {0}")]
    CorruptArtifact(String),

    /// Predict called while no artifact is active.
    #[error("no model is currently loaded")]
    ModelNotLoaded,

    /// Supplied feature columns do not match the model's inputs.
    #[error("feature columns do not match model inputs: {0}")]
    ColumnMismatch(String),

    /// Analogous estimation requested with no usable historical data and
    /// no fallback configured.
    #[error("historical dataset not available for analogous estimation: {0}")]
    HistoricalDataUnavailable(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl EstimatorError {
    /// Stable kind string for API responses and logs
    pub fn kind(&self) -> &'static str {
        match self {
            EstimatorError::NotFound { .. } => "not_found",
            EstimatorError::CorruptArtifact(_) => "corrupt_artifact",
            EstimatorError::ModelNotLoaded => "model_not_loaded",
            EstimatorError::ColumnMismatch(_) => "column_mismatch",
            EstimatorError::HistoricalDataUnavailable(_) => "historical_data_unavailable",
            EstimatorError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, EstimatorError>;
