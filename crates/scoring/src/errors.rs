//! Error types for the scoring crate

use thiserror::Error;

/// Errors that can occur while loading artifacts or scoring records
#[derive(Error, Debug)]
pub enum ScoringError {
    /// Pipeline artifact failed structural validation
    #[error("Pipeline validation failed: {0}")]
    ValidationFailed(String),

    /// Feature vector does not match what the model expects
    #[error("Feature mismatch: {0}")]
    FeatureMismatch(String),

    /// Threshold outside [0, 1] or not finite
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    /// Tabular artifact is malformed
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    /// Model produced a non-finite output
    #[error("Scoring failed: {0}")]
    ScoringFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for scoring operations
pub type Result<T> = std::result::Result<T, ScoringError>;
