use std::path::PathBuf;

use indicatif::style::TemplateError;
use thiserror::Error;

pub type RebalancerResult<T> = Result<T, RebalancerError>;

#[derive(Debug, Error)]
pub enum RebalancerError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    System(#[from] SystemError),
}

/// Errors occurring within agent logic, the Q-network or the replay memory.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid input to agent: {0}")]
    InvalidInput(String),

    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Replay memory is empty, nothing to sample")]
    EmptyReplayMemory,

    #[error("Invalid agent configuration: {0}")]
    InvalidConfig(String),
}

/// Errors related to loading and validating the valuation table.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Data frame error: {0}")]
    DataFrame(String),

    #[error("Valuation table too small: {rows} rows x {cols} columns (need at least 2 x 2)")]
    TooSmall { rows: usize, cols: usize },

    #[error("Invalid valuation at row {row}, column {col}: {value}")]
    InvalidValuation { row: usize, col: usize, value: f64 },

    #[error("Missing valuation at row {row}, column '{column}'")]
    MissingValuation { row: usize, column: String },

    #[error("Invalid train fraction {0}: must lie strictly between 0 and 1")]
    InvalidSplit(f64),
}

/// Errors related to the Gym environment configuration and execution loop.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Invalid environment state: {0}")]
    InvalidState(String),

    #[error("Invalid action index {action}: action space has {size} actions")]
    InvalidAction { action: usize, size: usize },

    #[error("Invalid environment configuration: {0}")]
    InvalidConfig(String),

    #[error("Progress bar error")]
    ProgressBar(#[from] TemplateError),
}

/// Errors related to file I/O and serialization of artifacts and reports.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO operation failed")]
    Io(#[from] std::io::Error),

    #[error("Serialization failed")]
    Json(#[from] serde_json::Error),

    #[error("Failed to encode or decode binary artifact")]
    Postcard(#[from] postcard::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Missing artifact at {}: run in train mode first", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Failed to write data: {0}")]
    WriteFailed(String),

    #[error("Failed to read data: {0}")]
    ReadFailed(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// Errors related to internal invariants.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}
