//! Engine error types

use shared::{MigrationState, Phase, RunId, SharedError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("A run is already in progress (state: {state})")]
    AlreadyRunning { state: MigrationState },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Migration {run_id} ended in {state} and has not been resumed")]
    UnresolvedRun { run_id: RunId, state: MigrationState },

    #[error("Partial failure in {phase} phase: {failed} of {total} records failed")]
    PartialFailure { phase: Phase, failed: usize, total: usize },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl EngineError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        EngineError::InvalidArgument { reason: reason.into() }
    }

    pub fn config(field: impl Into<String>) -> Self {
        EngineError::ConfigurationError { field: field.into() }
    }

    /// Caller programming errors, rejected before any store call
    pub fn is_caller_error(&self) -> bool {
        matches!(self, EngineError::InvalidArgument { .. } | EngineError::AlreadyRunning { .. })
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
