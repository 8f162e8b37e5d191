//! Shared error types for the record archiving engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RecordId;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid record id: '{input}'")]
    InvalidRecordId { input: String },

    #[error("Invalid UUID: {input}")]
    InvalidUuid { input: String },

    #[error("Invalid field name: '{input}'")]
    InvalidFieldName { input: String },

    #[error("Deserialization failed: {message}")]
    DeserializationError { message: String },
}

pub type SharedResult<T> = Result<T, SharedError>;

/// Failure of a single create/delete/list call against a record store.
///
/// Item-level failures are captured per record id by the batch executor and
/// never abort a run on their own.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreError {
    #[error("Record not found: {record_id}")]
    NotFound { record_id: RecordId },

    #[error("Create failed in table '{table}'{}: {message}", record_suffix(.record_id))]
    CreateFailed {
        table: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        record_id: Option<RecordId>,
    },

    #[error("Delete failed for {record_id}: {message}")]
    DeleteFailed { record_id: RecordId, message: String },

    #[error("Store unavailable{}: {message}", record_suffix(.record_id))]
    Unavailable {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        record_id: Option<RecordId>,
    },

    #[error("Batch of {size} records exceeds store limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Skipped {record_id}: run cancelled before its batch started")]
    Cancelled { record_id: RecordId },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
            record_id: None,
        }
    }

    pub fn create_failed(table: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::CreateFailed {
            table: table.into(),
            message: message.into(),
            record_id: None,
        }
    }

    /// Record id carried by the error, when the failure is tied to one record
    pub fn record_id(&self) -> Option<&RecordId> {
        match self {
            StoreError::NotFound { record_id }
            | StoreError::DeleteFailed { record_id, .. }
            | StoreError::Cancelled { record_id } => Some(record_id),
            StoreError::CreateFailed { record_id, .. } | StoreError::Unavailable { record_id, .. } => {
                record_id.as_ref()
            }
            StoreError::BatchTooLarge { .. } => None,
        }
    }

    /// Attach the id of the record whose operation failed
    ///
    /// Stores creating a record cannot know which source record it came from,
    /// so the batch executor tags per-item failures once the outcome is keyed.
    /// An id already carried by the error is kept.
    pub fn for_record(mut self, id: &RecordId) -> Self {
        if let StoreError::CreateFailed { record_id, .. } | StoreError::Unavailable { record_id, .. } = &mut self {
            record_id.get_or_insert_with(|| id.clone());
        }
        self
    }

    /// True when the store never saw the request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StoreError::Cancelled { .. })
    }
}

fn record_suffix(record_id: &Option<RecordId>) -> String {
    record_id.as_ref().map(|id| format!(" for {id}")).unwrap_or_default()
}
