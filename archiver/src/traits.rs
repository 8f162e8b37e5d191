//! Trait definitions with mockall annotations for testing
//!
//! The engine never touches a table directly. Stores and progress sinks are
//! injected through these traits, which keeps the orchestrator testable with
//! mockall-generated mocks or the in-memory store.

use shared::{FieldMap, MigrationState, Record, RecordId, StoreError};

/// Per-id outcome of a batch delete call
pub type DeleteOutcome = (RecordId, Result<(), StoreError>);

/// Largest delete batch most table backends accept
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// Table-level record store capability
///
/// Implementations are expected to serialize their own writes. The engine
/// performs no optimistic concurrency control: a record removed by another
/// actor mid-run surfaces as a per-id delete error.
#[mockall::automock]
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Name of the table this store reads and writes
    fn table_name(&self) -> String;

    /// Maximum number of ids accepted by one `delete_records` call
    fn max_batch_size(&self) -> usize;

    /// Create one record holding `fields`
    ///
    /// # Returns
    /// Identifier of the newly created record
    async fn create_record(&self, fields: FieldMap) -> Result<RecordId, StoreError>;

    /// Delete a batch of records
    ///
    /// # Returns
    /// One outcome per requested id. An `Err` means the whole call failed and
    /// no id in the batch can be assumed deleted.
    async fn delete_records(&self, ids: &[RecordId]) -> Result<Vec<DeleteOutcome>, StoreError>;

    /// List every record in the table, oldest first
    async fn list_records(&self) -> Result<Vec<Record>, StoreError>;
}

/// Sink for run progress, owned by the presentation layer
#[mockall::automock]
pub trait ProgressReporter: Send + Sync {
    /// Called after each batch group with cumulative counts for the phase
    fn on_progress(&self, processed: usize, total: usize);

    /// Called on every state machine transition
    fn on_state_change(&self, state: MigrationState);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_trait_instantiation() {
        let mut store = MockRecordStore::new();
        store
            .expect_create_record()
            .returning(|_| Ok(RecordId::new("recNew")));
        store.expect_max_batch_size().return_const(DEFAULT_MAX_BATCH_SIZE);

        let id = store.create_record(FieldMap::new()).await.unwrap();
        assert_eq!(id.as_str(), "recNew");
        assert_eq!(store.max_batch_size(), 50);

        let mut reporter = MockProgressReporter::new();
        reporter.expect_on_progress().times(1).return_const(());
        reporter.on_progress(1, 2);
    }
}
