//! Test helpers and builder patterns for orchestrator tests
//!
//! The builder wires in-memory stores and a channel reporter so tests can
//! assert on store contents and on the exact event sequence of a run.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc};

use archiver::services::{ChannelReporter, MemoryStore, ProgressEvent};
use archiver::traits::DeleteOutcome;
use archiver::{MigrationOrchestrator, RecordStore};
use shared::{FieldKey, FieldMap, MigrationState, Record, RecordId, StoreError};

use super::fixtures::TestFixtures;

pub type MemoryOrchestrator = MigrationOrchestrator<MemoryStore, MemoryStore, ChannelReporter>;

/// Orchestrator plus handles on everything it was built with
pub struct TestHarness {
    pub orchestrator: MemoryOrchestrator,
    pub source: MemoryStore,
    pub archive: MemoryStore,
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl TestHarness {
    /// Every event emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// State changes among `events`, in order
    pub fn states(events: &[ProgressEvent]) -> Vec<MigrationState> {
        events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::StateChanged(state) => Some(*state),
                ProgressEvent::Progress { .. } => None,
            })
            .collect()
    }

    /// Cumulative progress counts among `events`, in order
    pub fn progress(events: &[ProgressEvent]) -> Vec<(usize, usize)> {
        events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Progress { processed, total } => Some((*processed, *total)),
                ProgressEvent::StateChanged(_) => None,
            })
            .collect()
    }
}

/// Builder pattern for creating test orchestrators with sensible defaults
pub struct OrchestratorBuilder {
    source_records: Vec<Record>,
    archive_records: Vec<Record>,
    batch_size: usize,
    source_max_batch: Option<usize>,
    archive_fields: Option<Vec<FieldKey>>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            source_records: Vec::new(),
            archive_records: Vec::new(),
            batch_size: TestFixtures::DEFAULT_BATCH_SIZE,
            source_max_batch: None,
            archive_fields: None,
        }
    }

    pub fn with_source(mut self, records: Vec<Record>) -> Self {
        self.source_records = records;
        self
    }

    pub fn with_archive(mut self, records: Vec<Record>) -> Self {
        self.archive_records = records;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Limit the source store's delete batch capability
    pub fn with_source_max_batch(mut self, max: usize) -> Self {
        self.source_max_batch = Some(max);
        self
    }

    pub fn with_archive_fields(mut self, fields: Vec<FieldKey>) -> Self {
        self.archive_fields = Some(fields);
        self
    }

    pub fn build(self) -> TestHarness {
        let mut source = MemoryStore::with_records(TestFixtures::SOURCE_TABLE, self.source_records);
        if let Some(max) = self.source_max_batch {
            source = source.with_max_batch_size(max);
        }
        let archive = MemoryStore::with_records(TestFixtures::ARCHIVE_TABLE, self.archive_records);
        let (reporter, events) = ChannelReporter::new();

        let mut orchestrator =
            MigrationOrchestrator::new(source.clone(), archive.clone(), reporter).with_batch_size(self.batch_size);
        if let Some(fields) = self.archive_fields {
            orchestrator = orchestrator.with_archive_fields(fields);
        }

        TestHarness {
            orchestrator,
            source,
            archive,
            events,
        }
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Store whose calls wait until the test opens the gate
#[derive(Clone)]
pub struct GatedStore {
    pub inner: MemoryStore,
    gate: Arc<Semaphore>,
}

impl GatedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Let every pending and future call through
    pub fn open(&self) {
        self.gate.add_permits(1_000_000);
    }

    async fn pass(&self) -> Result<(), StoreError> {
        self.gate
            .acquire()
            .await
            .map(drop)
            .map_err(|_| StoreError::unavailable("gate closed"))
    }
}

#[async_trait]
impl RecordStore for GatedStore {
    fn table_name(&self) -> String {
        self.inner.table_name()
    }

    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size()
    }

    async fn create_record(&self, fields: FieldMap) -> Result<RecordId, StoreError> {
        self.pass().await?;
        self.inner.create_record(fields).await
    }

    async fn delete_records(&self, ids: &[RecordId]) -> Result<Vec<DeleteOutcome>, StoreError> {
        self.pass().await?;
        self.inner.delete_records(ids).await
    }

    async fn list_records(&self) -> Result<Vec<Record>, StoreError> {
        self.pass().await?;
        self.inner.list_records().await
    }
}

/// Assertions shared by the suites
pub struct TestHelpers;

impl TestHelpers {
    /// Store-level conservation after a run over `seeded` source records
    pub async fn assert_conserved(harness: &TestHarness, seeded: usize, archived_before: usize) {
        let report = harness.orchestrator.last_report().expect("a finished run");
        assert_eq!(harness.archive.len().await, archived_before + report.archived_count());
        assert_eq!(harness.source.len().await, seeded - report.deleted_count());
    }

    /// Every id that reached the delete phase was archived first, by this
    /// run or by the run it resumed
    pub fn assert_deletes_follow_copies(harness: &TestHarness) {
        let report = harness.orchestrator.last_report().expect("a finished run");
        let (Some(copy), Some(delete)) = (&report.copy, &report.delete) else {
            return;
        };
        let mut archived = copy.succeeded_set();
        archived.extend(report.carried_over.iter());
        for id in delete.succeeded.iter().chain(delete.failed.keys()) {
            assert!(archived.contains(id), "{id} was deleted without an archive copy");
        }
    }
}
