//! In-memory record store
//!
//! Backs tests and dry runs. Clones share the same table, so a test can keep
//! a handle for assertions after moving the store into an orchestrator.
//! Failures can be injected per title, per id, or for the whole store.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use shared::{FieldKey, FieldMap, Record, RecordId, StoreError};

use crate::traits::{DEFAULT_MAX_BATCH_SIZE, DeleteOutcome, RecordStore};

#[derive(Debug, Default)]
struct TableState {
    records: Vec<Record>,
    fail_titles: HashSet<String>,
    fail_deletes: HashSet<RecordId>,
    unavailable: bool,
    create_calls: usize,
    delete_batches: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    name: String,
    max_batch_size: usize,
    inner: Arc<RwLock<TableState>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_records(name, Vec::new())
    }

    /// Create a table already holding `records`, in listing order
    pub fn with_records(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            inner: Arc::new(RwLock::new(TableState {
                records,
                ..TableState::default()
            })),
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Append records as if they had been created in this order
    pub async fn seed(&self, records: impl IntoIterator<Item = Record>) {
        self.inner.write().await.records.extend(records);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn records(&self) -> Vec<Record> {
        self.inner.read().await.records.clone()
    }

    pub async fn contains(&self, id: &RecordId) -> bool {
        self.inner.read().await.records.iter().any(|record| &record.id == id)
    }

    /// Fail every create whose `Title` equals `title`
    pub async fn fail_on_title(&self, title: impl Into<String>) {
        self.inner.write().await.fail_titles.insert(title.into());
    }

    /// Report a per-id failure when `id` is deleted
    pub async fn fail_delete_for(&self, id: RecordId) {
        self.inner.write().await.fail_deletes.insert(id);
    }

    /// Fail every call as if the backend were down
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().await.unavailable = unavailable;
    }

    /// Drop every injected failure
    pub async fn clear_failures(&self) {
        let mut state = self.inner.write().await;
        state.fail_titles.clear();
        state.fail_deletes.clear();
        state.unavailable = false;
    }

    /// Number of `create_record` calls, failed ones included
    pub async fn create_calls(&self) -> usize {
        self.inner.read().await.create_calls
    }

    /// Size of every `delete_records` call, in call order
    pub async fn delete_batches(&self) -> Vec<usize> {
        self.inner.read().await.delete_batches.clone()
    }

    fn check_available(&self, state: &TableState) -> Result<(), StoreError> {
        if state.unavailable {
            return Err(StoreError::unavailable(format!("table '{}' is offline", self.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn table_name(&self) -> String {
        self.name.clone()
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn create_record(&self, fields: FieldMap) -> Result<RecordId, StoreError> {
        let mut state = self.inner.write().await;
        state.create_calls += 1;
        self.check_available(&state)?;

        let title = fields.get(FieldKey::Title.name()).and_then(|value| value.as_str());
        if title.is_some_and(|title| state.fail_titles.contains(title)) {
            return Err(StoreError::create_failed(self.name.clone(), "rejected by store"));
        }

        let id = RecordId::generate();
        state
            .records
            .push(Record::new(id.clone(), fields).with_created_at(Utc::now()));
        Ok(id)
    }

    async fn delete_records(&self, ids: &[RecordId]) -> Result<Vec<DeleteOutcome>, StoreError> {
        let mut state = self.inner.write().await;
        self.check_available(&state)?;
        if ids.len() > self.max_batch_size {
            return Err(StoreError::BatchTooLarge {
                size: ids.len(),
                max: self.max_batch_size,
            });
        }
        state.delete_batches.push(ids.len());

        let outcomes = ids
            .iter()
            .map(|id| {
                if state.fail_deletes.contains(id) {
                    let err = StoreError::DeleteFailed {
                        record_id: id.clone(),
                        message: "record is locked".to_string(),
                    };
                    return (id.clone(), Err(err));
                }
                match state.records.iter().position(|record| &record.id == id) {
                    Some(index) => {
                        state.records.remove(index);
                        (id.clone(), Ok(()))
                    }
                    None => (id.clone(), Err(StoreError::NotFound { record_id: id.clone() })),
                }
            })
            .collect();
        Ok(outcomes)
    }

    async fn list_records(&self) -> Result<Vec<Record>, StoreError> {
        let state = self.inner.read().await;
        self.check_available(&state)?;
        Ok(state.records.clone())
    }
}
