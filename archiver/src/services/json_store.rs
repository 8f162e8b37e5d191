//! JSON file backed record store
//!
//! A base is one JSON document holding named tables of records. Every write
//! rewrites the whole document through a temporary file in the same
//! directory, then renames it over the original, so a crash mid-write never
//! leaves a truncated base behind.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use shared::{FieldMap, Record, RecordId, StoreError};

use crate::error::{EngineError, EngineResult};
use crate::traits::{DEFAULT_MAX_BATCH_SIZE, DeleteOutcome, RecordStore};

/// On-disk document: base name plus tables in record creation order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonBase {
    pub name: String,
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<Record>>,
}

impl JsonBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: BTreeMap::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>, records: Vec<Record>) -> Self {
        self.tables.insert(table.into(), records);
        self
    }

    pub async fn load(path: &Path) -> EngineResult<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Atomically replace the file at `path` with this base
    pub async fn save(&self, path: &Path) -> EngineResult<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| EngineError::IoError(std::io::Error::other(e)))??;
        Ok(())
    }

    /// Record count of every table, in table name order
    pub fn table_counts(&self) -> Vec<(String, usize)> {
        self.tables
            .iter()
            .map(|(name, records)| (name.clone(), records.len()))
            .collect()
    }
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> EngineResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Access to one base file shared by every store opened from it
///
/// Stores opened from the same handle serialize their read-modify-write
/// cycles on one lock, so a source and an archive table in the same file
/// never overwrite each other's changes.
#[derive(Debug, Clone)]
pub struct JsonBaseHandle {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl JsonBaseHandle {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> EngineResult<JsonBase> {
        let _guard = self.lock.lock().await;
        JsonBase::load(&self.path).await
    }

    pub fn table(&self, table: impl Into<String>) -> JsonFileStore {
        JsonFileStore {
            base: self.clone(),
            table: table.into(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

/// One table of a JSON base
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    base: JsonBaseHandle,
    table: String,
    max_batch_size: usize,
}

impl JsonFileStore {
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    fn missing_table(&self) -> StoreError {
        StoreError::unavailable(format!(
            "table '{}' not found in {}",
            self.table,
            self.base.path.display()
        ))
    }
}

fn unavailable(error: EngineError) -> StoreError {
    StoreError::unavailable(error.to_string())
}

#[async_trait]
impl RecordStore for JsonFileStore {
    fn table_name(&self) -> String {
        self.table.clone()
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn create_record(&self, fields: FieldMap) -> Result<RecordId, StoreError> {
        let _guard = self.base.lock.lock().await;
        let mut base = JsonBase::load(&self.base.path).await.map_err(unavailable)?;

        let records = base.tables.get_mut(&self.table).ok_or_else(|| StoreError::create_failed(self.table.clone(), "table does not exist"))?;
        let id = RecordId::generate();
        records.push(Record::new(id.clone(), fields).with_created_at(Utc::now()));

        base.save(&self.base.path).await.map_err(unavailable)?;
        Ok(id)
    }

    async fn delete_records(&self, ids: &[RecordId]) -> Result<Vec<DeleteOutcome>, StoreError> {
        if ids.len() > self.max_batch_size {
            return Err(StoreError::BatchTooLarge {
                size: ids.len(),
                max: self.max_batch_size,
            });
        }

        let _guard = self.base.lock.lock().await;
        let mut base = JsonBase::load(&self.base.path).await.map_err(unavailable)?;
        let records = base.tables.get_mut(&self.table).ok_or_else(|| self.missing_table())?;

        let outcomes: Vec<DeleteOutcome> = ids
            .iter()
            .map(|id| match records.iter().position(|record| &record.id == id) {
                Some(index) => {
                    records.remove(index);
                    (id.clone(), Ok(()))
                }
                None => (id.clone(), Err(StoreError::NotFound { record_id: id.clone() })),
            })
            .collect();

        // A failed save leaves the file untouched, so nothing was deleted
        base.save(&self.base.path).await.map_err(unavailable)?;
        Ok(outcomes)
    }

    async fn list_records(&self) -> Result<Vec<Record>, StoreError> {
        let base = self.base.load().await.map_err(unavailable)?;
        base.tables
            .get(&self.table)
            .cloned()
            .ok_or_else(|| self.missing_table())
    }
}
