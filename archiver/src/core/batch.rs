//! Sequential batch execution against a record store
//!
//! Items are split into contiguous groups of at most `batch_size`. Groups run
//! strictly one after another; the items of one group may be in flight
//! together. A failing item never aborts the job: its error is recorded and
//! the remaining groups still run. Every item ends up in exactly one of
//! `RunResult::succeeded` or `RunResult::failed`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use shared::{Record, RecordId, StoreError};
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, EngineResult};
use crate::traits::{DeleteOutcome, ProgressReporter};

/// Anything the executor can key an outcome by
pub trait BatchItem {
    fn item_id(&self) -> &RecordId;
}

impl BatchItem for Record {
    fn item_id(&self) -> &RecordId {
        &self.id
    }
}

impl BatchItem for RecordId {
    fn item_id(&self) -> &RecordId {
        self
    }
}

/// Accumulated per-item outcomes of one executor job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Ids whose operation succeeded, in item order
    pub succeeded: Vec<RecordId>,
    /// Ids whose operation failed, with the error that failed them
    pub failed: BTreeMap<RecordId, StoreError>,
    /// Size of every group that was executed, in order
    pub group_sizes: Vec<usize>,
}

impl RunResult {
    /// Number of items with a recorded outcome
    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn succeeded_set(&self) -> HashSet<&RecordId> {
        self.succeeded.iter().collect()
    }

    /// Failed ids that were actually attempted against the store
    pub fn attempted_failures(&self) -> impl Iterator<Item = (&RecordId, &StoreError)> {
        self.failed.iter().filter(|(_, err)| !err.is_cancelled())
    }

    fn record(&mut self, id: RecordId, outcome: Result<(), StoreError>) {
        match outcome {
            Ok(()) => self.succeeded.push(id),
            Err(err) => {
                let err = err.for_record(&id);
                self.failed.insert(id, err);
            }
        }
    }
}

/// Reject item sequences that would key two outcomes by the same id
pub fn ensure_unique_ids<T: BatchItem>(items: &[T]) -> EngineResult<()> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.item_id()) {
            return Err(EngineError::invalid(format!(
                "record {} appears more than once in the batch",
                item.item_id()
            )));
        }
    }
    Ok(())
}

/// Runs items through a store operation one group at a time
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    batch_size: usize,
    cancel: Option<CancellationToken>,
}

impl BatchExecutor {
    pub fn new(batch_size: usize) -> EngineResult<Self> {
        if batch_size == 0 {
            return Err(EngineError::invalid("batch size must be greater than zero"));
        }
        Ok(Self {
            batch_size,
            cancel: None,
        })
    }

    /// Check `token` before each group; once cancelled, remaining items are
    /// recorded as `StoreError::Cancelled` without reaching the store
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of groups a job of `item_count` items is split into
    pub fn group_count(&self, item_count: usize) -> usize {
        item_count.div_ceil(self.batch_size)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Run `operation` once per item
    pub async fn run<'a, T, F, Fut, R>(
        &self,
        items: &'a [T],
        mut operation: F,
        reporter: &R,
    ) -> EngineResult<RunResult>
    where
        T: BatchItem,
        F: FnMut(&'a T) -> Fut,
        Fut: Future<Output = Result<(), StoreError>>,
        R: ProgressReporter + ?Sized,
    {
        ensure_unique_ids(items)?;
        let total = items.len();
        let mut result = RunResult::default();
        let mut groups = items.chunks(self.batch_size);

        while let Some(group) = groups.next() {
            if self.is_cancelled() {
                for item in group.iter().chain(groups.by_ref().flatten()) {
                    let id = item.item_id().clone();
                    result.record(id.clone(), Err(StoreError::Cancelled { record_id: id }));
                }
                break;
            }

            let outcomes = join_all(group.iter().map(&mut operation)).await;
            for (item, outcome) in group.iter().zip(outcomes) {
                result.record(item.item_id().clone(), outcome);
            }
            result.group_sizes.push(group.len());
            reporter.on_progress(result.processed(), total);
        }

        Ok(result)
    }

    /// Run `operation` once per group, for stores with a batch capability
    ///
    /// A failed call fails every id of its group. Ids the store leaves out of
    /// its answer are recorded as failed, never as succeeded.
    pub async fn run_grouped<T, F, Fut, R>(
        &self,
        items: &[T],
        mut operation: F,
        reporter: &R,
    ) -> EngineResult<RunResult>
    where
        T: BatchItem,
        F: FnMut(Vec<RecordId>) -> Fut,
        Fut: Future<Output = Result<Vec<DeleteOutcome>, StoreError>>,
        R: ProgressReporter + ?Sized,
    {
        ensure_unique_ids(items)?;
        let total = items.len();
        let mut result = RunResult::default();
        let mut groups = items.chunks(self.batch_size);

        while let Some(group) = groups.next() {
            if self.is_cancelled() {
                for item in group.iter().chain(groups.by_ref().flatten()) {
                    let id = item.item_id().clone();
                    result.record(id.clone(), Err(StoreError::Cancelled { record_id: id }));
                }
                break;
            }

            let ids: Vec<RecordId> = group.iter().map(|item| item.item_id().clone()).collect();
            match operation(ids.clone()).await {
                Ok(outcomes) => {
                    let mut by_id: HashMap<RecordId, Result<(), StoreError>> = outcomes.into_iter().collect();
                    for id in ids {
                        let outcome = by_id.remove(&id).unwrap_or_else(|| {
                            Err(StoreError::DeleteFailed {
                                record_id: id.clone(),
                                message: "store returned no outcome for this record".to_string(),
                            })
                        });
                        result.record(id, outcome);
                    }
                    if !by_id.is_empty() {
                        tracing::warn!(
                            "store reported {} outcomes for ids outside the batch; ignored",
                            by_id.len()
                        );
                    }
                }
                Err(err) => {
                    for id in ids {
                        result.record(id, Err(err.clone()));
                    }
                }
            }
            result.group_sizes.push(group.len());
            reporter.on_progress(result.processed(), total);
        }

        Ok(result)
    }
}
