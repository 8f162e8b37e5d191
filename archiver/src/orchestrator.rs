//! Migration orchestrator
//!
//! Drives one run at a time through the `MigrationState` machine, using
//! injected record stores and a progress reporter. A migration copies the
//! archival field subset of every planned record into the archive store and
//! only then deletes the copied records from the source store. Duplicate
//! removal and archive purge reuse the delete half of that flow.
//!
//! A migration that stopped at `CopyFailed` or `DeleteFailed` leaves archived
//! records in the source store. `resume_migration` continues it from its
//! report: only records without an archive copy are copied again, and the
//! leftovers are deleted together with the new copies.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio_util::sync::CancellationToken;

use shared::{
    FieldKey, MigrationState, Phase, Record, RecordId, RunId, RunKind, logging, run_debug, run_info, run_warn,
};

use crate::{
    config::EngineConfig,
    core::{BatchExecutor, BatchItem, DuplicateDetector, DuplicateGroup, MigrationPlanner, RecordFilter, RunResult},
    error::{EngineError, EngineResult},
    traits::{DEFAULT_MAX_BATCH_SIZE, ProgressReporter, RecordStore},
};

/// Outcome of one orchestrator run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub run_id: RunId,
    pub kind: RunKind,
    /// Terminal state the run ended in
    pub state: MigrationState,
    /// Number of records the run was asked to process
    pub total: usize,
    pub copy: Option<RunResult>,
    pub delete: Option<RunResult>,
    /// Run this one resumed, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_from: Option<RunId>,
    /// Ids archived by earlier runs and still in the source when this run began
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub carried_over: Vec<RecordId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.state == MigrationState::Completed
    }

    pub fn archived_count(&self) -> usize {
        self.copy.as_ref().map_or(0, |copy| copy.succeeded.len())
    }

    pub fn deleted_count(&self) -> usize {
        self.delete.as_ref().map_or(0, |delete| delete.succeeded.len())
    }

    pub fn failed_phase(&self) -> Option<Phase> {
        match self.state {
            MigrationState::CopyFailed => Some(Phase::Copy),
            MigrationState::DeleteFailed => Some(Phase::Delete),
            _ => None,
        }
    }

    /// Ids with an archive copy: those this run copied plus those it carried over
    fn archived_ids(&self) -> impl Iterator<Item = &RecordId> {
        self.copy
            .iter()
            .flat_map(|copy| copy.succeeded.iter())
            .chain(self.carried_over.iter())
    }

    /// Records of a migration run that have no archive copy yet
    ///
    /// Pass the records the run was started with; the result is the subset
    /// to hand back to `start_migration` for a retry.
    pub fn unarchived(&self, records: &[Record]) -> Vec<Record> {
        let archived: HashSet<&RecordId> = self.archived_ids().collect();
        records
            .iter()
            .filter(|record| !archived.contains(&record.id))
            .cloned()
            .collect()
    }

    /// Ids that were archived but are still present in the source store
    pub fn archived_not_deleted(&self) -> Vec<RecordId> {
        let deleted = self
            .delete
            .as_ref()
            .map(RunResult::succeeded_set)
            .unwrap_or_default();
        self.archived_ids()
            .filter(|id| !deleted.contains(id))
            .cloned()
            .collect()
    }

    /// Turn a failed run into `EngineError::PartialFailure`
    pub fn into_result(self) -> EngineResult<Self> {
        let phase = match self.failed_phase() {
            Some(phase) => phase,
            None => return Ok(self),
        };
        let result = match phase {
            Phase::Copy => self.copy.as_ref(),
            Phase::Delete => self.delete.as_ref(),
        };
        Err(EngineError::PartialFailure {
            phase,
            failed: result.map_or(0, |r| r.failed.len()),
            total: result.map_or(0, RunResult::processed),
        })
    }
}

/// State machine driving copy, verify and delete phases
pub struct MigrationOrchestrator<S, A, R>
where
    S: RecordStore,
    A: RecordStore,
    R: ProgressReporter,
{
    /// Injected services
    source: S,
    archive: A,
    reporter: R,

    batch_size: usize,
    primary_field: String,
    archive_fields: Vec<FieldKey>,
    cancel: Option<CancellationToken>,

    state: watch::Sender<MigrationState>,
    current_run: Option<RunId>,
    last_report: Option<MigrationReport>,
}

impl<S, A, R> MigrationOrchestrator<S, A, R>
where
    S: RecordStore,
    A: RecordStore,
    R: ProgressReporter,
{
    /// Create an orchestrator with default batch size and archival fields
    pub fn new(source: S, archive: A, reporter: R) -> Self {
        let (state, _) = watch::channel(MigrationState::Idle);
        Self {
            source,
            archive,
            reporter,
            batch_size: DEFAULT_MAX_BATCH_SIZE,
            primary_field: FieldKey::Title.name().to_string(),
            archive_fields: FieldKey::archival(),
            cancel: None,
            state,
            current_run: None,
            last_report: None,
        }
    }

    /// Create an orchestrator from a validated configuration
    pub fn from_config(source: S, archive: A, reporter: R, config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let archive_fields = config.archive_field_keys()?;
        Ok(Self::new(source, archive, reporter)
            .with_batch_size(config.batch_size)
            .with_primary_field(config.primary_field.clone())
            .with_archive_fields(archive_fields))
    }

    /// Zero is accepted here and rejected with `InvalidArgument` when a run starts
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_primary_field(mut self, field: impl Into<String>) -> Self {
        self.primary_field = field.into();
        self
    }

    pub fn with_archive_fields(mut self, fields: Vec<FieldKey>) -> Self {
        self.archive_fields = fields;
        self
    }

    /// Stop runs between batch groups once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn state(&self) -> MigrationState {
        *self.state.borrow()
    }

    /// Watch state transitions from another task
    pub fn state_receiver(&self) -> watch::Receiver<MigrationState> {
        self.state.subscribe()
    }

    pub fn current_run(&self) -> Option<RunId> {
        self.current_run
    }

    pub fn last_report(&self) -> Option<&MigrationReport> {
        self.last_report.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Return a finished orchestrator to `Idle`
    pub fn reset(&mut self) -> EngineResult<()> {
        let state = self.state();
        if state.is_in_progress() {
            return Err(EngineError::AlreadyRunning { state });
        }
        if state != MigrationState::Idle {
            let previous = self.state.send_replace(MigrationState::Idle);
            tracing::debug!("🔄 Orchestrator reset from {}", previous);
            self.reporter.on_state_change(MigrationState::Idle);
        }
        self.current_run = None;
        Ok(())
    }

    /// List the source table and select the records `filter` matches
    pub async fn plan(&self, filter: &RecordFilter) -> EngineResult<Vec<Record>> {
        filter.validate()?;
        let records = self.source.list_records().await?;
        Ok(MigrationPlanner::plan_with(&records, |record| filter.matches(record)))
    }

    /// List the source table and group records sharing a primary-field value
    pub async fn detect_duplicates(&self) -> EngineResult<Vec<DuplicateGroup>> {
        let records = self.source.list_records().await?;
        let entries = DuplicateDetector::entries_from_records(&records, &self.primary_field);
        Ok(DuplicateDetector::groups(&entries))
    }

    /// Archive `records`, then delete them from the source store
    ///
    /// Deletion runs only after every record has an archive copy. A run that
    /// stops at `CopyFailed` or `DeleteFailed` still returns `Ok`; inspect the
    /// report or call `into_result`.
    pub async fn start_migration(&mut self, records: Vec<Record>) -> EngineResult<MigrationReport> {
        self.ensure_startable()?;
        self.run_migration(records, Vec::new(), None).await
    }

    /// Continue a migration that ended in `CopyFailed` or `DeleteFailed`
    ///
    /// `records` is the current selection from the source store. Records the
    /// previous run already archived are never copied again; the ones still
    /// in the source are deleted once the remaining copies are verified.
    pub async fn resume_migration(
        &mut self,
        previous: &MigrationReport,
        records: Vec<Record>,
    ) -> EngineResult<MigrationReport> {
        self.ensure_startable()?;
        if previous.kind != RunKind::Migration {
            return Err(EngineError::invalid(format!(
                "run {} is a {}, not a migration",
                previous.run_id, previous.kind
            )));
        }

        let in_source: HashSet<RecordId> = self
            .source
            .list_records()
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect();
        let carried: Vec<RecordId> = previous
            .archived_not_deleted()
            .into_iter()
            .filter(|id| in_source.contains(id))
            .collect();
        let pending = previous.unarchived(&records);
        tracing::info!(
            "🔁 Resuming run {}: {} records to copy, {} archived records left to delete",
            previous.run_id,
            pending.len(),
            carried.len()
        );

        self.run_migration(pending, carried, Some(previous.run_id)).await
    }

    /// Copy `records`, then delete them and `carried` from the source store
    async fn run_migration(
        &mut self,
        records: Vec<Record>,
        carried: Vec<RecordId>,
        resumed_from: Option<RunId>,
    ) -> EngineResult<MigrationReport> {
        let copier = self.executor(self.batch_size)?;
        let deleter = self.executor(self.delete_batch_size(&self.source))?;
        crate::core::ensure_unique_ids(&records)?;

        let run_id = self.begin(RunKind::Migration);
        let started_at = Utc::now();
        let to_copy = records.len();
        let total = to_copy + carried.len();

        self.transition(&run_id, MigrationState::CopyInProgress);
        run_info!(
            run_id,
            "📦 Copying {} records to '{}' in groups of {}",
            to_copy,
            self.archive.table_name(),
            copier.batch_size()
        );

        let copy = match self.copy_phase(&run_id, &copier, &records).await {
            Ok(copy) => copy,
            Err(e) => return Err(self.abort(&run_id, MigrationState::CopyFailed, e)),
        };

        let verified = copy.is_clean() && copy.succeeded.len() == to_copy;
        if !verified {
            self.transition(&run_id, MigrationState::CopyFailed);
            run_warn!(
                run_id,
                "⚠️ Copy incomplete: {} of {} records archived, source left untouched",
                copy.succeeded.len(),
                to_copy
            );
            let report = self.finish(run_id, RunKind::Migration, total, Some(copy), None, started_at);
            return Ok(self.record_resume(report, resumed_from, carried));
        }
        self.transition(&run_id, MigrationState::Verified);

        let mut to_delete = copy.succeeded.clone();
        to_delete.extend(carried.iter().cloned());
        let delete = match self.delete_phase(&run_id, &self.source, &deleter, &to_delete).await {
            Ok(delete) => delete,
            Err(e) => return Err(self.abort(&run_id, MigrationState::DeleteFailed, e)),
        };
        let state = Self::delete_outcome_state(&delete);
        self.transition(&run_id, state);

        let report = self.finish(run_id, RunKind::Migration, total, Some(copy), Some(delete), started_at);
        Ok(self.record_resume(report, resumed_from, carried))
    }

    fn record_resume(
        &mut self,
        mut report: MigrationReport,
        resumed_from: Option<RunId>,
        carried: Vec<RecordId>,
    ) -> MigrationReport {
        report.resumed_from = resumed_from;
        report.carried_over = carried;
        self.last_report = Some(report.clone());
        report
    }

    /// Delete the given duplicate records from the source store
    pub async fn remove_duplicates(&mut self, ids: Vec<RecordId>) -> EngineResult<MigrationReport> {
        self.ensure_startable()?;
        let deleter = self.executor(self.delete_batch_size(&self.source))?;
        crate::core::ensure_unique_ids(&ids)?;

        let run_id = self.begin(RunKind::DuplicateRemoval);
        let started_at = Utc::now();
        let total = ids.len();

        let delete = match self.delete_phase(&run_id, &self.source, &deleter, &ids).await {
            Ok(delete) => delete,
            Err(e) => return Err(self.abort(&run_id, MigrationState::DeleteFailed, e)),
        };
        let state = Self::delete_outcome_state(&delete);
        self.transition(&run_id, state);

        Ok(self.finish(run_id, RunKind::DuplicateRemoval, total, None, Some(delete), started_at))
    }

    /// Delete every record currently in the archive store
    ///
    /// A failure to list the archive fails the run with `EngineError::Store`
    /// and leaves the orchestrator in `DeleteFailed`.
    pub async fn purge_archive(&mut self) -> EngineResult<MigrationReport> {
        self.ensure_startable()?;
        let deleter = self.executor(self.delete_batch_size(&self.archive))?;

        let run_id = self.begin(RunKind::ArchivePurge);
        let started_at = Utc::now();
        self.transition(&run_id, MigrationState::DeleteInProgress);

        let records = match self.archive.list_records().await {
            Ok(records) => records,
            Err(e) => return Err(self.abort(&run_id, MigrationState::DeleteFailed, e.into())),
        };
        let total = records.len();

        let delete = match self.delete_phase(&run_id, &self.archive, &deleter, &records).await {
            Ok(delete) => delete,
            Err(e) => return Err(self.abort(&run_id, MigrationState::DeleteFailed, e)),
        };
        let state = Self::delete_outcome_state(&delete);
        self.transition(&run_id, state);

        Ok(self.finish(run_id, RunKind::ArchivePurge, total, None, Some(delete), started_at))
    }

    async fn copy_phase(&self, run_id: &RunId, executor: &BatchExecutor, records: &[Record]) -> EngineResult<RunResult> {
        let archive = &self.archive;
        let fields = &self.archive_fields;

        let copy = executor
            .run(
                records,
                |record: &Record| {
                    let projected = record.project(fields);
                    async move { archive.create_record(projected).await.map(|_| ()) }
                },
                &self.reporter,
            )
            .await?;

        for (id, error) in copy.attempted_failures() {
            run_debug!(run_id, "Copy of {} failed: {}", id, error);
        }
        Ok(copy)
    }

    async fn delete_phase<T, St>(
        &self,
        run_id: &RunId,
        store: &St,
        executor: &BatchExecutor,
        items: &[T],
    ) -> EngineResult<RunResult>
    where
        T: BatchItem,
        St: RecordStore,
    {
        if self.state() != MigrationState::DeleteInProgress {
            self.transition(run_id, MigrationState::DeleteInProgress);
        }
        run_info!(
            run_id,
            "🗑️ Deleting {} records from '{}' in groups of {}",
            items.len(),
            store.table_name(),
            executor.batch_size()
        );

        let delete = executor
            .run_grouped(
                items,
                |ids: Vec<RecordId>| async move { store.delete_records(&ids).await },
                &self.reporter,
            )
            .await?;

        for (id, error) in delete.attempted_failures() {
            run_debug!(run_id, "Delete of {} failed: {}", id, error);
        }
        Ok(delete)
    }

    fn delete_outcome_state(delete: &RunResult) -> MigrationState {
        if delete.is_clean() {
            MigrationState::Completed
        } else {
            MigrationState::DeleteFailed
        }
    }

    fn ensure_startable(&self) -> EngineResult<()> {
        let state = self.state();
        if state.is_in_progress() {
            return Err(EngineError::AlreadyRunning { state });
        }
        Ok(())
    }

    fn executor(&self, batch_size: usize) -> EngineResult<BatchExecutor> {
        let executor = BatchExecutor::new(batch_size)?;
        Ok(match &self.cancel {
            Some(token) => executor.with_cancellation(token.clone()),
            None => executor,
        })
    }

    /// Delete groups never exceed what the store accepts in one call
    fn delete_batch_size<St: RecordStore>(&self, store: &St) -> usize {
        self.batch_size.min(store.max_batch_size())
    }

    /// Start a new run, resetting a terminal state first
    fn begin(&mut self, kind: RunKind) -> RunId {
        let run_id = RunId::new();
        if self.state() != MigrationState::Idle {
            self.transition(&run_id, MigrationState::Idle);
        }
        self.current_run = Some(run_id);
        logging::log_progress(&run_id, "Run started", &kind.to_string());
        run_id
    }

    fn transition(&self, run_id: &RunId, next: MigrationState) {
        let previous = self.state.send_replace(next);
        run_debug!(run_id, "🔀 State {} -> {}", previous, next);
        self.reporter.on_state_change(next);
    }

    fn abort(&self, run_id: &RunId, state: MigrationState, error: EngineError) -> EngineError {
        self.transition(run_id, state);
        logging::log_error(run_id, "Run", &error);
        error
    }

    fn finish(
        &mut self,
        run_id: RunId,
        kind: RunKind,
        total: usize,
        copy: Option<RunResult>,
        delete: Option<RunResult>,
        started_at: DateTime<Utc>,
    ) -> MigrationReport {
        let report = MigrationReport {
            run_id,
            kind,
            state: self.state(),
            total,
            copy,
            delete,
            resumed_from: None,
            carried_over: Vec::new(),
            started_at,
            finished_at: Utc::now(),
        };

        if report.is_success() {
            logging::log_success(
                &run_id,
                &format!(
                    "{} finished: {} archived, {} deleted",
                    kind,
                    report.archived_count(),
                    report.deleted_count()
                ),
            );
        } else {
            run_warn!(run_id, "⚠️ {} ended in {}", kind, report.state);
        }

        self.last_report = Some(report.clone());
        report
    }
}

/// Orchestrator shared between tasks
///
/// Only one run holds the lock at a time. A `start_*` call made while another
/// run holds it fails with `AlreadyRunning` instead of queueing.
pub struct SharedOrchestrator<S, A, R>
where
    S: RecordStore,
    A: RecordStore,
    R: ProgressReporter,
{
    inner: Arc<Mutex<MigrationOrchestrator<S, A, R>>>,
    state: watch::Receiver<MigrationState>,
}

impl<S, A, R> Clone for SharedOrchestrator<S, A, R>
where
    S: RecordStore,
    A: RecordStore,
    R: ProgressReporter,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            state: self.state.clone(),
        }
    }
}

impl<S, A, R> SharedOrchestrator<S, A, R>
where
    S: RecordStore,
    A: RecordStore,
    R: ProgressReporter,
{
    pub fn new(orchestrator: MigrationOrchestrator<S, A, R>) -> Self {
        let state = orchestrator.state_receiver();
        Self {
            inner: Arc::new(Mutex::new(orchestrator)),
            state,
        }
    }

    /// Current state, readable while a run holds the lock
    pub fn state(&self) -> MigrationState {
        *self.state.borrow()
    }

    fn acquire(&self) -> EngineResult<MutexGuard<'_, MigrationOrchestrator<S, A, R>>> {
        self.inner
            .try_lock()
            .map_err(|_| EngineError::AlreadyRunning { state: self.state() })
    }

    pub async fn start_migration(&self, records: Vec<Record>) -> EngineResult<MigrationReport> {
        self.acquire()?.start_migration(records).await
    }

    pub async fn resume_migration(
        &self,
        previous: &MigrationReport,
        records: Vec<Record>,
    ) -> EngineResult<MigrationReport> {
        self.acquire()?.resume_migration(previous, records).await
    }

    pub async fn remove_duplicates(&self, ids: Vec<RecordId>) -> EngineResult<MigrationReport> {
        self.acquire()?.remove_duplicates(ids).await
    }

    pub async fn purge_archive(&self) -> EngineResult<MigrationReport> {
        self.acquire()?.purge_archive().await
    }

    pub fn reset(&self) -> EngineResult<()> {
        self.acquire()?.reset()
    }

    pub async fn last_report(&self) -> Option<MigrationReport> {
        self.inner.lock().await.last_report().cloned()
    }
}
