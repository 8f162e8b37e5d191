//! Run journal for migrations driven from the command line
//!
//! The report of a migration that did not complete is kept in a JSON file
//! next to the base. While it is there, a new selection run over the same
//! base is refused: re-planning from the source would copy the records the
//! failed run already archived. The run has to be resumed from the saved
//! report instead, and a completed run clears the journal.

use std::path::{Path, PathBuf};

use shared::{Record, RunKind};

use crate::error::{EngineError, EngineResult};
use crate::orchestrator::{MigrationOrchestrator, MigrationReport};
use crate::services::json_store::write_atomic;
use crate::traits::{ProgressReporter, RecordStore};

#[derive(Debug, Clone)]
pub struct RunJournal {
    path: PathBuf,
}

impl RunJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Journal kept beside `base`, e.g. `base.json` -> `base.last-run.json`
    pub fn for_base(base: &Path) -> Self {
        Self::new(base.with_extension("last-run.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved report, or `None` when no journal file exists
    pub async fn load(&self) -> EngineResult<Option<MigrationReport>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, report: &MigrationReport) -> EngineResult<()> {
        let bytes = serde_json::to_vec_pretty(report)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| EngineError::IoError(std::io::Error::other(e)))??;
        Ok(())
    }

    pub async fn clear(&self) -> EngineResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Saved migration that still needs resuming
    pub async fn unresolved(&self) -> EngineResult<Option<MigrationReport>> {
        Ok(self
            .load()
            .await?
            .filter(|report| report.kind == RunKind::Migration && !report.is_success()))
    }

    /// Migrate `records`, resuming the unresolved run when `resume` is set
    ///
    /// Without `resume`, an unresolved run fails the call with
    /// `EngineError::UnresolvedRun` before any store is touched. A finished
    /// run's report replaces the journal, or clears it when it completed.
    pub async fn migrate<S, A, R>(
        &self,
        orchestrator: &mut MigrationOrchestrator<S, A, R>,
        records: Vec<Record>,
        resume: bool,
    ) -> EngineResult<MigrationReport>
    where
        S: RecordStore,
        A: RecordStore,
        R: ProgressReporter,
    {
        let report = match (self.unresolved().await?, resume) {
            (Some(previous), true) => orchestrator.resume_migration(&previous, records).await?,
            (Some(previous), false) => {
                return Err(EngineError::UnresolvedRun {
                    run_id: previous.run_id,
                    state: previous.state,
                });
            }
            (None, resume) => {
                if resume {
                    tracing::info!("No unresolved migration in {}, starting a new run", self.path.display());
                }
                orchestrator.start_migration(records).await?
            }
        };

        if report.is_success() {
            self.clear().await?;
        } else {
            self.save(&report).await?;
            tracing::warn!(
                "⚠️ Run {} saved to {}; resume it before starting another migration",
                report.run_id,
                self.path.display()
            );
        }
        Ok(report)
    }
}
