//! Run lifecycle state shared between the engine and its callers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one orchestrator run.
///
/// A migration walks `Idle -> CopyInProgress -> Verified -> DeleteInProgress
/// -> Completed`, stopping at `CopyFailed` or `DeleteFailed` on partial
/// failure. Delete-only runs skip the copy states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    #[default]
    Idle,
    CopyInProgress,
    CopyFailed,
    Verified,
    DeleteInProgress,
    DeleteFailed,
    Completed,
}

impl MigrationState {
    /// Terminal states end a run; a new request may start from them
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MigrationState::CopyFailed | MigrationState::DeleteFailed | MigrationState::Completed
        )
    }

    /// States in which a run owns the orchestrator
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            MigrationState::CopyInProgress | MigrationState::Verified | MigrationState::DeleteInProgress
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, MigrationState::CopyFailed | MigrationState::DeleteFailed)
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationState::Idle => "idle",
            MigrationState::CopyInProgress => "copy_in_progress",
            MigrationState::CopyFailed => "copy_failed",
            MigrationState::Verified => "verified",
            MigrationState::DeleteInProgress => "delete_in_progress",
            MigrationState::DeleteFailed => "delete_failed",
            MigrationState::Completed => "completed",
        };
        write!(f, "{name}")
    }
}

/// Batch phase a run result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Copy,
    Delete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Copy => write!(f, "copy"),
            Phase::Delete => write!(f, "delete"),
        }
    }
}

/// Flow a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Copy to the archive store, then delete from the source store
    Migration,
    /// Delete duplicate records from the source store
    DuplicateRemoval,
    /// Delete every record in the archive store
    ArchivePurge,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::Migration => write!(f, "migration"),
            RunKind::DuplicateRemoval => write!(f, "duplicate removal"),
            RunKind::ArchivePurge => write!(f, "archive purge"),
        }
    }
}
