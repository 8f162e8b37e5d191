//! Record lifecycle engine for table-based stores
//!
//! Detects duplicate records by a primary field and migrates selected
//! records from a source table to an archive table with a batched
//! create-then-delete sequence. Per-record failures are collected rather
//! than thrown, and records are deleted from the source only after their
//! archive copy is confirmed.

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::EngineConfig;
pub use core::{
    BatchExecutor, CapacityReport, DuplicateDetector, DuplicateGroup, MigrationPlanner, RecordFilter, RunResult,
    TitleEntry, UsageLevel,
};
pub use error::{EngineError, EngineResult};
pub use orchestrator::{MigrationOrchestrator, MigrationReport, SharedOrchestrator};
pub use traits::{DeleteOutcome, MockProgressReporter, MockRecordStore, ProgressReporter, RecordStore};
