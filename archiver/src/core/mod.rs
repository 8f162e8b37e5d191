//! Core business logic modules
//!
//! Selection, duplicate detection and capacity math are pure functions with
//! no I/O. The batch executor is generic over the store operation it drives,
//! so it is tested with plain closures.

pub mod batch;
pub mod capacity;
pub mod duplicates;
pub mod planner;

pub use batch::{BatchExecutor, BatchItem, RunResult, ensure_unique_ids};
pub use capacity::{CapacityReport, TableUsage, UsageLevel};
pub use duplicates::{DuplicateDetector, DuplicateGroup, TitleEntry};
pub use planner::{MigrationPlanner, RecordFilter};
