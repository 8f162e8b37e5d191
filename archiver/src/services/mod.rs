//! Service implementations
//!
//! Concrete record stores and progress reporters. The orchestrator only sees
//! them through the traits in `crate::traits`.

pub mod json_store;
pub mod memory_store;
pub mod reporter;
pub mod run_journal;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use json_store::{JsonBase, JsonBaseHandle, JsonFileStore};
pub use memory_store::MemoryStore;
pub use reporter::{ChannelReporter, ProgressEvent, SilentReporter, TracingReporter};
pub use run_journal::RunJournal;
