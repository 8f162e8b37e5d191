//! Shared types for the record archiving engine
//!
//! Contains the record data model, store error taxonomy, run state and the
//! logging helpers used by every crate in the workspace.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
