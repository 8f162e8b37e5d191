//! Common test utilities and infrastructure
//!
//! Shared fixtures and builders used by the integration and unit suites.

#![allow(dead_code, unused_imports)]

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
pub use fixtures::TestFixtures;
pub use helpers::{GatedStore, OrchestratorBuilder, TestHarness, TestHelpers};
