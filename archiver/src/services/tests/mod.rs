//! Service-specific tests
//!
//! Each service has its own test file; shared record builders live in
//! `common`.

mod memory_store;
mod reporter;

// Common test utilities for services
pub mod common {
    use std::time::Duration;
    use tokio::time::timeout;

    use shared::{FieldMap, Record};

    /// Standard timeout for async operations in tests
    pub const TEST_TIMEOUT: Duration = Duration::from_millis(500);

    /// Helper to run async operations with timeout
    pub async fn with_timeout<T, F>(future: F) -> Result<T, tokio::time::error::Elapsed>
    where
        F: std::future::Future<Output = T>,
    {
        timeout(TEST_TIMEOUT, future).await
    }

    pub fn fields(value: serde_json::Value) -> FieldMap {
        serde_json::from_value(value).expect("Valid test field map")
    }

    pub fn article(id: &str, title: &str, year: i32) -> Record {
        Record::new(id, fields(serde_json::json!({ "Title": title, "Year": year })))
    }
}
