//! Test fixtures and data for archiver tests
//!
//! Consistent record sets used across all test suites.

use serde_json::json;
use shared::{FieldMap, Record, RecordId};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const SOURCE_TABLE: &'static str = "Editorial";
    pub const ARCHIVE_TABLE: &'static str = "Archive";
    pub const DEFAULT_BATCH_SIZE: usize = 50;

    pub fn fields(value: serde_json::Value) -> FieldMap {
        serde_json::from_value(value).unwrap()
    }

    /// One editorial record with every archival field plus workflow fields
    pub fn article(index: usize) -> Record {
        Record::new(
            Self::article_id(index),
            Self::fields(json!({
                "Title": format!("Article {index}"),
                "Date": format!("{}-06-15", 2008 + index % 12),
                "Year": 2008 + index % 12,
                "Status": if index % 2 == 0 { "Published" } else { "Draft" },
                "Author": "Desk",
            })),
        )
    }

    pub fn article_id(index: usize) -> RecordId {
        RecordId::new(format!("rec{index:05}"))
    }

    /// `count` distinct articles in creation order
    pub fn articles(count: usize) -> Vec<Record> {
        (0..count).map(Self::article).collect()
    }

    pub fn titled(id: &str, title: &str) -> Record {
        Record::new(id, Self::fields(json!({ "Title": title })))
    }

    /// Source table with repeated titles: "Budget" x3, "Weather" x2, "Sports" x1
    pub fn records_with_duplicates() -> Vec<Record> {
        vec![
            Self::titled("r1", "Budget"),
            Self::titled("r2", "Weather"),
            Self::titled("r3", "Budget"),
            Self::titled("r4", "Sports"),
            Self::titled("r5", "Weather"),
            Self::titled("r6", "Budget"),
        ]
    }
}
