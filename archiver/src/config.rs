//! Engine configuration
//!
//! Values are loaded from:
//! 1. `.env` file in the current directory or parent directories (if present)
//! 2. System environment variables (`ARCHIVER_*`)
//!
//! Environment variables take precedence over .env file values. Command line
//! flags are applied on top by the binary.
//!
//! ## Variables
//! - `ARCHIVER_BATCH_SIZE`: records per batch group (default 50)
//! - `ARCHIVER_PRIMARY_FIELD`: duplicate comparison field (default `Title`)
//! - `ARCHIVER_ARCHIVE_FIELDS`: comma-separated fields copied to the archive
//! - `ARCHIVER_PUBLISHED_FIELD`, `ARCHIVER_PUBLISHED_VALUE`: "published" selection
//! - `ARCHIVER_YEAR_CUTOFF`: newest year archived by `archive-old`
//! - `ARCHIVER_SOURCE_TABLE`, `ARCHIVER_ARCHIVE_TABLE`: table names
//! - `ARCHIVER_TABLE_RECORD_LIMIT`, `ARCHIVER_BASE_RECORD_LIMIT`: capacity limits

use serde::{Deserialize, Serialize};
use shared::FieldKey;
use std::str::FromStr;

use crate::core::RecordFilter;
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub batch_size: usize,
    pub primary_field: String,
    pub archive_fields: Vec<String>,
    pub published_field: String,
    pub published_value: String,
    pub archive_year_cutoff: i32,
    pub source_table: String,
    pub archive_table: String,
    pub table_record_limit: usize,
    pub base_record_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: crate::traits::DEFAULT_MAX_BATCH_SIZE,
            primary_field: "Title".to_string(),
            archive_fields: FieldKey::archival().iter().map(|key| key.name().to_string()).collect(),
            published_field: "Status".to_string(),
            published_value: "Published".to_string(),
            archive_year_cutoff: 2015,
            source_table: "Editorial".to_string(),
            archive_table: "Archive".to_string(),
            table_record_limit: 50_000,
            base_record_limit: 100_000,
        }
    }
}

impl EngineConfig {
    /// Load from `.env` and the process environment, then validate
    pub fn from_env() -> EngineResult<Self> {
        Self::read_env()?.validated()
    }

    /// Load from an arbitrary variable source, then validate
    pub fn from_lookup<F>(lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::read_lookup(lookup)?.validated()
    }

    /// Load from `.env` and the process environment without validating
    ///
    /// Callers layering overrides on top validate once they are applied.
    pub fn read_env() -> EngineResult<Self> {
        // Silently ignored when no .env file exists
        let _ = dotenv::dotenv();
        Self::read_lookup(|key| std::env::var(key).ok())
    }

    /// Parse variables from `lookup`; only malformed numbers fail here
    pub fn read_lookup<F>(lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("ARCHIVER_BATCH_SIZE") {
            config.batch_size = parse_var("ARCHIVER_BATCH_SIZE", &value)?;
        }
        if let Some(value) = lookup("ARCHIVER_PRIMARY_FIELD") {
            config.primary_field = value;
        }
        if let Some(value) = lookup("ARCHIVER_ARCHIVE_FIELDS") {
            config.archive_fields = value.split(',').map(|field| field.trim().to_string()).collect();
        }
        if let Some(value) = lookup("ARCHIVER_PUBLISHED_FIELD") {
            config.published_field = value;
        }
        if let Some(value) = lookup("ARCHIVER_PUBLISHED_VALUE") {
            config.published_value = value;
        }
        if let Some(value) = lookup("ARCHIVER_YEAR_CUTOFF") {
            config.archive_year_cutoff = parse_var("ARCHIVER_YEAR_CUTOFF", &value)?;
        }
        if let Some(value) = lookup("ARCHIVER_SOURCE_TABLE") {
            config.source_table = value;
        }
        if let Some(value) = lookup("ARCHIVER_ARCHIVE_TABLE") {
            config.archive_table = value;
        }
        if let Some(value) = lookup("ARCHIVER_TABLE_RECORD_LIMIT") {
            config.table_record_limit = parse_var("ARCHIVER_TABLE_RECORD_LIMIT", &value)?;
        }
        if let Some(value) = lookup("ARCHIVER_BASE_RECORD_LIMIT") {
            config.base_record_limit = parse_var("ARCHIVER_BASE_RECORD_LIMIT", &value)?;
        }

        Ok(config)
    }

    /// Replace the batch size when an override is given
    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        if let Some(batch_size) = batch_size {
            self.batch_size = batch_size;
        }
        self
    }

    pub fn validated(self) -> EngineResult<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.batch_size == 0 {
            return Err(EngineError::config("batch_size must be greater than zero"));
        }
        if self.table_record_limit == 0 || self.base_record_limit == 0 {
            return Err(EngineError::config("record limits must be greater than zero"));
        }
        if self.primary_field.trim().is_empty() {
            return Err(EngineError::config("primary_field is empty"));
        }
        if self.published_field.trim().is_empty() {
            return Err(EngineError::config("published_field is empty"));
        }
        if self.source_table.trim().is_empty() || self.archive_table.trim().is_empty() {
            return Err(EngineError::config("table names must not be empty"));
        }
        if self.source_table == self.archive_table {
            return Err(EngineError::config("source_table and archive_table must differ"));
        }
        if self.archive_fields.is_empty() {
            return Err(EngineError::config("archive_fields is empty"));
        }
        self.archive_field_keys().map(|_| ())
    }

    /// Archival field subset as typed keys
    pub fn archive_field_keys(&self) -> EngineResult<Vec<FieldKey>> {
        self.archive_fields
            .iter()
            .map(|field| {
                FieldKey::from_str(field)
                    .map_err(|_| EngineError::config(format!("archive_fields contains an empty name: {field:?}")))
            })
            .collect()
    }

    /// Selection used by `archive-published`
    pub fn published_filter(&self) -> RecordFilter {
        RecordFilter::field_equals(self.published_field.clone(), self.published_value.clone())
    }

    /// Selection used by `archive-old`; `year` overrides the configured cutoff
    pub fn old_records_filter(&self, year: Option<i32>) -> RecordFilter {
        RecordFilter::year_at_most(year.unwrap_or(self.archive_year_cutoff))
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> EngineResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| EngineError::config(format!("{name} has an invalid value: {value:?}")))
}
