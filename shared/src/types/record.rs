//! Record data model
//!
//! A [`Record`] is an immutable snapshot of one row as observed when it was
//! listed from a store. Field values are kept as JSON values so that any
//! table backend can hand them over without a schema.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{SharedError, SharedResult};

pub type FieldValue = serde_json::Value;

/// Field name to value mapping, ordered by field name
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Stable identifier of a record, unique within its store
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate a fresh identifier in the `rec` + 14 hex chars style
    pub fn generate() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("rec{}", &hex[..14]))
    }

    pub fn parse(s: &str) -> SharedResult<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SharedError::InvalidRecordId { input: s.to_string() });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Field names the engine knows about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKey {
    Title,
    Date,
    Year,
    /// Any other field, e.g. a table's primary field
    Named(String),
}

impl FieldKey {
    pub fn name(&self) -> &str {
        match self {
            FieldKey::Title => "Title",
            FieldKey::Date => "Date",
            FieldKey::Year => "Year",
            FieldKey::Named(name) => name,
        }
    }

    /// Default subset copied into the archive
    pub fn archival() -> Vec<FieldKey> {
        vec![FieldKey::Title, FieldKey::Date, FieldKey::Year]
    }
}

impl FromStr for FieldKey {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(SharedError::InvalidFieldName { input: s.to_string() }),
            "Title" => Ok(FieldKey::Title),
            "Date" => Ok(FieldKey::Date),
            "Year" => Ok(FieldKey::Year),
            other => Ok(FieldKey::Named(other.to_string())),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Snapshot of one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default)]
    pub fields: FieldMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Raw value of a field; empty (null) cells count as missing
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field).filter(|value| !value.is_null())
    }

    /// String representation of a field, used for title comparison
    pub fn text(&self, field: &str) -> Option<String> {
        self.get(field).map(|value| match value {
            FieldValue::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Publication year: the `Year` field if numeric, else the year of `Date`
    pub fn year(&self) -> Option<i32> {
        if let Some(year) = self.get(FieldKey::Year.name()).and_then(value_as_year) {
            return Some(year);
        }
        self.get(FieldKey::Date.name())
            .and_then(FieldValue::as_str)
            .and_then(parse_date_year)
    }

    /// Copy of the given fields; fields absent on this record are omitted
    pub fn project(&self, keys: &[FieldKey]) -> FieldMap {
        keys.iter()
            .filter_map(|key| {
                self.get(key.name())
                    .map(|value| (key.name().to_string(), value.clone()))
            })
            .collect()
    }
}

fn value_as_year(value: &FieldValue) -> Option<i32> {
    match value {
        FieldValue::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        FieldValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_date_year(raw: &str) -> Option<i32> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.year());
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.year())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: serde_json::Value) -> Record {
        let fields: FieldMap = serde_json::from_value(fields).unwrap();
        Record::new("rec1", fields)
    }

    #[test]
    fn test_project_omits_missing_fields() {
        let rec = record(json!({"Title": "Budget", "Year": 2014, "Author": "Kim"}));
        let projected = rec.project(&FieldKey::archival());

        assert_eq!(projected.len(), 2);
        assert_eq!(projected["Title"], json!("Budget"));
        assert_eq!(projected["Year"], json!(2014));
        assert!(!projected.contains_key("Date"));
        assert!(!projected.contains_key("Author"));
    }

    #[test]
    fn test_null_cells_count_as_missing() {
        let rec = record(json!({"Title": null, "Date": "2012-01-09"}));
        assert!(rec.text("Title").is_none());
        assert_eq!(rec.project(&FieldKey::archival()).len(), 1);
    }

    #[test]
    fn test_year_prefers_year_field() {
        assert_eq!(record(json!({"Year": 2011, "Date": "2019-03-01"})).year(), Some(2011));
        assert_eq!(record(json!({"Year": "2013"})).year(), Some(2013));
        assert_eq!(record(json!({"Date": "2015-12-31"})).year(), Some(2015));
        assert_eq!(record(json!({"Date": "2016-02-01T10:00:00.000Z"})).year(), Some(2016));
        assert_eq!(record(json!({"Date": "someday"})).year(), None);
    }

    #[test]
    fn test_text_of_non_string_values() {
        let rec = record(json!({"Title": 42}));
        assert_eq!(rec.text("Title").as_deref(), Some("42"));
    }

    #[test]
    fn test_field_key_parsing() {
        assert_eq!("Title".parse::<FieldKey>().unwrap(), FieldKey::Title);
        assert_eq!("Headline".parse::<FieldKey>().unwrap(), FieldKey::Named("Headline".to_string()));
        assert!("  ".parse::<FieldKey>().is_err());
    }

    #[test]
    fn test_record_id_generation_and_parsing() {
        let id = RecordId::generate();
        assert!(id.as_str().starts_with("rec"));
        assert_eq!(id.as_str().len(), 17);
        assert!(RecordId::parse("   ").is_err());
        assert_eq!(RecordId::parse(" recA ").unwrap().as_str(), "recA");
    }
}
