//! Selection of the records a migration run will move

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use shared::{FieldValue, Record, RecordId};

use crate::error::{EngineError, EngineResult};

/// Predicate selecting records for migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordFilter {
    /// Every record
    All,
    /// Records whose field holds exactly this value, e.g. `Status == "Published"`
    FieldEquals { field: String, value: FieldValue },
    /// Records published in or before `year`; records without a year are excluded
    YearAtMost { year: i32 },
    /// Records with one of these ids
    IdIn { ids: BTreeSet<RecordId> },
}

impl RecordFilter {
    pub fn field_equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        RecordFilter::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn year_at_most(year: i32) -> Self {
        RecordFilter::YearAtMost { year }
    }

    pub fn id_in(ids: impl IntoIterator<Item = RecordId>) -> Self {
        RecordFilter::IdIn {
            ids: ids.into_iter().collect(),
        }
    }

    /// Reject predicates that cannot select anything meaningful
    pub fn validate(&self) -> EngineResult<()> {
        match self {
            RecordFilter::FieldEquals { field, .. } if field.trim().is_empty() => {
                Err(EngineError::invalid("filter field name is empty"))
            }
            RecordFilter::IdIn { ids } if ids.is_empty() => Err(EngineError::invalid("filter id set is empty")),
            _ => Ok(()),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            RecordFilter::All => true,
            RecordFilter::FieldEquals { field, value } => record.get(field) == Some(value),
            RecordFilter::YearAtMost { year } => record.year().is_some_and(|y| y <= *year),
            RecordFilter::IdIn { ids } => ids.contains(&record.id),
        }
    }
}

pub struct MigrationPlanner;

impl MigrationPlanner {
    /// Records satisfying `filter`, in their original order
    pub fn plan(records: &[Record], filter: &RecordFilter) -> EngineResult<Vec<Record>> {
        filter.validate()?;
        Ok(Self::plan_with(records, |record| filter.matches(record)))
    }

    /// Records satisfying an arbitrary predicate, in their original order
    pub fn plan_with<P>(records: &[Record], predicate: P) -> Vec<Record>
    where
        P: Fn(&Record) -> bool,
    {
        records.iter().filter(|record| predicate(*record)).cloned().collect()
    }
}
