//! Record usage against per-table and per-base limits

use serde::Serialize;
use std::fmt;

use crate::error::{EngineError, EngineResult};

/// How close a table or base is to its record limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLevel {
    /// Below half of the limit
    Healthy,
    /// Between half and 80% of the limit
    Warning,
    /// 80% of the limit or more
    Critical,
}

impl UsageLevel {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.5 {
            UsageLevel::Healthy
        } else if ratio < 0.8 {
            UsageLevel::Warning
        } else {
            UsageLevel::Critical
        }
    }

    /// Display colour used by dashboards
    pub fn color(&self) -> &'static str {
        match self {
            UsageLevel::Healthy => "#006600",
            UsageLevel::Warning => "#ff9933",
            UsageLevel::Critical => "#ff3333",
        }
    }
}

impl fmt::Display for UsageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageLevel::Healthy => write!(f, "healthy"),
            UsageLevel::Warning => write!(f, "warning"),
            UsageLevel::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableUsage {
    pub table: String,
    pub records: usize,
    pub limit: usize,
    pub ratio: f64,
    pub level: UsageLevel,
}

impl TableUsage {
    fn new(table: String, records: usize, limit: usize) -> Self {
        let ratio = records as f64 / limit as f64;
        Self {
            table,
            records,
            limit,
            ratio,
            level: UsageLevel::from_ratio(ratio),
        }
    }

    pub fn percent(&self) -> f64 {
        self.ratio * 100.0
    }
}

/// Usage of every table plus the base as a whole
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityReport {
    pub tables: Vec<TableUsage>,
    pub base: TableUsage,
}

impl CapacityReport {
    pub fn build(
        base_name: &str,
        counts: &[(String, usize)],
        table_limit: usize,
        base_limit: usize,
    ) -> EngineResult<Self> {
        if table_limit == 0 || base_limit == 0 {
            return Err(EngineError::invalid("record limits must be greater than zero"));
        }

        let tables = counts
            .iter()
            .map(|(table, records)| TableUsage::new(table.clone(), *records, table_limit))
            .collect();
        let total = counts.iter().map(|(_, records)| records).sum();

        Ok(Self {
            tables,
            base: TableUsage::new(base_name.to_string(), total, base_limit),
        })
    }

    /// Tables at or above the warning threshold
    pub fn tables_needing_attention(&self) -> impl Iterator<Item = &TableUsage> {
        self.tables
            .iter()
            .filter(|usage| usage.level != UsageLevel::Healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_boundaries() {
        assert_eq!(UsageLevel::from_ratio(0.0), UsageLevel::Healthy);
        assert_eq!(UsageLevel::from_ratio(0.499), UsageLevel::Healthy);
        assert_eq!(UsageLevel::from_ratio(0.5), UsageLevel::Warning);
        assert_eq!(UsageLevel::from_ratio(0.79), UsageLevel::Warning);
        assert_eq!(UsageLevel::from_ratio(0.8), UsageLevel::Critical);
        assert_eq!(UsageLevel::from_ratio(1.3), UsageLevel::Critical);
    }

    #[test]
    fn test_report_totals_tables() {
        let counts = vec![
            ("Editorial".to_string(), 30_000),
            ("Archive".to_string(), 45_000),
            ("Authors".to_string(), 500),
        ];
        let report = CapacityReport::build("Newsroom", &counts, 50_000, 100_000).unwrap();

        assert_eq!(report.base.records, 75_500);
        assert_eq!(report.base.level, UsageLevel::Warning);
        assert_eq!(report.tables[0].level, UsageLevel::Warning);
        assert_eq!(report.tables[1].level, UsageLevel::Critical);
        assert!((report.tables[1].percent() - 90.0).abs() < f64::EPSILON);

        let flagged: Vec<_> = report.tables_needing_attention().map(|t| t.table.as_str()).collect();
        assert_eq!(flagged, vec!["Editorial", "Archive"]);
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert!(CapacityReport::build("b", &[], 0, 10).is_err());
        assert!(CapacityReport::build("b", &[], 10, 0).is_err());
    }

    #[test]
    fn test_colors() {
        assert_eq!(UsageLevel::Healthy.color(), "#006600");
        assert_eq!(UsageLevel::Critical.color(), "#ff3333");
    }
}
