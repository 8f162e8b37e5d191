//! Duplicate detection by primary-field value
//!
//! Titles are compared exactly as stored: no trimming, no case folding. A
//! missing title is an ordinary value and two missing titles are equal.
//! Ties between equal titles are broken by input position, so the record
//! listed first (the earliest created, for stores that list in creation
//! order) is the one retained.

use serde::Serialize;
use shared::{Record, RecordId};

/// Comparison key and id of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleEntry {
    pub title: Option<String>,
    pub id: RecordId,
}

impl TitleEntry {
    pub fn new(title: Option<&str>, id: impl Into<RecordId>) -> Self {
        Self {
            title: title.map(str::to_string),
            id: id.into(),
        }
    }
}

/// Records sharing one title
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub title: Option<String>,
    /// First-ranked record, never flagged
    pub kept: RecordId,
    /// Records ranked 2..N, flagged for deletion
    pub duplicates: Vec<RecordId>,
}

pub struct DuplicateDetector;

impl DuplicateDetector {
    /// Build comparison entries from the records' primary field
    pub fn entries_from_records(records: &[Record], primary_field: &str) -> Vec<TitleEntry> {
        records
            .iter()
            .map(|record| TitleEntry {
                title: record.text(primary_field),
                id: record.id.clone(),
            })
            .collect()
    }

    /// Ids to delete, ordered by first appearance of their group
    pub fn find(entries: &[TitleEntry]) -> Vec<RecordId> {
        Self::groups(entries)
            .into_iter()
            .flat_map(|group| group.duplicates)
            .collect()
    }

    /// Every title shared by more than one record
    pub fn groups(entries: &[TitleEntry]) -> Vec<DuplicateGroup> {
        // Rank by (title, position): equal titles become adjacent and the
        // tie-break does not depend on sort stability.
        let mut ranked: Vec<usize> = (0..entries.len()).collect();
        ranked.sort_unstable_by(|&a, &b| entries[a].title.cmp(&entries[b].title).then(a.cmp(&b)));

        let mut groups: Vec<(usize, DuplicateGroup)> = Vec::new();
        let mut ranked = ranked.into_iter().peekable();
        while let Some(first) = ranked.next() {
            let title = &entries[first].title;
            let mut duplicates = Vec::new();
            while let Some(next) = ranked.next_if(|&next| entries[next].title == *title) {
                duplicates.push(entries[next].id.clone());
            }
            if !duplicates.is_empty() {
                groups.push((
                    first,
                    DuplicateGroup {
                        title: title.clone(),
                        kept: entries[first].id.clone(),
                        duplicates,
                    },
                ));
            }
        }

        groups.sort_unstable_by_key(|(first, _)| *first);
        groups.into_iter().map(|(_, group)| group).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn entry(title: &str, id: &str) -> TitleEntry {
        TitleEntry::new(Some(title), id)
    }

    #[test]
    fn test_first_occurrence_retained() {
        let entries = vec![entry("A", "1"), entry("B", "2"), entry("A", "3")];
        assert_eq!(DuplicateDetector::find(&entries), vec![RecordId::new("3")]);
    }

    #[test]
    fn test_empty_input() {
        assert!(DuplicateDetector::find(&[]).is_empty());
    }

    #[test]
    fn test_all_distinct_titles() {
        let entries = vec![entry("A", "1"), entry("B", "2"), entry("C", "3")];
        assert!(DuplicateDetector::find(&entries).is_empty());
    }

    #[test]
    fn test_all_identical_titles_keep_one() {
        let entries: Vec<_> = (0..6).map(|i| entry("Same", &i.to_string())).collect();
        let flagged = DuplicateDetector::find(&entries);
        assert_eq!(flagged.len(), 5);
        assert!(!flagged.contains(&RecordId::new("0")));
    }

    #[test]
    fn test_group_size_minus_one_per_group() {
        let titles = ["x", "y", "x", "z", "y", "x", "w"];
        let entries: Vec<_> = titles
            .iter()
            .enumerate()
            .map(|(i, t)| entry(t, &format!("r{i}")))
            .collect();

        let mut sizes: HashMap<&str, usize> = HashMap::new();
        for t in titles {
            *sizes.entry(t).or_default() += 1;
        }
        let expected: usize = sizes.values().map(|n| n - 1).sum();
        assert_eq!(DuplicateDetector::find(&entries).len(), expected);
    }

    #[test]
    fn test_output_ordered_by_group_first_appearance() {
        // "b" group appears first in the input even though "a" sorts first
        let entries = vec![
            entry("b", "1"),
            entry("a", "2"),
            entry("b", "3"),
            entry("a", "4"),
            entry("b", "5"),
        ];
        assert_eq!(
            DuplicateDetector::find(&entries),
            vec![RecordId::new("3"), RecordId::new("5"), RecordId::new("4")]
        );
    }

    #[test]
    fn test_comparison_is_exact() {
        let entries = vec![entry("Title", "1"), entry("title", "2"), entry(" Title", "3")];
        assert!(DuplicateDetector::find(&entries).is_empty());
    }

    #[test]
    fn test_missing_and_empty_titles_are_ordinary_values() {
        let entries = vec![
            TitleEntry::new(None, "1"),
            entry("", "2"),
            TitleEntry::new(None, "3"),
            entry("", "4"),
        ];
        let groups = DuplicateDetector::groups(&entries);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].title, None);
        assert_eq!(groups[0].kept, RecordId::new("1"));
        assert_eq!(groups[1].duplicates, vec![RecordId::new("4")]);
    }

    #[test]
    fn test_detection_is_idempotent() {
        let entries = vec![entry("A", "1"), entry("A", "2"), entry("B", "3")];
        assert_eq!(DuplicateDetector::find(&entries), DuplicateDetector::find(&entries));
    }

    #[test]
    fn test_entries_from_records_use_primary_field() {
        let records = vec![
            Record::new("r1", serde_json::from_value(json!({"Headline": "Hi"})).unwrap()),
            Record::new("r2", serde_json::from_value(json!({"Title": "Hi"})).unwrap()),
        ];
        let entries = DuplicateDetector::entries_from_records(&records, "Headline");
        assert_eq!(entries[0].title.as_deref(), Some("Hi"));
        assert_eq!(entries[1].title, None);
    }
}
