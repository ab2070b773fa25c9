//! Deduplication by business identifier
//!
//! Builds a keyed set over the normalized business id. When the same id
//! appears more than once in an extract, the occurrence later in input order
//! wins ("last import wins for same id within a file"). Records with blank
//! ids are excluded and counted as skipped, not failed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::Employee;

/// Counts reported by a dedup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupStats {
    /// Earlier occurrences displaced by a later row with the same id
    pub duplicates_removed: u64,
    /// Records whose business id was empty or whitespace-only
    pub blank_ids_skipped: u64,
}

impl DedupStats {
    /// Total records removed from the write set by this pass
    pub fn total_skipped(&self) -> u64 {
        self.duplicates_removed + self.blank_ids_skipped
    }
}

/// Result of a dedup pass: the unique write set plus skip accounting
#[derive(Debug, Default)]
pub struct DedupResult {
    /// Unique records in first-occurrence position order; contents of a
    /// position reflect the last row seen for that id
    pub unique: Vec<Employee>,
    pub stats: DedupStats,
}

/// Normalize a business id for keying: trimmed and lowercased.
///
/// The case policy is deliberate: "E-1001" and "e-1001 " are the same
/// employee to the dashboards this store feeds.
pub fn normalize_business_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Deduplicate mapped records by normalized business id.
pub fn dedupe(records: Vec<Employee>) -> DedupResult {
    let mut result = DedupResult::default();
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(records.len());

    for record in records {
        let key = normalize_business_id(&record.employee_id);
        if key.is_empty() {
            result.stats.blank_ids_skipped += 1;
            continue;
        }

        match positions.get(&key) {
            Some(&pos) => {
                // Later row wins; keep the first occurrence's position
                result.unique[pos] = record;
                result.stats.duplicates_removed += 1;
            }
            None => {
                positions.insert(key, result.unique.len());
                result.unique.push(record);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(id: &str, name: &str) -> Employee {
        Employee::new(id, name, Uuid::nil())
    }

    #[test]
    fn test_last_occurrence_wins() {
        let result = dedupe(vec![
            record("E-1", "First Import"),
            record("E-2", "Other"),
            record("E-1", "Second Import"),
        ]);

        assert_eq!(result.unique.len(), 2);
        assert_eq!(result.stats.duplicates_removed, 1);
        // Position of the first occurrence, content of the last
        assert_eq!(result.unique[0].employee_id, "E-1");
        assert_eq!(result.unique[0].name, "Second Import");
        assert_eq!(result.unique[1].employee_id, "E-2");
    }

    #[test]
    fn test_normalization_collides_case_and_whitespace() {
        let result = dedupe(vec![record("E-1001", "Upper"), record(" e-1001 ", "Lower")]);

        assert_eq!(result.unique.len(), 1);
        assert_eq!(result.stats.duplicates_removed, 1);
        assert_eq!(result.unique[0].name, "Lower");
    }

    #[test]
    fn test_blank_ids_skipped_not_failed() {
        let result = dedupe(vec![
            record("", "No Id"),
            record("   ", "Whitespace Id"),
            record("E-1", "Fine"),
        ]);

        assert_eq!(result.unique.len(), 1);
        assert_eq!(result.stats.blank_ids_skipped, 2);
        assert_eq!(result.stats.duplicates_removed, 0);
        assert_eq!(result.stats.total_skipped(), 2);
    }

    #[test]
    fn test_empty_input() {
        let result = dedupe(Vec::new());
        assert!(result.unique.is_empty());
        assert_eq!(result.stats, DedupStats::default());
    }
}
