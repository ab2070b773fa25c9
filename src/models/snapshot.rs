//! Snapshot ledger entry model
//!
//! A snapshot is one immutable record of a single ingestion run: aggregate
//! counts, per-department rollups, the structured error log, and the run
//! status. It is created at run start, updated exactly once at run end, and
//! never mutated afterwards except by deletion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of a snapshot ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    /// Ingestion run is in flight
    #[default]
    Processing,
    /// Run finalized; partial success is still `Completed`
    Completed,
    /// The ledger entry itself could not be finalized
    Failed,
}

impl SnapshotStatus {
    /// Whether the entry has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SnapshotStatus::Processing)
    }
}

impl FromStr for SnapshotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "processing" => Ok(SnapshotStatus::Processing),
            "completed" => Ok(SnapshotStatus::Completed),
            "failed" => Ok(SnapshotStatus::Failed),
            _ => Err(format!("Unknown snapshot status: {}", s)),
        }
    }
}

impl std::fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotStatus::Processing => write!(f, "processing"),
            SnapshotStatus::Completed => write!(f, "completed"),
            SnapshotStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Per-department aggregate rollup
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentStat {
    /// Headcount that landed in this department
    pub count: u64,
    /// Sum of base salaries for the department
    pub total_salary: f64,
}

/// Structured record of one failed write batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchError {
    /// 0-indexed position of the batch in the run
    pub batch_index: usize,
    /// Backend error message
    pub message: String,
    /// Number of records in the failed batch
    pub record_count: usize,
}

/// One immutable record of a single ingestion run and its aggregate outcome
///
/// Serializes camelCase for the dashboard's upload-management and comparison
/// views. The department breakdown is keyed by department name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: Uuid,
    /// Name of the source extract file
    pub file_name: String,
    /// Size of the source extract in bytes
    pub file_size: u64,
    /// Total rows submitted to the run, before mapping/dedup
    pub total_rows: u64,
    pub records_successful: u64,
    pub records_failed: u64,
    pub records_skipped: u64,
    /// Wall-clock processing duration of the run
    pub duration_ms: u64,
    /// Department name -> {count, totalSalary} over accepted records
    #[serde(default)]
    pub department_breakdown: BTreeMap<String, DepartmentStat>,
    /// Sum of base salaries over accepted records
    pub total_salary: f64,
    /// One entry per failed batch, in batch order
    #[serde(default)]
    pub error_log: Vec<BatchError>,
    pub status: SnapshotStatus,
    /// SHA-256 of the source extract content, when the caller provided it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_sha256: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Create a ledger entry for a run that is about to start
    pub fn begin(file_name: impl Into<String>, file_size: u64, total_rows: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            file_size,
            total_rows,
            records_successful: 0,
            records_failed: 0,
            records_skipped: 0,
            duration_ms: 0,
            department_breakdown: BTreeMap::new(),
            total_salary: 0.0,
            error_log: Vec::new(),
            status: SnapshotStatus::Processing,
            source_sha256: None,
            created_at: Utc::now(),
        }
    }

    /// Headcount that actually landed in the store for this run
    pub fn headcount(&self) -> u64 {
        self.records_successful
    }

    /// Invariant: successful + failed + skipped == total rows submitted.
    ///
    /// Holds once the entry reaches a terminal status.
    pub fn accounting_balanced(&self) -> bool {
        self.records_successful + self.records_failed + self.records_skipped == self.total_rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_is_processing() {
        let snapshot = Snapshot::begin("payroll_2026q3.xlsx", 1024, 100);
        assert_eq!(snapshot.status, SnapshotStatus::Processing);
        assert!(!snapshot.status.is_terminal());
        assert_eq!(snapshot.total_rows, 100);
        assert_eq!(snapshot.headcount(), 0);
    }

    #[test]
    fn test_accounting_invariant() {
        let mut snapshot = Snapshot::begin("extract.csv", 0, 10);
        snapshot.records_successful = 7;
        snapshot.records_failed = 2;
        snapshot.records_skipped = 1;
        assert!(snapshot.accounting_balanced());

        snapshot.records_skipped = 0;
        assert!(!snapshot.accounting_balanced());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            "completed".parse::<SnapshotStatus>().unwrap(),
            SnapshotStatus::Completed
        );
        assert!("done".parse::<SnapshotStatus>().is_err());
    }

    #[test]
    fn test_serializes_camel_case() {
        let snapshot = Snapshot::begin("extract.csv", 42, 1);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("fileName").is_some());
        assert!(json.get("recordsSuccessful").is_some());
        assert!(json.get("departmentBreakdown").is_some());
        // Option field is skipped when unset
        assert!(json.get("sourceSha256").is_none());
    }
}
