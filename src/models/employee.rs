//! Canonical employee record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Employment status of a record within a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    #[default]
    Active,
    Inactive,
    Terminated,
}

impl FromStr for EmployeeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(EmployeeStatus::Active),
            "inactive" => Ok(EmployeeStatus::Inactive),
            "terminated" => Ok(EmployeeStatus::Terminated),
            _ => Err(format!(
                "Unknown employee status: {}. Use 'active', 'inactive' or 'terminated'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for EmployeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmployeeStatus::Active => write!(f, "active"),
            EmployeeStatus::Inactive => write!(f, "inactive"),
            EmployeeStatus::Terminated => write!(f, "terminated"),
        }
    }
}

/// Participation status in a workforce reduction program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionStatus {
    #[default]
    None,
    Active,
}

impl FromStr for ReductionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(ReductionStatus::None),
            "active" => Ok(ReductionStatus::Active),
            _ => Err(format!(
                "Unknown reduction status: {}. Use 'none' or 'active'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for ReductionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReductionStatus::None => write!(f, "none"),
            ReductionStatus::Active => write!(f, "active"),
        }
    }
}

/// Reduction-program sub-record carried on each employee record
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReductionProgram {
    /// Whether the record is enrolled in a reduction program
    #[serde(default)]
    pub status: ReductionStatus,
    /// Reduction percentage applied while the program is active (0-100)
    #[serde(default)]
    pub percent: f64,
}

/// Canonical employee record
///
/// All source rows are mapped into this schema before deduplication and
/// writing. The business identifier (`employee_id`) is the user-facing key;
/// `id` is the internal storage key and carries no business meaning.
///
/// Records are weakly owned by a snapshot: `snapshot_id` is a lookup
/// relation, and deleting the owning ledger entry cascade-deletes the
/// records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    /// Internal storage id
    pub id: Uuid,
    /// Business identifier, unique within a snapshot after dedup
    pub employee_id: String,
    /// Display name
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub status: EmployeeStatus,
    /// Full-time-equivalent percentage (0-100)
    #[serde(default = "default_fte_percent")]
    pub fte_percent: f64,
    /// Base compensation in the extract's currency
    #[serde(default)]
    pub base_salary: f64,
    #[serde(default)]
    pub reduction: ReductionProgram,
    /// Owning snapshot reference
    pub snapshot_id: Uuid,
    pub created_at: DateTime<Utc>,
}

fn default_fte_percent() -> f64 {
    100.0
}

impl Employee {
    /// Create a new record with defaults for everything but the identity fields
    pub fn new(employee_id: impl Into<String>, name: impl Into<String>, snapshot_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            employee_id: employee_id.into(),
            name: name.into(),
            department: String::new(),
            role: String::new(),
            status: EmployeeStatus::default(),
            fte_percent: default_fte_percent(),
            base_salary: 0.0,
            reduction: ReductionProgram::default(),
            snapshot_id,
            created_at: Utc::now(),
        }
    }
}
