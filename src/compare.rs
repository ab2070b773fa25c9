//! Snapshot comparison
//!
//! Pure diff of two ledger entries: overall and per-department headcount and
//! cost deltas. Backends normalize their row field names into the canonical
//! `Snapshot` model before it gets here, so entries from DuckDB and
//! PostgreSQL compare interchangeably. Inputs are never mutated; comparing
//! is safe to re-run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Snapshot;

/// Headcount and cost delta for one department
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentChange {
    pub department: String,
    pub baseline_count: u64,
    pub current_count: u64,
    /// Headcount delta (current - baseline)
    pub change: i64,
    /// Headcount delta as a percentage of the baseline, one decimal place
    pub change_percent: f64,
    pub baseline_salary: f64,
    pub current_salary: f64,
    /// Salary delta (current - baseline)
    pub salary_change: f64,
}

/// Result of comparing two snapshots
///
/// Consumed by the comparison view and the spreadsheet export, hence the
/// camelCase serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub baseline_id: Uuid,
    pub current_id: Uuid,
    /// Overall headcount delta (current - baseline)
    pub headcount_change: i64,
    /// Overall headcount delta as a percentage, one decimal place
    pub headcount_change_percent: f64,
    /// Overall salary-cost delta (current - baseline)
    pub cost_change: f64,
    /// Overall cost delta as a percentage, one decimal place
    pub cost_change_percent: f64,
    /// True when the current snapshot costs less than the baseline
    pub savings_achieved: bool,
    /// Per-department deltas, sorted descending by |headcount change|
    pub departments: Vec<DepartmentChange>,
}

/// Round to one decimal place
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Percentage change with a zero-baseline guard: never NaN or infinite
fn percent_change(change: f64, baseline: f64) -> f64 {
    if baseline > 0.0 {
        round1(change / baseline * 100.0)
    } else {
        0.0
    }
}

/// Compare two ledger entries, `baseline` being the older one.
pub fn compare(baseline: &Snapshot, current: &Snapshot) -> ComparisonResult {
    let headcount_change = current.headcount() as i64 - baseline.headcount() as i64;
    let cost_change = current.total_salary - baseline.total_salary;

    // Union of department keys: baseline's order first, then departments
    // that only exist in the current snapshot
    let mut keys: Vec<&String> = baseline.department_breakdown.keys().collect();
    for key in current.department_breakdown.keys() {
        if !baseline.department_breakdown.contains_key(key) {
            keys.push(key);
        }
    }

    let mut departments: Vec<DepartmentChange> = keys
        .into_iter()
        .map(|department| {
            let before = baseline
                .department_breakdown
                .get(department)
                .copied()
                .unwrap_or_default();
            let after = current
                .department_breakdown
                .get(department)
                .copied()
                .unwrap_or_default();
            let change = after.count as i64 - before.count as i64;

            DepartmentChange {
                department: department.clone(),
                baseline_count: before.count,
                current_count: after.count,
                change,
                change_percent: percent_change(change as f64, before.count as f64),
                baseline_salary: before.total_salary,
                current_salary: after.total_salary,
                salary_change: after.total_salary - before.total_salary,
            }
        })
        .collect();

    // Stable sort: ties keep the union's key order
    departments.sort_by(|a, b| b.change.abs().cmp(&a.change.abs()));

    ComparisonResult {
        baseline_id: baseline.id,
        current_id: current.id,
        headcount_change,
        headcount_change_percent: percent_change(
            headcount_change as f64,
            baseline.headcount() as f64,
        ),
        cost_change,
        cost_change_percent: percent_change(cost_change, baseline.total_salary),
        savings_achieved: cost_change < 0.0,
        departments,
    }
}
