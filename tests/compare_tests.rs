//! Comparison result shape as consumed by the dashboard and spreadsheet export

use workforce_snapshot_sdk::models::{DepartmentStat, Snapshot};
use workforce_snapshot_sdk::{ComparisonResult, compare};

fn snapshot(total: u64, total_salary: f64, departments: &[(&str, u64, f64)]) -> Snapshot {
    let mut s = Snapshot::begin("extract.csv", 0, total);
    s.records_successful = total;
    s.total_salary = total_salary;
    for (name, count, salary) in departments {
        s.department_breakdown.insert(
            name.to_string(),
            DepartmentStat {
                count: *count,
                total_salary: *salary,
            },
        );
    }
    s
}

#[test]
fn test_result_serializes_camel_case_for_export() {
    let baseline = snapshot(100, 1_000_000.0, &[("Ops", 100, 1_000_000.0)]);
    let current = snapshot(90, 950_000.0, &[("Ops", 90, 950_000.0)]);

    let result = compare(&baseline, &current);
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["headcountChange"], -10);
    assert_eq!(json["headcountChangePercent"], -10.0);
    assert_eq!(json["costChange"], -50_000.0);
    assert_eq!(json["savingsAchieved"], true);

    let dept = &json["departments"][0];
    assert_eq!(dept["department"], "Ops");
    assert_eq!(dept["baselineCount"], 100);
    assert_eq!(dept["currentCount"], 90);
    assert_eq!(dept["salaryChange"], -50_000.0);
}

#[test]
fn test_result_round_trips() {
    let baseline = snapshot(10, 100_000.0, &[("Design", 10, 100_000.0)]);
    let current = snapshot(12, 125_000.0, &[("Design", 12, 125_000.0)]);

    let result = compare(&baseline, &current);
    let json = serde_json::to_string(&result).unwrap();
    let restored: ComparisonResult = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, result);
}

#[test]
fn test_snapshot_entries_from_either_backend_compare() {
    // A ledger entry that went through a backend's row mapping arrives as
    // canonical JSON; deserializing it must feed the comparator unchanged.
    let baseline = snapshot(50, 500_000.0, &[("Ops", 50, 500_000.0)]);
    let serialized = serde_json::to_string(&baseline).unwrap();
    let restored: Snapshot = serde_json::from_str(&serialized).unwrap();

    let result = compare(&restored, &baseline);
    assert_eq!(result.headcount_change, 0);
    assert_eq!(result.cost_change, 0.0);
}
