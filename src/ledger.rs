//! Snapshot ledger rollup logic
//!
//! Pure aggregation helpers the ingestion engine uses to finalize a ledger
//! entry: the per-department fold over accepted records and the derived
//! totals. Persistence of the entry itself goes through the storage backend.

use std::collections::BTreeMap;

use crate::ingest::batch::WriteOutcome;
use crate::models::{DepartmentStat, Employee};

/// Fold accepted records into a per-department rollup.
///
/// Client-side fallback for backends that cannot aggregate server-side.
pub fn fold_departments<'a, I>(records: I) -> BTreeMap<String, DepartmentStat>
where
    I: IntoIterator<Item = &'a Employee>,
{
    let mut rollup: BTreeMap<String, DepartmentStat> = BTreeMap::new();
    for record in records {
        let stat = rollup.entry(record.department.clone()).or_default();
        stat.count += 1;
        stat.total_salary += record.base_salary;
    }
    rollup
}

/// Total salary across a department rollup
pub fn total_salary(rollup: &BTreeMap<String, DepartmentStat>) -> f64 {
    rollup.values().map(|stat| stat.total_salary).sum()
}

/// Iterate the records of batches the backend accepted.
///
/// Re-partitions the write set with the same batch size the writer used and
/// skips failed and never-attempted batches, so a client-side fold sees
/// exactly what landed in the store.
pub fn accepted_records<'a>(
    records: &'a [Employee],
    batch_size: usize,
    outcome: &'a WriteOutcome,
) -> impl Iterator<Item = &'a Employee> {
    records
        .chunks(batch_size.max(1))
        .enumerate()
        .take(outcome.batches_attempted)
        .filter(|(batch_index, _)| !outcome.is_batch_failed(*batch_index))
        .flat_map(|(_, batch)| batch.iter())
}
