//! Shared in-memory mock backend with failure injection

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use workforce_snapshot_sdk::models::{DepartmentStat, Employee, Snapshot};
use workforce_snapshot_sdk::storage::{StorageBackend, StorageError, StorageResult};

/// In-memory backend for exercising the engine without a database.
///
/// Failure injection knobs:
/// - `fail_insert_calls`: insert_batch call indices (0-based) that fail
/// - `fail_create`: make create_snapshot fail
/// - `fail_finalize_remaining`: make the next N finalize calls fail
/// - `rollup_supported`: when false, department_rollup reports Unsupported
#[derive(Default)]
pub struct MockBackend {
    pub snapshots: Mutex<HashMap<Uuid, Snapshot>>,
    pub records: Mutex<HashMap<Uuid, Vec<Employee>>>,
    pub fail_insert_calls: HashSet<usize>,
    insert_calls: Mutex<usize>,
    pub fail_create: AtomicBool,
    pub fail_finalize_remaining: Mutex<u32>,
    pub rollup_supported: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_batches(indices: &[usize]) -> Self {
        Self {
            fail_insert_calls: indices.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn with_grouped_rollup(self) -> Self {
        self.rollup_supported.store(true, Ordering::Relaxed);
        self
    }

    pub fn stored_records(&self, snapshot_id: Uuid) -> Vec<Employee> {
        self.records
            .lock()
            .unwrap()
            .get(&snapshot_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn stored_snapshot(&self, id: Uuid) -> Option<Snapshot> {
        self.snapshots.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait(?Send)]
impl StorageBackend for MockBackend {
    async fn initialize(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn insert_batch(&self, snapshot_id: Uuid, records: &[Employee]) -> StorageResult<usize> {
        let call = {
            let mut calls = self.insert_calls.lock().unwrap();
            let current = *calls;
            *calls += 1;
            current
        };

        if self.fail_insert_calls.contains(&call) {
            return Err(StorageError::QueryFailed(format!(
                "injected failure on call {}",
                call
            )));
        }

        self.records
            .lock()
            .unwrap()
            .entry(snapshot_id)
            .or_default()
            .extend_from_slice(records);
        Ok(records.len())
    }

    async fn count_by_snapshot(&self, snapshot_id: Uuid) -> StorageResult<u64> {
        Ok(self.stored_records(snapshot_id).len() as u64)
    }

    async fn fetch_page(
        &self,
        snapshot_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> StorageResult<Vec<Employee>> {
        Ok(self
            .stored_records(snapshot_id)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn delete_by_snapshot(&self, snapshot_id: Uuid) -> StorageResult<u64> {
        let removed = self.records.lock().unwrap().remove(&snapshot_id);
        Ok(removed.map(|r| r.len() as u64).unwrap_or(0))
    }

    async fn department_rollup(
        &self,
        snapshot_id: Uuid,
    ) -> StorageResult<BTreeMap<String, DepartmentStat>> {
        if !self.rollup_supported.load(Ordering::Relaxed) {
            return Err(StorageError::Unsupported("department_rollup"));
        }

        let mut rollup: BTreeMap<String, DepartmentStat> = BTreeMap::new();
        for record in self.stored_records(snapshot_id) {
            let stat = rollup.entry(record.department.clone()).or_default();
            stat.count += 1;
            stat.total_salary += record.base_salary;
        }
        Ok(rollup)
    }

    async fn create_snapshot(&self, snapshot: &Snapshot) -> StorageResult<()> {
        if self.fail_create.load(Ordering::Relaxed) {
            return Err(StorageError::QueryFailed("injected create failure".into()));
        }
        self.snapshots
            .lock()
            .unwrap()
            .insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn finalize_snapshot(&self, snapshot: &Snapshot) -> StorageResult<()> {
        {
            let mut remaining = self.fail_finalize_remaining.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StorageError::QueryFailed(
                    "injected finalize failure".into(),
                ));
            }
        }

        let mut snapshots = self.snapshots.lock().unwrap();
        if !snapshots.contains_key(&snapshot.id) {
            return Err(StorageError::SnapshotNotFound(snapshot.id));
        }
        snapshots.insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn get_snapshot(&self, id: Uuid) -> StorageResult<Option<Snapshot>> {
        Ok(self.stored_snapshot(id))
    }

    async fn list_snapshots(&self) -> StorageResult<Vec<Snapshot>> {
        let mut all: Vec<Snapshot> = self.snapshots.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn delete_snapshot(&self, id: Uuid) -> StorageResult<()> {
        self.records.lock().unwrap().remove(&id);
        match self.snapshots.lock().unwrap().remove(&id) {
            Some(_) => Ok(()),
            None => Err(StorageError::SnapshotNotFound(id)),
        }
    }

    async fn health_check(&self) -> StorageResult<bool> {
        Ok(true)
    }

    fn backend_type(&self) -> &'static str {
        "mock"
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
