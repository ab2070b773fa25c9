//! Bounded-batch writing against the storage backend
//!
//! Partitions the deduplicated write set into fixed-size contiguous batches
//! and writes each as one unit. Failure is isolated at batch granularity: a
//! rejected batch is recorded in the error log and the run moves on to the
//! next batch. A transiently-unavailable backend is retried a bounded number
//! of times per batch before the batch is recorded as failed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::models::{BatchError, Employee};
use crate::storage::config::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES};
use crate::storage::{StorageBackend, StorageResult};

/// Base delay for the bounded retry backoff; doubles per attempt
const RETRY_BASE_DELAY_MS: u64 = 100;

/// Cooperative cancellation flag for an in-flight run
///
/// Checked between batches. Batches already committed stay persisted; the
/// ledger is finalized reflecting whatever was processed.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the run stop before its next batch
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Aggregate outcome of a batch-write pass
#[derive(Debug, Clone, Default)]
pub struct WriteOutcome {
    /// Records accepted by the backend
    pub successful: u64,
    /// Records in batches the backend rejected
    pub failed: u64,
    /// One entry per failed batch, in batch order
    pub errors: Vec<BatchError>,
    /// Wall-clock duration of the whole pass
    pub total_time_ms: u64,
    /// Wall-clock duration per attempted batch, in batch order
    pub batch_times_ms: Vec<u64>,
    /// Number of batches attempted (fewer than partitioned when cancelled)
    pub batches_attempted: usize,
    /// Whether the pass stopped early on a cancellation request
    pub cancelled: bool,
}

impl WriteOutcome {
    /// Records attempted (successful + failed)
    pub fn attempted(&self) -> u64 {
        self.successful + self.failed
    }

    /// Aggregate throughput over the pass, in records per second
    pub fn records_per_second(&self) -> f64 {
        if self.total_time_ms == 0 {
            return 0.0;
        }
        self.attempted() as f64 * 1000.0 / self.total_time_ms as f64
    }

    /// Whether the batch at `batch_index` was recorded as failed
    pub fn is_batch_failed(&self, batch_index: usize) -> bool {
        self.errors.iter().any(|e| e.batch_index == batch_index)
    }
}

/// Writes a deduplicated record set through a storage backend in batches
pub struct BatchWriter<'a, B: StorageBackend + ?Sized> {
    backend: &'a B,
    batch_size: usize,
    max_retries: u32,
}

impl<'a, B: StorageBackend + ?Sized> BatchWriter<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Override the records-per-batch partition size (minimum 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Override the bounded retry count for transient backend outages
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Write all records for `snapshot_id`, invoking `progress` with
    /// `(processed_so_far, total)` after every batch. Progress values are
    /// monotonically non-decreasing and end at the total unless cancelled.
    pub async fn write(
        &self,
        snapshot_id: Uuid,
        records: &[Employee],
        progress: &mut dyn FnMut(usize, usize),
        cancel: &CancelFlag,
    ) -> WriteOutcome {
        let total = records.len();
        let run_start = Instant::now();
        let mut outcome = WriteOutcome::default();
        let mut processed = 0usize;

        for (batch_index, batch) in records.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(batch_index, "run cancelled before batch");
                outcome.cancelled = true;
                break;
            }

            let batch_start = Instant::now();
            match self.insert_with_retry(snapshot_id, batch).await {
                Ok(inserted) => {
                    outcome.successful += inserted as u64;
                }
                Err(e) => {
                    tracing::warn!(
                        batch_index,
                        record_count = batch.len(),
                        error = %e,
                        "batch write failed; continuing with next batch"
                    );
                    outcome.failed += batch.len() as u64;
                    outcome.errors.push(BatchError {
                        batch_index,
                        message: e.to_string(),
                        record_count: batch.len(),
                    });
                }
            }

            outcome.batch_times_ms.push(batch_start.elapsed().as_millis() as u64);
            outcome.batches_attempted += 1;
            processed += batch.len();
            progress(processed, total);
        }

        outcome.total_time_ms = run_start.elapsed().as_millis() as u64;
        outcome
    }

    /// Attempt one batch, retrying a transiently-unavailable backend with
    /// doubling backoff up to the bounded retry count.
    async fn insert_with_retry(
        &self,
        snapshot_id: Uuid,
        batch: &[Employee],
    ) -> StorageResult<usize> {
        let mut attempt = 0u32;
        loop {
            match self.backend.insert_batch(snapshot_id, batch).await {
                Ok(inserted) => return Ok(inserted),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS << (attempt - 1));
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "backend unavailable; retrying batch"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DepartmentStat, Snapshot};
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Minimal backend stub with per-batch failure injection
    #[derive(Default)]
    struct StubBackend {
        /// Batch call indices (0-based) that fail with QueryFailed
        fail_calls: Vec<usize>,
        /// Number of leading calls that fail with Unavailable
        transient_failures: Mutex<u32>,
        calls: Mutex<usize>,
        inserted: Mutex<usize>,
    }

    impl StubBackend {
        fn failing(fail_calls: Vec<usize>) -> Self {
            Self {
                fail_calls,
                ..Default::default()
            }
        }

        fn transient(n: u32) -> Self {
            Self {
                transient_failures: Mutex::new(n),
                ..Default::default()
            }
        }
    }

    #[async_trait(?Send)]
    impl StorageBackend for StubBackend {
        async fn initialize(&self) -> StorageResult<()> {
            Ok(())
        }

        async fn insert_batch(
            &self,
            _snapshot_id: Uuid,
            records: &[Employee],
        ) -> StorageResult<usize> {
            {
                let mut transient = self.transient_failures.lock().unwrap();
                if *transient > 0 {
                    *transient -= 1;
                    return Err(StorageError::Unavailable("connection reset".into()));
                }
            }

            let call = {
                let mut calls = self.calls.lock().unwrap();
                let current = *calls;
                *calls += 1;
                current
            };

            if self.fail_calls.contains(&call) {
                return Err(StorageError::QueryFailed("constraint violation".into()));
            }

            *self.inserted.lock().unwrap() += records.len();
            Ok(records.len())
        }

        async fn count_by_snapshot(&self, _snapshot_id: Uuid) -> StorageResult<u64> {
            Ok(*self.inserted.lock().unwrap() as u64)
        }

        async fn fetch_page(
            &self,
            _snapshot_id: Uuid,
            _offset: u64,
            _limit: u64,
        ) -> StorageResult<Vec<Employee>> {
            Ok(Vec::new())
        }

        async fn delete_by_snapshot(&self, _snapshot_id: Uuid) -> StorageResult<u64> {
            Ok(0)
        }

        async fn department_rollup(
            &self,
            _snapshot_id: Uuid,
        ) -> StorageResult<BTreeMap<String, DepartmentStat>> {
            Err(StorageError::Unsupported("department_rollup"))
        }

        async fn create_snapshot(&self, _snapshot: &Snapshot) -> StorageResult<()> {
            Ok(())
        }

        async fn finalize_snapshot(&self, _snapshot: &Snapshot) -> StorageResult<()> {
            Ok(())
        }

        async fn get_snapshot(&self, _id: Uuid) -> StorageResult<Option<Snapshot>> {
            Ok(None)
        }

        async fn list_snapshots(&self) -> StorageResult<Vec<Snapshot>> {
            Ok(Vec::new())
        }

        async fn delete_snapshot(&self, _id: Uuid) -> StorageResult<()> {
            Ok(())
        }

        async fn health_check(&self) -> StorageResult<bool> {
            Ok(true)
        }

        fn backend_type(&self) -> &'static str {
            "stub"
        }

        async fn close(&self) -> StorageResult<()> {
            Ok(())
        }
    }

    fn records(n: usize) -> Vec<Employee> {
        (0..n)
            .map(|i| Employee::new(format!("E-{}", i), format!("Person {}", i), Uuid::nil()))
            .collect()
    }

    #[tokio::test]
    async fn test_batch_isolation_concrete_scenario() {
        // 1,200 unique rows, batch size 500 => 3 batches; batch 1 (0-indexed) fails
        let backend = StubBackend::failing(vec![1]);
        let writer = BatchWriter::new(&backend).with_batch_size(500);

        let outcome = writer
            .write(
                Uuid::nil(),
                &records(1200),
                &mut |_, _| {},
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(outcome.successful, 700);
        assert_eq!(outcome.failed, 500);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].batch_index, 1);
        assert_eq!(outcome.errors[0].record_count, 500);
        assert_eq!(outcome.batches_attempted, 3);
        assert!(outcome.is_batch_failed(1));
        assert!(!outcome.is_batch_failed(0));
        assert!(!outcome.is_batch_failed(2));
    }

    #[tokio::test]
    async fn test_progress_monotonic_and_complete() {
        let backend = StubBackend::failing(vec![2]);
        let writer = BatchWriter::new(&backend).with_batch_size(100);

        let mut calls: Vec<(usize, usize)> = Vec::new();
        let outcome = writer
            .write(
                Uuid::nil(),
                &records(450),
                &mut |processed, total| calls.push((processed, total)),
                &CancelFlag::new(),
            )
            .await;

        // Progress fires after every batch, success or failure
        assert_eq!(calls.len(), 5);
        for window in calls.windows(2) {
            assert!(window[1].0 >= window[0].0, "progress must not decrease");
        }
        assert_eq!(calls.last().unwrap(), &(450, 450));
        assert_eq!(outcome.attempted(), 450);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_then_succeeds() {
        let backend = StubBackend::transient(2);
        let writer = BatchWriter::new(&backend)
            .with_batch_size(10)
            .with_max_retries(2);

        let outcome = writer
            .write(Uuid::nil(), &records(10), &mut |_, _| {}, &CancelFlag::new())
            .await;

        assert_eq!(outcome.successful, 10);
        assert_eq!(outcome.failed, 0);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_recorded_as_failed_batch() {
        let backend = StubBackend::transient(5);
        let writer = BatchWriter::new(&backend)
            .with_batch_size(10)
            .with_max_retries(1);

        let outcome = writer
            .write(Uuid::nil(), &records(10), &mut |_, _| {}, &CancelFlag::new())
            .await;

        assert_eq!(outcome.successful, 0);
        assert_eq!(outcome.failed, 10);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].message.contains("unavailable"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_between_batches() {
        let backend = StubBackend::default();
        let writer = BatchWriter::new(&backend).with_batch_size(50);
        let cancel = CancelFlag::new();

        let cancel_in_callback = cancel.clone();
        let outcome = writer
            .write(
                Uuid::nil(),
                &records(200),
                &mut |processed, _| {
                    if processed >= 100 {
                        cancel_in_callback.cancel();
                    }
                },
                &cancel,
            )
            .await;

        assert!(outcome.cancelled);
        assert_eq!(outcome.successful, 100);
        assert_eq!(outcome.batches_attempted, 2);
    }

    #[test]
    fn test_throughput_zero_guard() {
        let outcome = WriteOutcome::default();
        assert_eq!(outcome.records_per_second(), 0.0);
    }
}
