//! Ingestion engine
//!
//! Orchestrates one ingestion run end to end: field mapping, deduplication,
//! batched writes, and ledger finalization, against a storage backend chosen
//! once at construction time. A run is a single sequential control flow, so
//! progress reporting and error accumulation are deterministic.
//!
//! Partial success is a valid terminal state: the caller always receives a
//! finalized ledger entry reflecting however many records actually landed,
//! plus a structured error log. Only a failure of the ledger's own
//! create/finalize calls is fatal.

use sha2::{Digest, Sha256};
use std::time::Instant;
use uuid::Uuid;

pub mod batch;

pub use batch::{BatchWriter, CancelFlag, WriteOutcome};

use crate::compare::{ComparisonResult, compare};
use crate::dedup::dedupe;
use crate::ledger;
use crate::mapper::{MappingConfig, MappingConfigError, RawRow, map_rows};
use crate::models::{Employee, Snapshot, SnapshotStatus};
use crate::storage::{StorageBackend, StorageConfig, StorageError, StorageResult};

/// Error type for ingestion runs
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The mapping configuration cannot produce valid records
    #[error("Invalid mapping configuration: {0}")]
    Mapping(#[from] MappingConfigError),

    /// The ledger's own create/finalize call failed; fatal to the run
    #[error("Ledger finalization failed: {0}")]
    LedgerFinalization(#[source] StorageError),

    /// A storage operation outside the run's batch loop failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A comparison was requested against a missing ledger entry
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(Uuid),
}

/// Result type for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;

/// Metadata about the source extract feeding a run
#[derive(Debug, Clone)]
pub struct ExtractSource {
    /// Name of the uploaded file
    pub file_name: String,
    /// Size of the uploaded file in bytes
    pub file_size: u64,
    /// SHA-256 of the file content, for provenance
    pub content_sha256: Option<String>,
}

impl ExtractSource {
    pub fn new(file_name: impl Into<String>, file_size: u64) -> Self {
        Self {
            file_name: file_name.into(),
            file_size,
            content_sha256: None,
        }
    }

    /// Record the content hash of the extract (builder style)
    pub fn with_content(mut self, content: &[u8]) -> Self {
        self.content_sha256 = Some(compute_hash(content));
        self
    }
}

/// Compute SHA-256 hash of content as a lowercase hex string
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    format!("{:x}", result)
}

/// Ingestion engine bound to one storage backend
///
/// The backend is injected at construction (strategy object); nothing in the
/// engine branches on a backend type at call time. Concurrent runs against
/// different snapshot ids are safe; a single snapshot id has one writer.
pub struct IngestEngine<B: StorageBackend> {
    backend: B,
    batch_size: usize,
    max_retries: u32,
}

impl<B: StorageBackend> IngestEngine<B> {
    /// Create an engine with default batch sizing
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            batch_size: crate::storage::config::DEFAULT_BATCH_SIZE,
            max_retries: crate::storage::config::DEFAULT_MAX_RETRIES,
        }
    }

    /// Create an engine tuned from a loaded configuration
    pub fn with_config(backend: B, config: &StorageConfig) -> Self {
        Self {
            backend,
            batch_size: config.ingest.batch_size.max(1),
            max_retries: config.ingest.max_retries,
        }
    }

    /// Get reference to the storage backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Initialize the storage schema (run migrations)
    pub async fn initialize(&self) -> StorageResult<()> {
        self.backend.initialize().await
    }

    /// Run one ingestion without progress reporting or cancellation
    pub async fn run(
        &self,
        source: ExtractSource,
        rows: &[RawRow],
        mapping: &MappingConfig,
    ) -> IngestResult<Snapshot> {
        self.run_with_progress(source, rows, mapping, &mut |_, _| {}, &CancelFlag::new())
            .await
    }

    /// Run one ingestion, reporting `(processed, total)` after every batch.
    ///
    /// Returns the finalized ledger entry. Row-level and batch-level failures
    /// are folded into the entry's counts and error log; only a ledger
    /// create/finalize failure aborts the run.
    pub async fn run_with_progress(
        &self,
        source: ExtractSource,
        rows: &[RawRow],
        mapping: &MappingConfig,
        progress: &mut dyn FnMut(usize, usize),
        cancel: &CancelFlag,
    ) -> IngestResult<Snapshot> {
        let run_start = Instant::now();

        let mut snapshot = Snapshot::begin(source.file_name, source.file_size, rows.len() as u64);
        snapshot.source_sha256 = source.content_sha256;

        tracing::info!(
            snapshot_id = %snapshot.id,
            file_name = %snapshot.file_name,
            total_rows = snapshot.total_rows,
            backend = self.backend.backend_type(),
            "ingestion run started"
        );

        // Map before touching the ledger: a bad mapping config fails fast
        let mapped = map_rows(rows, mapping, snapshot.id)?;
        let row_errors = mapped.errors.len() as u64;

        let deduped = dedupe(mapped.records);

        self.backend
            .create_snapshot(&snapshot)
            .await
            .map_err(IngestError::LedgerFinalization)?;

        let writer = BatchWriter::new(&self.backend)
            .with_batch_size(self.batch_size)
            .with_max_retries(self.max_retries);
        let outcome = writer
            .write(snapshot.id, &deduped.unique, progress, cancel)
            .await;

        // Records never attempted (cancellation) neither landed nor failed a
        // write; they are accounted as skipped.
        let unattempted = deduped.unique.len() as u64 - outcome.attempted();

        snapshot.records_successful = outcome.successful;
        snapshot.records_failed = outcome.failed;
        snapshot.records_skipped =
            row_errors + deduped.stats.total_skipped() + unattempted;
        snapshot.error_log = outcome.errors.clone();

        snapshot.department_breakdown = match self.backend.department_rollup(snapshot.id).await {
            Ok(rollup) => rollup,
            Err(StorageError::Unsupported(_)) => {
                ledger::fold_departments(ledger::accepted_records(
                    &deduped.unique,
                    self.batch_size,
                    &outcome,
                ))
            }
            Err(e) => {
                tracing::warn!(error = %e, "grouped rollup failed; folding client-side");
                ledger::fold_departments(ledger::accepted_records(
                    &deduped.unique,
                    self.batch_size,
                    &outcome,
                ))
            }
        };
        snapshot.total_salary = ledger::total_salary(&snapshot.department_breakdown);

        snapshot.duration_ms = run_start.elapsed().as_millis() as u64;
        // Partial (even zero) success still completes; `Failed` is reserved
        // for the ledger write itself.
        snapshot.status = SnapshotStatus::Completed;

        debug_assert!(snapshot.accounting_balanced());

        if let Err(e) = self.backend.finalize_snapshot(&snapshot).await {
            tracing::error!(snapshot_id = %snapshot.id, error = %e, "ledger finalization failed");
            // Best effort: never leave the entry dangling in `processing`
            snapshot.status = SnapshotStatus::Failed;
            let _ = self.backend.finalize_snapshot(&snapshot).await;
            return Err(IngestError::LedgerFinalization(e));
        }

        tracing::info!(
            snapshot_id = %snapshot.id,
            successful = snapshot.records_successful,
            failed = snapshot.records_failed,
            skipped = snapshot.records_skipped,
            duration_ms = snapshot.duration_ms,
            records_per_second = outcome.records_per_second(),
            cancelled = outcome.cancelled,
            "ingestion run finalized"
        );

        Ok(snapshot)
    }

    /// Get a ledger entry by id
    pub async fn get_snapshot(&self, id: Uuid) -> StorageResult<Option<Snapshot>> {
        self.backend.get_snapshot(id).await
    }

    /// List all ledger entries, newest first
    pub async fn list_snapshots(&self) -> StorageResult<Vec<Snapshot>> {
        self.backend.list_snapshots().await
    }

    /// Count the employee records a snapshot owns
    pub async fn count_records(&self, snapshot_id: Uuid) -> StorageResult<u64> {
        self.backend.count_by_snapshot(snapshot_id).await
    }

    /// Fetch one page of a snapshot's records for the record views
    pub async fn fetch_records(
        &self,
        snapshot_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> StorageResult<Vec<Employee>> {
        self.backend.fetch_page(snapshot_id, offset, limit).await
    }

    /// Delete a ledger entry and every employee record it owns.
    ///
    /// Destructive and irreversible; this is the only path that removes
    /// snapshot data.
    pub async fn delete_snapshot(&self, id: Uuid) -> StorageResult<()> {
        tracing::warn!(snapshot_id = %id, "deleting snapshot and cascading to its records");
        self.backend.delete_snapshot(id).await
    }

    /// Compare two ledger entries by id (baseline older, current newer)
    pub async fn compare_snapshots(
        &self,
        baseline_id: Uuid,
        current_id: Uuid,
    ) -> IngestResult<ComparisonResult> {
        let baseline = self
            .backend
            .get_snapshot(baseline_id)
            .await?
            .ok_or(IngestError::SnapshotNotFound(baseline_id))?;
        let current = self
            .backend
            .get_snapshot(current_id)
            .await?
            .ok_or(IngestError::SnapshotNotFound(current_id))?;

        Ok(compare(&baseline, &current))
    }

    /// Check storage health
    pub async fn health_check(&self) -> StorageResult<bool> {
        self.backend.health_check().await
    }

    /// Close the storage connection
    pub async fn close(&self) -> StorageResult<()> {
        self.backend.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash() {
        let hash = compute_hash(b"hello world");
        // SHA256 of "hello world"
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_extract_source_with_content() {
        let source = ExtractSource::new("extract.csv", 11).with_content(b"hello world");
        assert_eq!(source.file_name, "extract.csv");
        assert_eq!(
            source.content_sha256.as_deref(),
            Some("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
        );
    }
}
