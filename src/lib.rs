//! Workforce Snapshot SDK - Bulk ingestion and snapshot reconciliation engine
//!
//! Provides the write and analysis paths behind an HR record dashboard:
//! - Field mapping from heterogeneous tabular extracts onto a canonical
//!   employee schema
//! - Deduplication by business identifier (last occurrence wins)
//! - Bounded-batch writes with per-batch failure isolation and progress
//!   reporting
//! - An immutable snapshot ledger with aggregate rollups per ingestion run
//! - Comparison of any two snapshots into headcount/cost deltas
//!
//! Storage goes through one [`storage::StorageBackend`] chosen at
//! construction time, with embedded (DuckDB) and remote (PostgreSQL)
//! realizations behind feature flags.

pub mod compare;
pub mod dedup;
pub mod ingest;
pub mod ledger;
pub mod mapper;
pub mod models;
pub mod storage;

// Re-export commonly used types
#[cfg(feature = "duckdb-backend")]
pub use storage::DuckDBBackend;
#[cfg(feature = "postgres-backend")]
pub use storage::PostgresBackend;
pub use storage::{StorageBackend, StorageConfig, StorageError, StorageResult};

pub use compare::{ComparisonResult, DepartmentChange, compare};
pub use dedup::{DedupResult, DedupStats, dedupe};
pub use ingest::{
    BatchWriter, CancelFlag, ExtractSource, IngestEngine, IngestError, IngestResult, WriteOutcome,
};
pub use mapper::{
    FieldRule, MapErrorKind, MappedRows, MappingConfig, MappingConfigError, RawRow, RowError,
    TargetField, ValueTransform, map_rows,
};

// Re-export models
pub use models::{
    BatchError, DepartmentStat, Employee, EmployeeStatus, ReductionProgram, ReductionStatus,
    Snapshot, SnapshotStatus,
};
