//! Storage backend abstraction for the record store
//!
//! This module provides the storage abstraction the ingestion engine writes
//! through:
//! - DuckDB: embedded database for single-machine deployments
//! - PostgreSQL: for server deployments
//!
//! A backend is chosen once at construction time and injected into the
//! engine; call sites never branch on a runtime backend flag. Each backend
//! maps its rows into the canonical models with an explicit, total mapping
//! function; unknown columns are never passed through.

use async_trait::async_trait;
use std::collections::BTreeMap;
use uuid::Uuid;

// Re-export implementations based on features
#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

#[cfg(feature = "postgres-backend")]
pub mod postgres;

pub mod config;
pub mod schema;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDBBackend;

#[cfg(feature = "postgres-backend")]
pub use self::postgres::PostgresBackend;

pub use config::StorageConfig;
pub use schema::StorageSchema;

use crate::models::{DepartmentStat, Employee, Snapshot};

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to connect to the store
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transient backend outage (network, timeout); safe to retry
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Snapshot ledger entry not found
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(Uuid),

    /// Operation not supported by this backend
    #[error("Operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

impl StorageError {
    /// Whether a retry at batch granularity could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage backend trait for the employee table and the snapshot ledger
///
/// All operations are async. A batch write is atomic from the caller's point
/// of view: a batch either persists in full or the call returns an error and
/// nothing from it persists.
#[async_trait(?Send)]
pub trait StorageBackend: Send + Sync {
    /// Initialize storage schema (run migrations)
    ///
    /// Creates all required tables and indexes if they don't exist.
    async fn initialize(&self) -> StorageResult<()>;

    /// Insert one batch of employee records for a snapshot
    ///
    /// # Arguments
    /// * `snapshot_id` - Owning snapshot
    /// * `records` - The batch, written as one unit
    ///
    /// # Returns
    /// Number of records inserted (the full batch on success)
    async fn insert_batch(
        &self,
        snapshot_id: Uuid,
        records: &[Employee],
    ) -> StorageResult<usize>;

    /// Count employee records owned by a snapshot
    async fn count_by_snapshot(&self, snapshot_id: Uuid) -> StorageResult<u64>;

    /// Fetch one page of a snapshot's employee records, in insertion order
    ///
    /// # Arguments
    /// * `offset` - Records to skip
    /// * `limit` - Maximum records to return
    async fn fetch_page(
        &self,
        snapshot_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> StorageResult<Vec<Employee>>;

    /// Delete all employee records owned by a snapshot
    ///
    /// # Returns
    /// Number of records deleted
    async fn delete_by_snapshot(&self, snapshot_id: Uuid) -> StorageResult<u64>;

    /// Grouped department rollup computed inside the store
    ///
    /// Backends that cannot aggregate server-side return
    /// `StorageError::Unsupported`; the engine then folds client-side.
    async fn department_rollup(
        &self,
        snapshot_id: Uuid,
    ) -> StorageResult<BTreeMap<String, DepartmentStat>>;

    /// Persist a new ledger entry at the start of a run (status=processing)
    async fn create_snapshot(&self, snapshot: &Snapshot) -> StorageResult<()>;

    /// Write the final counts, rollups, error log and terminal status.
    ///
    /// Called exactly once per run; the entry is immutable afterwards.
    async fn finalize_snapshot(&self, snapshot: &Snapshot) -> StorageResult<()>;

    /// Get a ledger entry by id
    async fn get_snapshot(&self, id: Uuid) -> StorageResult<Option<Snapshot>>;

    /// List all ledger entries, newest first
    async fn list_snapshots(&self) -> StorageResult<Vec<Snapshot>>;

    /// Delete a ledger entry AND all employee records it owns.
    ///
    /// Destructive and irreversible; only reachable through an explicit
    /// engine call, never as a side effect of another operation.
    async fn delete_snapshot(&self, id: Uuid) -> StorageResult<()>;

    /// Check if the store is healthy and accessible
    async fn health_check(&self) -> StorageResult<bool>;

    /// Get the storage backend type name ("duckdb" or "postgres")
    fn backend_type(&self) -> &'static str;

    /// Close the connection
    async fn close(&self) -> StorageResult<()>;
}
