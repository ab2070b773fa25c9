//! DuckDB storage backend implementation
//!
//! Provides an embedded record store using DuckDB for single-machine
//! deployments of the dashboard. Supports both file-based persistence and
//! in-memory mode.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use uuid::Uuid;

use super::schema::{SCHEMA_VERSION, StorageSchema};
use super::{StorageBackend, StorageError, StorageResult};
use crate::models::{DepartmentStat, Employee, Snapshot};

/// DuckDB storage backend
///
/// Embedded SQL store for employee records and the snapshot ledger.
pub struct DuckDBBackend {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

impl DuckDBBackend {
    /// Create a new DuckDB backend with a file-based database
    pub fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path)
            .map_err(|e| StorageError::ConnectionFailed(format!("Failed to open DuckDB: {}", e)))?;

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        })
    }

    /// Create an in-memory DuckDB backend
    ///
    /// Useful for testing or throwaway imports where persistence is not needed.
    pub fn in_memory() -> StorageResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            StorageError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(connection),
        })
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| StorageError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    /// Execute multiple SQL statements
    fn execute_batch(&self, sql: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| StorageError::QueryFailed(format!("Batch execute failed: {}", e)))
    }

    /// Decode one employee row. Explicit and total: every canonical field is
    /// read by position from the statement's column list.
    fn employee_from_row(row: &duckdb::Row<'_>) -> StorageResult<Employee> {
        let id: String = Self::get(row, 0)?;
        let snapshot_id: String = Self::get(row, 1)?;
        let status: String = Self::get(row, 6)?;
        let reduction_status: String = Self::get(row, 9)?;
        let created_at: String = Self::get(row, 11)?;

        Ok(Employee {
            id: parse_uuid(&id)?,
            snapshot_id: parse_uuid(&snapshot_id)?,
            employee_id: Self::get(row, 2)?,
            name: Self::get(row, 3)?,
            department: Self::get::<Option<String>>(row, 4)?.unwrap_or_default(),
            role: Self::get::<Option<String>>(row, 5)?.unwrap_or_default(),
            status: FromStr::from_str(&status).map_err(StorageError::SerializationError)?,
            fte_percent: Self::get(row, 7)?,
            base_salary: Self::get(row, 8)?,
            reduction: crate::models::ReductionProgram {
                status: FromStr::from_str(&reduction_status)
                    .map_err(StorageError::SerializationError)?,
                percent: Self::get(row, 10)?,
            },
            created_at: parse_timestamp(&created_at)?,
        })
    }

    /// Decode one snapshot ledger row.
    fn snapshot_from_row(row: &duckdb::Row<'_>) -> StorageResult<Snapshot> {
        let id: String = Self::get(row, 0)?;
        let status: String = Self::get(row, 11)?;
        let created_at: String = Self::get(row, 13)?;
        let breakdown: Option<String> = Self::get(row, 8)?;
        let error_log: Option<String> = Self::get(row, 10)?;

        Ok(Snapshot {
            id: parse_uuid(&id)?,
            file_name: Self::get(row, 1)?,
            file_size: Self::get::<i64>(row, 2)? as u64,
            total_rows: Self::get::<i64>(row, 3)? as u64,
            records_successful: Self::get::<i64>(row, 4)? as u64,
            records_failed: Self::get::<i64>(row, 5)? as u64,
            records_skipped: Self::get::<i64>(row, 6)? as u64,
            duration_ms: Self::get::<i64>(row, 7)? as u64,
            department_breakdown: decode_json_or_default(breakdown.as_deref())?,
            total_salary: Self::get(row, 9)?,
            error_log: decode_json_or_default(error_log.as_deref())?,
            status: FromStr::from_str(&status).map_err(StorageError::SerializationError)?,
            source_sha256: Self::get(row, 12)?,
            created_at: parse_timestamp(&created_at)?,
        })
    }

    fn get<T: duckdb::types::FromSql>(row: &duckdb::Row<'_>, idx: usize) -> StorageResult<T> {
        row.get(idx)
            .map_err(|e| StorageError::QueryFailed(format!("Column {} decode failed: {}", idx, e)))
    }
}

fn parse_uuid(s: &str) -> StorageResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| StorageError::SerializationError(format!("Bad uuid: {}", e)))
}

fn parse_timestamp(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::SerializationError(format!("Bad timestamp: {}", e)))
}

fn decode_json_or_default<T: serde::de::DeserializeOwned + Default>(
    json: Option<&str>,
) -> StorageResult<T> {
    match json {
        Some(s) if !s.is_empty() => serde_json::from_str(s)
            .map_err(|e| StorageError::SerializationError(format!("Bad JSON column: {}", e))),
        _ => Ok(T::default()),
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> StorageResult<String> {
    serde_json::to_string(value)
        .map_err(|e| StorageError::SerializationError(format!("JSON encode failed: {}", e)))
}

#[async_trait(?Send)]
impl StorageBackend for DuckDBBackend {
    async fn initialize(&self) -> StorageResult<()> {
        // Create tables
        self.execute_batch(StorageSchema::create_tables_sql())?;

        // Create indexes
        self.execute_batch(StorageSchema::create_indexes_sql())?;

        // Record schema version
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?, ?) ON CONFLICT (version) DO NOTHING",
            duckdb::params![SCHEMA_VERSION, Utc::now().to_rfc3339()],
        )
        .map_err(|e| StorageError::QueryFailed(format!("Failed to record schema version: {}", e)))?;

        Ok(())
    }

    async fn insert_batch(&self, snapshot_id: Uuid, records: &[Employee]) -> StorageResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;

        // One transaction per batch: the batch persists in full or not at all
        let tx = conn
            .transaction()
            .map_err(|e| StorageError::QueryFailed(format!("Begin failed: {}", e)))?;

        let base_order: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM employees WHERE snapshot_id = ?",
                duckdb::params![snapshot_id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| StorageError::QueryFailed(format!("Count failed: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    r#"
                INSERT INTO employees (
                    id, snapshot_id, employee_id, name, department, role, status,
                    fte_percent, base_salary, reduction_status, reduction_percent,
                    insert_order, created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                )
                .map_err(|e| StorageError::QueryFailed(format!("Prepare failed: {}", e)))?;

            for (i, record) in records.iter().enumerate() {
                stmt.execute(duckdb::params![
                    record.id.to_string(),
                    snapshot_id.to_string(),
                    &record.employee_id,
                    &record.name,
                    &record.department,
                    &record.role,
                    record.status.to_string(),
                    record.fte_percent,
                    record.base_salary,
                    record.reduction.status.to_string(),
                    record.reduction.percent,
                    base_order + i as i64,
                    record.created_at.to_rfc3339(),
                ])
                .map_err(|e| StorageError::QueryFailed(format!("Insert failed: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| StorageError::QueryFailed(format!("Commit failed: {}", e)))?;

        Ok(records.len())
    }

    async fn count_by_snapshot(&self, snapshot_id: Uuid) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM employees WHERE snapshot_id = ?",
                duckdb::params![snapshot_id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| StorageError::QueryFailed(format!("Count failed: {}", e)))?;
        Ok(count as u64)
    }

    async fn fetch_page(
        &self,
        snapshot_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> StorageResult<Vec<Employee>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r#"
            SELECT id, snapshot_id, employee_id, name, department, role, status,
                   fte_percent, base_salary, reduction_status, reduction_percent, created_at
            FROM employees
            WHERE snapshot_id = ?
            ORDER BY insert_order
            LIMIT ? OFFSET ?
            "#,
            )
            .map_err(|e| StorageError::QueryFailed(format!("Prepare failed: {}", e)))?;

        let mut rows = stmt
            .query(duckdb::params![
                snapshot_id.to_string(),
                limit as i64,
                offset as i64
            ])
            .map_err(|e| StorageError::QueryFailed(format!("Query failed: {}", e)))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| StorageError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            records.push(Self::employee_from_row(row)?);
        }

        Ok(records)
    }

    async fn delete_by_snapshot(&self, snapshot_id: Uuid) -> StorageResult<u64> {
        let conn = self.lock()?;
        let deleted = conn
            .execute(
                "DELETE FROM employees WHERE snapshot_id = ?",
                duckdb::params![snapshot_id.to_string()],
            )
            .map_err(|e| StorageError::QueryFailed(format!("Delete failed: {}", e)))?;
        Ok(deleted as u64)
    }

    async fn department_rollup(
        &self,
        snapshot_id: Uuid,
    ) -> StorageResult<BTreeMap<String, DepartmentStat>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r#"
            SELECT department, COUNT(*) AS count, SUM(base_salary) AS total_salary
            FROM employees
            WHERE snapshot_id = ?
            GROUP BY department
            ORDER BY department
            "#,
            )
            .map_err(|e| StorageError::QueryFailed(format!("Prepare failed: {}", e)))?;

        let mut rows = stmt
            .query(duckdb::params![snapshot_id.to_string()])
            .map_err(|e| StorageError::QueryFailed(format!("Query failed: {}", e)))?;

        let mut rollup = BTreeMap::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| StorageError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            let department: Option<String> = Self::get(row, 0)?;
            let count: i64 = Self::get(row, 1)?;
            let total_salary: Option<f64> = Self::get(row, 2)?;
            rollup.insert(
                department.unwrap_or_default(),
                DepartmentStat {
                    count: count as u64,
                    total_salary: total_salary.unwrap_or(0.0),
                },
            );
        }

        Ok(rollup)
    }

    async fn create_snapshot(&self, snapshot: &Snapshot) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO snapshots (
                id, file_name, file_size, total_rows, records_successful,
                records_failed, records_skipped, duration_ms, department_breakdown,
                total_salary, error_log, status, source_sha256, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            duckdb::params![
                snapshot.id.to_string(),
                &snapshot.file_name,
                snapshot.file_size as i64,
                snapshot.total_rows as i64,
                snapshot.records_successful as i64,
                snapshot.records_failed as i64,
                snapshot.records_skipped as i64,
                snapshot.duration_ms as i64,
                encode_json(&snapshot.department_breakdown)?,
                snapshot.total_salary,
                encode_json(&snapshot.error_log)?,
                snapshot.status.to_string(),
                snapshot.source_sha256.as_deref(),
                snapshot.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StorageError::QueryFailed(format!("Snapshot insert failed: {}", e)))?;

        Ok(())
    }

    async fn finalize_snapshot(&self, snapshot: &Snapshot) -> StorageResult<()> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                r#"
            UPDATE snapshots SET
                records_successful = ?,
                records_failed = ?,
                records_skipped = ?,
                duration_ms = ?,
                department_breakdown = ?,
                total_salary = ?,
                error_log = ?,
                status = ?,
                source_sha256 = ?
            WHERE id = ?
            "#,
                duckdb::params![
                    snapshot.records_successful as i64,
                    snapshot.records_failed as i64,
                    snapshot.records_skipped as i64,
                    snapshot.duration_ms as i64,
                    encode_json(&snapshot.department_breakdown)?,
                    snapshot.total_salary,
                    encode_json(&snapshot.error_log)?,
                    snapshot.status.to_string(),
                    snapshot.source_sha256.as_deref(),
                    snapshot.id.to_string(),
                ],
            )
            .map_err(|e| StorageError::QueryFailed(format!("Snapshot update failed: {}", e)))?;

        if updated == 0 {
            return Err(StorageError::SnapshotNotFound(snapshot.id));
        }

        Ok(())
    }

    async fn get_snapshot(&self, id: Uuid) -> StorageResult<Option<Snapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r#"
            SELECT id, file_name, file_size, total_rows, records_successful,
                   records_failed, records_skipped, duration_ms, department_breakdown,
                   total_salary, error_log, status, source_sha256, created_at
            FROM snapshots
            WHERE id = ?
            "#,
            )
            .map_err(|e| StorageError::QueryFailed(format!("Prepare failed: {}", e)))?;

        let mut rows = stmt
            .query(duckdb::params![id.to_string()])
            .map_err(|e| StorageError::QueryFailed(format!("Query failed: {}", e)))?;

        match rows
            .next()
            .map_err(|e| StorageError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            Some(row) => Ok(Some(Self::snapshot_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn list_snapshots(&self) -> StorageResult<Vec<Snapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r#"
            SELECT id, file_name, file_size, total_rows, records_successful,
                   records_failed, records_skipped, duration_ms, department_breakdown,
                   total_salary, error_log, status, source_sha256, created_at
            FROM snapshots
            ORDER BY created_at DESC
            "#,
            )
            .map_err(|e| StorageError::QueryFailed(format!("Prepare failed: {}", e)))?;

        let mut rows = stmt
            .query([])
            .map_err(|e| StorageError::QueryFailed(format!("Query failed: {}", e)))?;

        let mut snapshots = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| StorageError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            snapshots.push(Self::snapshot_from_row(row)?);
        }

        Ok(snapshots)
    }

    async fn delete_snapshot(&self, id: Uuid) -> StorageResult<()> {
        let mut conn = self.lock()?;

        // Employee rows go first, then the ledger entry, in one transaction
        let tx = conn
            .transaction()
            .map_err(|e| StorageError::QueryFailed(format!("Begin failed: {}", e)))?;

        tx.execute(
            "DELETE FROM employees WHERE snapshot_id = ?",
            duckdb::params![id.to_string()],
        )
        .map_err(|e| StorageError::QueryFailed(format!("Cascade delete failed: {}", e)))?;

        let deleted = tx
            .execute(
                "DELETE FROM snapshots WHERE id = ?",
                duckdb::params![id.to_string()],
            )
            .map_err(|e| StorageError::QueryFailed(format!("Snapshot delete failed: {}", e)))?;

        tx.commit()
            .map_err(|e| StorageError::QueryFailed(format!("Commit failed: {}", e)))?;

        if deleted == 0 {
            return Err(StorageError::SnapshotNotFound(id));
        }

        Ok(())
    }

    async fn health_check(&self) -> StorageResult<bool> {
        let conn = self.lock()?;
        let one: i64 = conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(|e| StorageError::QueryFailed(format!("Health check failed: {}", e)))?;
        Ok(one == 1)
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }

    async fn close(&self) -> StorageResult<()> {
        // DuckDB connection is closed when dropped
        Ok(())
    }
}
