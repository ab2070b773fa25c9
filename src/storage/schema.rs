//! Storage schema definitions
//!
//! Provides SQL schema definitions that work with both DuckDB and PostgreSQL.
//! Ids and timestamps are stored as TEXT (UUID strings, RFC 3339) and the
//! rollup/error-log aggregates as serialized JSON TEXT, so the explicit
//! row-to-model mapping is identical across backends and no per-backend
//! type codec is needed. These columns are read back whole and never
//! filtered on.

/// Schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Storage schema helper
pub struct StorageSchema;

impl StorageSchema {
    /// Get the initial schema creation SQL
    ///
    /// This SQL is compatible with both DuckDB and PostgreSQL.
    pub fn create_tables_sql() -> &'static str {
        r#"
-- Snapshot ledger: one row per ingestion run
CREATE TABLE IF NOT EXISTS snapshots (
    id TEXT PRIMARY KEY,
    file_name TEXT NOT NULL,
    file_size BIGINT NOT NULL DEFAULT 0,
    total_rows BIGINT NOT NULL DEFAULT 0,
    records_successful BIGINT NOT NULL DEFAULT 0,
    records_failed BIGINT NOT NULL DEFAULT 0,
    records_skipped BIGINT NOT NULL DEFAULT 0,
    duration_ms BIGINT NOT NULL DEFAULT 0,
    department_breakdown TEXT,
    total_salary DOUBLE PRECISION NOT NULL DEFAULT 0,
    error_log TEXT,
    status TEXT NOT NULL DEFAULT 'processing',
    source_sha256 TEXT,
    created_at TEXT NOT NULL
);

-- Employee records, weakly owned by their snapshot
CREATE TABLE IF NOT EXISTS employees (
    id TEXT PRIMARY KEY,
    snapshot_id TEXT NOT NULL REFERENCES snapshots(id),
    employee_id TEXT NOT NULL,
    name TEXT NOT NULL,
    department TEXT,
    role TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    fte_percent DOUBLE PRECISION NOT NULL DEFAULT 100,
    base_salary DOUBLE PRECISION NOT NULL DEFAULT 0,
    reduction_status TEXT NOT NULL DEFAULT 'none',
    reduction_percent DOUBLE PRECISION NOT NULL DEFAULT 0,
    insert_order BIGINT NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE(snapshot_id, employee_id)
);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT
);
"#
    }

    /// Get index creation SQL for performance optimization
    pub fn create_indexes_sql() -> &'static str {
        r#"
-- Owner lookups (count, paginate, cascade delete)
CREATE INDEX IF NOT EXISTS idx_employees_snapshot ON employees(snapshot_id);

-- Grouped department rollups
CREATE INDEX IF NOT EXISTS idx_employees_snapshot_department ON employees(snapshot_id, department);

-- Ledger listing, newest first
CREATE INDEX IF NOT EXISTS idx_snapshots_created ON snapshots(created_at DESC);
"#
    }

    /// Drop all tables (for testing/reset)
    pub fn drop_all_tables_sql() -> &'static str {
        r#"
DROP TABLE IF EXISTS employees;
DROP TABLE IF EXISTS snapshots;
DROP TABLE IF EXISTS schema_version;
"#
    }
}

/// SQL for the snapshot ledger
pub mod snapshot_sql {
    pub const INSERT: &str = r#"
INSERT INTO snapshots (
    id, file_name, file_size, total_rows, records_successful, records_failed,
    records_skipped, duration_ms, department_breakdown, total_salary,
    error_log, status, source_sha256, created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
"#;

    pub const FINALIZE: &str = r#"
UPDATE snapshots SET
    records_successful = $2,
    records_failed = $3,
    records_skipped = $4,
    duration_ms = $5,
    department_breakdown = $6,
    total_salary = $7,
    error_log = $8,
    status = $9,
    source_sha256 = $10
WHERE id = $1
"#;

    pub const SELECT_BY_ID: &str = "SELECT id, file_name, file_size, total_rows, records_successful, records_failed, records_skipped, duration_ms, department_breakdown, total_salary, error_log, status, source_sha256, created_at FROM snapshots WHERE id = $1";
    pub const SELECT_ALL: &str = "SELECT id, file_name, file_size, total_rows, records_successful, records_failed, records_skipped, duration_ms, department_breakdown, total_salary, error_log, status, source_sha256, created_at FROM snapshots ORDER BY created_at DESC";
    pub const DELETE: &str = "DELETE FROM snapshots WHERE id = $1";
}

/// SQL for employee records
pub mod employee_sql {
    pub const INSERT: &str = r#"
INSERT INTO employees (
    id, snapshot_id, employee_id, name, department, role, status,
    fte_percent, base_salary, reduction_status, reduction_percent,
    insert_order, created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
"#;

    pub const SELECT_PAGE: &str = r#"
SELECT id, snapshot_id, employee_id, name, department, role, status,
       fte_percent, base_salary, reduction_status, reduction_percent, created_at
FROM employees
WHERE snapshot_id = $1
ORDER BY insert_order
OFFSET $2 LIMIT $3
"#;

    pub const COUNT_BY_SNAPSHOT: &str =
        "SELECT COUNT(*) AS count FROM employees WHERE snapshot_id = $1";

    pub const DELETE_BY_SNAPSHOT: &str = "DELETE FROM employees WHERE snapshot_id = $1";

    pub const DEPARTMENT_ROLLUP: &str = r#"
SELECT department, COUNT(*) AS count, SUM(base_salary) AS total_salary
FROM employees
WHERE snapshot_id = $1
GROUP BY department
ORDER BY department
"#;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_sql_not_empty() {
        assert!(!StorageSchema::create_tables_sql().is_empty());
        assert!(!StorageSchema::create_indexes_sql().is_empty());
    }

    #[test]
    fn test_schema_version() {
        assert_eq!(SCHEMA_VERSION, 1);
    }
}
