//! Field mapping for tabular extracts
//!
//! Maps heterogeneous source columns onto the canonical employee schema
//! using a caller-supplied mapping configuration. Rows that fail validation
//! are reported as structured row errors, never silently dropped; the
//! ingestion engine counts them toward `records_skipped`.
//!
//! Mapping is a pure transformation: no storage access, no side effects.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{Employee, EmployeeStatus, ReductionStatus};

/// Raw source row: source column name -> raw cell value
///
/// Cell values arrive as JSON values from the import wizard (strings for
/// text cells, numbers for numeric cells, null for empty cells).
pub type RawRow = serde_json::Map<String, Value>;

/// Canonical employee fields a source column can map onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetField {
    EmployeeId,
    Name,
    Department,
    Role,
    Status,
    FtePercent,
    BaseSalary,
    ReductionStatus,
    ReductionPercent,
}

impl std::fmt::Display for TargetField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TargetField::EmployeeId => "employee_id",
            TargetField::Name => "name",
            TargetField::Department => "department",
            TargetField::Role => "role",
            TargetField::Status => "status",
            TargetField::FtePercent => "fte_percent",
            TargetField::BaseSalary => "base_salary",
            TargetField::ReductionStatus => "reduction_status",
            TargetField::ReductionPercent => "reduction_percent",
        };
        write!(f, "{}", name)
    }
}

/// Optional value transform applied before a cell is assigned to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTransform {
    /// Strip a trailing `%` and parse as a number ("85%" -> 85)
    Percent,
    /// Parse as a number, tolerating thousands separators ("52,000" -> 52000)
    Number,
    /// Trim surrounding whitespace
    Trim,
}

/// One source-column mapping rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    /// Canonical field the source column feeds
    pub target: TargetField,
    /// Transform applied to the raw cell before parsing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<ValueTransform>,
}

/// Mapping configuration: source column name -> target rule
///
/// Source columns absent from the configuration are ignored. Configurations
/// are plain serde data, so callers can persist them as named, reusable
/// presets (TOML or JSON).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Column rules keyed by source column name
    pub columns: HashMap<String, FieldRule>,
}

impl MappingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule mapping `source` onto `target` (builder style)
    pub fn map(mut self, source: impl Into<String>, target: TargetField) -> Self {
        self.columns.insert(
            source.into(),
            FieldRule {
                target,
                transform: None,
            },
        );
        self
    }

    /// Add a rule with a value transform (builder style)
    pub fn map_with(
        mut self,
        source: impl Into<String>,
        target: TargetField,
        transform: ValueTransform,
    ) -> Self {
        self.columns.insert(
            source.into(),
            FieldRule {
                target,
                transform: Some(transform),
            },
        );
        self
    }

    /// Check the configuration covers the fields every record needs.
    ///
    /// The business id and name must be mapped; everything else has a
    /// documented default.
    pub fn validate(&self) -> Result<(), MappingConfigError> {
        for required in [TargetField::EmployeeId, TargetField::Name] {
            if !self.columns.values().any(|rule| rule.target == required) {
                return Err(MappingConfigError::UnmappedRequiredField(
                    required.to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Error in the mapping configuration itself (fails the whole run, not a row)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingConfigError {
    #[error("mapping configuration does not map required field: {0}")]
    UnmappedRequiredField(String),
}

/// Why a single row failed validation
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MapErrorKind {
    #[error("missing required field: {field}")]
    MissingField { field: String },
    #[error("unparsable number for {field}: '{value}'")]
    InvalidNumber { field: String, value: String },
    #[error("unparsable value for {field}: '{value}'")]
    InvalidEnum { field: String, value: String },
    #[error("{field} out of range: {value}")]
    OutOfRange { field: String, value: f64 },
}

/// Row-level validation error: which row, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// 0-indexed position of the row in the submitted extract
    pub row_index: usize,
    pub reason: MapErrorKind,
}

/// Result of mapping a full extract
#[derive(Debug, Default)]
pub struct MappedRows {
    /// Canonical records, in source row order
    pub records: Vec<Employee>,
    /// One entry per row excluded by validation
    pub errors: Vec<RowError>,
}

/// Map raw rows onto canonical employee records.
///
/// Each row yields either a record or a `RowError`; the two vectors together
/// account for every input row. `snapshot_id` is stamped onto every record
/// as the owning snapshot reference.
pub fn map_rows(
    rows: &[RawRow],
    config: &MappingConfig,
    snapshot_id: Uuid,
) -> Result<MappedRows, MappingConfigError> {
    config.validate()?;

    let mut result = MappedRows::default();

    for (row_index, row) in rows.iter().enumerate() {
        match map_row(row, config, snapshot_id) {
            Ok(record) => result.records.push(record),
            Err(reason) => {
                tracing::debug!(row_index, %reason, "row excluded by validation");
                result.errors.push(RowError { row_index, reason });
            }
        }
    }

    Ok(result)
}

/// Map one row. Missing business ids map to an empty string so the
/// deduplicator can account for them as blank-id skips.
fn map_row(
    row: &RawRow,
    config: &MappingConfig,
    snapshot_id: Uuid,
) -> Result<Employee, MapErrorKind> {
    let mut record = Employee::new("", "", snapshot_id);
    let mut name_seen = false;

    for (source, rule) in &config.columns {
        let cell = match row.get(source) {
            Some(value) => cell_to_string(value, rule.transform),
            None => None,
        };

        match rule.target {
            TargetField::EmployeeId => {
                record.employee_id = cell.unwrap_or_default();
            }
            TargetField::Name => {
                if let Some(name) = cell.filter(|n| !n.is_empty()) {
                    record.name = name;
                    name_seen = true;
                }
            }
            TargetField::Department => {
                record.department = cell.unwrap_or_default();
            }
            TargetField::Role => {
                record.role = cell.unwrap_or_default();
            }
            TargetField::Status => {
                if let Some(value) = cell.filter(|v| !v.is_empty()) {
                    record.status = EmployeeStatus::from_str(&value).map_err(|_| {
                        MapErrorKind::InvalidEnum {
                            field: rule.target.to_string(),
                            value,
                        }
                    })?;
                }
            }
            TargetField::FtePercent => {
                if let Some(value) = cell.filter(|v| !v.is_empty()) {
                    let fte = parse_number(&value, rule.target)?;
                    if !(0.0..=100.0).contains(&fte) {
                        return Err(MapErrorKind::OutOfRange {
                            field: rule.target.to_string(),
                            value: fte,
                        });
                    }
                    record.fte_percent = fte;
                }
            }
            TargetField::BaseSalary => {
                if let Some(value) = cell.filter(|v| !v.is_empty()) {
                    record.base_salary = parse_number(&value, rule.target)?;
                }
            }
            TargetField::ReductionStatus => {
                if let Some(value) = cell {
                    record.reduction.status = ReductionStatus::from_str(&value).map_err(|_| {
                        MapErrorKind::InvalidEnum {
                            field: rule.target.to_string(),
                            value,
                        }
                    })?;
                }
            }
            TargetField::ReductionPercent => {
                if let Some(value) = cell.filter(|v| !v.is_empty()) {
                    record.reduction.percent = parse_number(&value, rule.target)?;
                }
            }
        }
    }

    if !name_seen {
        return Err(MapErrorKind::MissingField {
            field: TargetField::Name.to_string(),
        });
    }

    Ok(record)
}

/// Render a raw cell to a trimmed string, applying the rule's transform.
/// Returns `None` for null cells.
fn cell_to_string(value: &Value, transform: Option<ValueTransform>) -> Option<String> {
    let raw = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };

    let trimmed = raw.trim();
    let transformed = match transform {
        Some(ValueTransform::Percent) => trimmed.trim_end_matches('%').trim_end().to_string(),
        Some(ValueTransform::Number) => trimmed.replace(',', ""),
        Some(ValueTransform::Trim) | None => trimmed.to_string(),
    };

    Some(transformed)
}

fn parse_number(value: &str, field: TargetField) -> Result<f64, MapErrorKind> {
    value
        .parse::<f64>()
        .map_err(|_| MapErrorKind::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
        })
}
