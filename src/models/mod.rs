//! Models module for the SDK
//!
//! Defines the canonical employee record and the snapshot ledger entry that
//! every other component maps into or out of.

pub mod employee;
pub mod snapshot;

pub use employee::{Employee, EmployeeStatus, ReductionProgram, ReductionStatus};
pub use snapshot::{BatchError, DepartmentStat, Snapshot, SnapshotStatus};
