//! Core data model
//!
//! Persisted record types shared by the scan path and the DSR path:
//! data sources, scan runs, the discovered inventory tree and its PII
//! classifications, and data subject requests with their per-source tasks.

mod dsr;
mod inventory;
mod scan;
mod source;

pub use dsr::{
    aggregate_dsr_status, Dsr, DsrStatus, DsrTask, DsrType, TaskStatus,
};
pub use inventory::{
    DataEntity, DataField, DataInventory, PiiCategory, PiiClassification, SensitivityLevel,
    VerificationStatus,
};
pub use scan::{ScanRun, ScanStats, ScanStatus, ScanType};
pub use source::{ConnectionStatus, DataSource, DeletionMode, SourceKind, SourceSettings};
