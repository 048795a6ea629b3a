//! Scan run records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scan mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    /// Enumerate everything the backend exposes
    Full,
    /// Restrict discovery to items changed since the last completed scan
    Incremental,
}

/// Scan run lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    /// Whether the run has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Final statistics for a completed scan
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub duration_ms: i64,
    pub entities_scanned: u64,
    pub fields_scanned: u64,
    pub pii_fields_found: u64,
}

/// One execution attempt against a data source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRun {
    pub id: String,
    pub source_id: String,
    pub tenant_id: String,
    pub scan_type: ScanType,
    pub status: ScanStatus,
    /// Progress percentage (0-100)
    pub progress: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub stats: Option<ScanStats>,
    pub created_at: DateTime<Utc>,
}

impl ScanRun {
    /// Create a new pending run
    pub fn new(
        source_id: impl Into<String>,
        tenant_id: impl Into<String>,
        scan_type: ScanType,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            tenant_id: tenant_id.into(),
            scan_type,
            status: ScanStatus::Pending,
            progress: 0,
            started_at: None,
            completed_at: None,
            error: None,
            stats: None,
            created_at: Utc::now(),
        }
    }

    /// Mark the run as started
    pub fn start(&mut self) {
        self.status = ScanStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark the run completed with final stats; duration is derived from
    /// the start timestamp
    pub fn complete(&mut self, mut stats: ScanStats) {
        let now = Utc::now();
        if let Some(started) = self.started_at {
            stats.duration_ms = (now - started).num_milliseconds();
        }
        self.status = ScanStatus::Completed;
        self.progress = 100;
        self.completed_at = Some(now);
        self.stats = Some(stats);
    }

    /// Mark the run failed with the given error message
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = ScanStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }
}
