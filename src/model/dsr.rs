//! Data subject requests and their per-source execution tasks

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of data subject request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DsrType {
    Access,
    Erasure,
    Correction,
    Portability,
    Nomination,
    Appeal,
}

impl std::fmt::Display for DsrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Erasure => write!(f, "erasure"),
            Self::Correction => write!(f, "correction"),
            Self::Portability => write!(f, "portability"),
            Self::Nomination => write!(f, "nomination"),
            Self::Appeal => write!(f, "appeal"),
        }
    }
}

impl std::str::FromStr for DsrType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "access" => Ok(Self::Access),
            "erasure" => Ok(Self::Erasure),
            "correction" => Ok(Self::Correction),
            "portability" => Ok(Self::Portability),
            "nomination" => Ok(Self::Nomination),
            "appeal" => Ok(Self::Appeal),
            other => Err(format!("unknown DSR type: {}", other)),
        }
    }
}

/// DSR lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DsrStatus {
    Pending,
    IdentityVerification,
    Approved,
    Rejected,
    InProgress,
    Completed,
    Failed,
    Verified,
    VerificationFailed,
}

impl DsrStatus {
    /// Legal transitions of the DSR state machine
    pub fn can_transition_to(&self, next: DsrStatus) -> bool {
        use DsrStatus::*;
        matches!(
            (self, next),
            (Pending, IdentityVerification)
                | (Pending, Approved)
                | (Pending, Rejected)
                | (IdentityVerification, Approved)
                | (IdentityVerification, Rejected)
                | (Approved, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Completed, Verified)
                | (Completed, VerificationFailed)
                | (Failed, Verified)
                | (Failed, VerificationFailed)
        )
    }
}

impl std::fmt::Display for DsrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::IdentityVerification => "identity_verification",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Verified => "verified",
            Self::VerificationFailed => "verification_failed",
        };
        write!(f, "{}", s)
    }
}

/// A subject request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dsr {
    pub id: String,
    pub tenant_id: String,
    pub dsr_type: DsrType,
    pub status: DsrStatus,
    /// Arbitrary subject identifiers (e.g. email, user_id) used to locate
    /// the subject's rows in each source
    pub subject: HashMap<String, String>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Dsr {
    /// Create a new pending DSR
    pub fn new(
        tenant_id: impl Into<String>,
        dsr_type: DsrType,
        subject: HashMap<String, String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            dsr_type,
            status: DsrStatus::Pending,
            subject,
            sla_deadline: None,
            reason: None,
            notes: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Apply a status transition, rejecting illegal ones without mutation
    pub fn transition(&mut self, next: DsrStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::StateTransition(format!(
                "DSR {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        if matches!(next, DsrStatus::Completed | DsrStatus::Failed) {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// Execution state of one DSR task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Verified,
    Failed,
    ManualActionRequired,
}

impl TaskStatus {
    /// Whether the task has finished, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Verified | Self::Failed | Self::ManualActionRequired
        )
    }

    /// Terminal states that do not count as failures when deriving the
    /// DSR-level outcome. ManualActionRequired blocks nothing: the DSR
    /// completes and the manual work is surfaced separately.
    pub fn is_success_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Verified | Self::ManualActionRequired)
    }
}

/// The unit of DSR execution scoped to one data source
///
/// The status field is owned exclusively by the DSR executor once the
/// task has been created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DsrTask {
    pub id: String,
    pub dsr_id: String,
    pub source_id: String,
    pub tenant_id: String,
    pub task_type: DsrType,
    pub status: TaskStatus,
    /// Opaque result payload (counts, exported records, notes)
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DsrTask {
    pub fn new(dsr: &Dsr, source_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            dsr_id: dsr.id.clone(),
            source_id: source_id.into(),
            tenant_id: dsr.tenant_id.clone(),
            task_type: dsr.dsr_type,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Derive the DSR-level outcome from its tasks' statuses.
///
/// Returns `None` while any task is still non-terminal. Any failed task
/// dominates; otherwise all tasks reached a success-terminal state and the
/// DSR is completed. Every task participates, none is dropped.
pub fn aggregate_dsr_status(tasks: &[DsrTask]) -> Option<DsrStatus> {
    if tasks.iter().any(|t| !t.status.is_terminal()) {
        return None;
    }
    let failed = tasks.iter().filter(|t| t.status == TaskStatus::Failed).count();
    if failed > 0 {
        Some(DsrStatus::Failed)
    } else {
        Some(DsrStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_dsr(dsr_type: DsrType) -> Dsr {
        let mut subject = HashMap::new();
        subject.insert("email".to_string(), "jane@example.com".to_string());
        Dsr::new("tenant-1", dsr_type, subject)
    }

    #[test]
    fn test_legal_transitions() {
        let mut dsr = make_dsr(DsrType::Erasure);
        dsr.transition(DsrStatus::IdentityVerification).unwrap();
        dsr.transition(DsrStatus::Approved).unwrap();
        dsr.transition(DsrStatus::InProgress).unwrap();
        dsr.transition(DsrStatus::Completed).unwrap();
        assert!(dsr.completed_at.is_some());
        dsr.transition(DsrStatus::Verified).unwrap();
    }

    #[test]
    fn test_illegal_transition_is_rejected_without_mutation() {
        let mut dsr = make_dsr(DsrType::Access);
        let err = dsr.transition(DsrStatus::InProgress).unwrap_err();
        assert!(matches!(err, crate::error::Error::StateTransition(_)));
        assert_eq!(dsr.status, DsrStatus::Pending);
        assert!(dsr.completed_at.is_none());
    }

    #[test]
    fn test_double_execution_blocked() {
        let mut dsr = make_dsr(DsrType::Access);
        dsr.transition(DsrStatus::Approved).unwrap();
        dsr.transition(DsrStatus::InProgress).unwrap();
        // Already in progress, a second execution attempt must fail
        assert!(dsr.transition(DsrStatus::InProgress).is_err());
    }

    #[test]
    fn test_aggregate_all_completed() {
        let dsr = make_dsr(DsrType::Access);
        let mut tasks = vec![DsrTask::new(&dsr, "src-1"), DsrTask::new(&dsr, "src-2")];
        tasks[0].status = TaskStatus::Completed;
        tasks[1].status = TaskStatus::ManualActionRequired;
        assert_eq!(aggregate_dsr_status(&tasks), Some(DsrStatus::Completed));
    }

    #[test]
    fn test_aggregate_failure_dominates() {
        let dsr = make_dsr(DsrType::Erasure);
        let mut tasks = vec![DsrTask::new(&dsr, "src-1"), DsrTask::new(&dsr, "src-2")];
        tasks[0].status = TaskStatus::Completed;
        tasks[1].status = TaskStatus::Failed;
        assert_eq!(aggregate_dsr_status(&tasks), Some(DsrStatus::Failed));
    }

    #[test]
    fn test_aggregate_waits_for_all_tasks() {
        let dsr = make_dsr(DsrType::Erasure);
        let mut tasks = vec![DsrTask::new(&dsr, "src-1"), DsrTask::new(&dsr, "src-2")];
        tasks[0].status = TaskStatus::Failed;
        tasks[1].status = TaskStatus::Running;
        assert_eq!(aggregate_dsr_status(&tasks), None);
    }
}
