//! Audit trail
//!
//! Append-only record of privileged operations (scans, exports, deletions,
//! DSR decisions). Writes are best-effort and asynchronous; a failed audit
//! write is logged but never fails the audited operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub tenant_id: String,
    pub actor: String,
    pub action: String,
    pub resource: String,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(tenant_id: &str, actor: &str, action: &str, resource: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            actor: actor.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
            detail: None,
            at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Appends audit entries to a JSON-lines file
#[derive(Clone)]
pub struct AuditLog {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl AuditLog {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            path: base_dir.join("audit.jsonl"),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Record an entry without blocking the caller
    pub fn record(&self, entry: AuditEntry) {
        let path = self.path.clone();
        let lock = self.write_lock.clone();
        tokio::spawn(async move {
            let _guard = lock.lock().await;
            if let Err(e) = append_line(&path, &entry).await {
                tracing::warn!("Failed to write audit entry for {}: {}", entry.resource, e);
            }
        });
    }

    /// All recorded entries, oldest first
    pub async fn entries(&self) -> std::io::Result<Vec<AuditEntry>> {
        let _guard = self.write_lock.lock().await;
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

async fn append_line(path: &PathBuf, entry: &AuditEntry) -> std::io::Result<()> {
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    Ok(())
}
