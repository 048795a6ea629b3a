//! Scan run repository

use super::{load_json_files, persist_record};
use crate::error::{Error, Result};
use crate::model::{ScanRun, ScanStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory scan run store backed by JSON files
pub struct ScanStore {
    dir: PathBuf,
    runs: Arc<RwLock<Vec<ScanRun>>>,
}

impl ScanStore {
    pub async fn new(base_dir: PathBuf) -> std::io::Result<Self> {
        let dir = base_dir.join("scans");
        tokio::fs::create_dir_all(&dir).await?;
        let runs = load_json_files(&dir);
        Ok(Self {
            dir,
            runs: Arc::new(RwLock::new(runs)),
        })
    }

    pub async fn create(&self, run: ScanRun) -> ScanRun {
        {
            let mut runs = self.runs.write().await;
            runs.push(run.clone());
        }
        persist_record(self.dir.clone(), run.id.clone(), run.clone());
        run
    }

    pub async fn get(&self, id: &str) -> Option<ScanRun> {
        self.runs.read().await.iter().find(|r| r.id == id).cloned()
    }

    pub async fn update(&self, run: ScanRun) -> Result<()> {
        {
            let mut runs = self.runs.write().await;
            let existing = runs
                .iter_mut()
                .find(|r| r.id == run.id)
                .ok_or_else(|| Error::NotFound(format!("scan run {}", run.id)))?;
            *existing = run.clone();
        }
        persist_record(self.dir.clone(), run.id.clone(), run);
        Ok(())
    }

    /// Number of currently running scans for a tenant (admission control)
    pub async fn count_running_for_tenant(&self, tenant_id: &str) -> usize {
        self.runs
            .read()
            .await
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.status == ScanStatus::Running)
            .count()
    }

    /// Most recently completed run for a source, if any (incremental base)
    pub async fn latest_completed_for_source(&self, source_id: &str) -> Option<ScanRun> {
        self.runs
            .read()
            .await
            .iter()
            .filter(|r| r.source_id == source_id && r.status == ScanStatus::Completed)
            .max_by_key(|r| r.completed_at)
            .cloned()
    }

    /// All runs for a source, newest first
    pub async fn list_for_source(&self, source_id: &str) -> Vec<ScanRun> {
        let mut runs: Vec<ScanRun> = self
            .runs
            .read()
            .await
            .iter()
            .filter(|r| r.source_id == source_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs
    }
}
