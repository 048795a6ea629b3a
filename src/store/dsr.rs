//! DSR and DSR task repository

use super::{load_json_files, persist_record};
use crate::error::{Error, Result};
use crate::model::{Dsr, DsrTask};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Store for data subject requests and their per-source tasks
pub struct DsrStore {
    dsrs_dir: PathBuf,
    tasks_dir: PathBuf,
    dsrs: Arc<RwLock<Vec<Dsr>>>,
    tasks: Arc<RwLock<Vec<DsrTask>>>,
}

impl DsrStore {
    pub async fn new(base_dir: PathBuf) -> std::io::Result<Self> {
        let dsrs_dir = base_dir.join("dsrs");
        let tasks_dir = base_dir.join("dsr_tasks");
        tokio::fs::create_dir_all(&dsrs_dir).await?;
        tokio::fs::create_dir_all(&tasks_dir).await?;

        Ok(Self {
            dsrs: Arc::new(RwLock::new(load_json_files(&dsrs_dir))),
            tasks: Arc::new(RwLock::new(load_json_files(&tasks_dir))),
            dsrs_dir,
            tasks_dir,
        })
    }

    pub async fn create_dsr(&self, dsr: Dsr) -> Dsr {
        {
            let mut dsrs = self.dsrs.write().await;
            dsrs.push(dsr.clone());
        }
        persist_record(self.dsrs_dir.clone(), dsr.id.clone(), dsr.clone());
        dsr
    }

    pub async fn get_dsr(&self, id: &str) -> Option<Dsr> {
        self.dsrs.read().await.iter().find(|d| d.id == id).cloned()
    }

    pub async fn update_dsr(&self, dsr: Dsr) -> Result<()> {
        {
            let mut dsrs = self.dsrs.write().await;
            let existing = dsrs
                .iter_mut()
                .find(|d| d.id == dsr.id)
                .ok_or_else(|| Error::NotFound(format!("DSR {}", dsr.id)))?;
            *existing = dsr.clone();
        }
        persist_record(self.dsrs_dir.clone(), dsr.id.clone(), dsr);
        Ok(())
    }

    pub async fn create_task(&self, task: DsrTask) -> DsrTask {
        {
            let mut tasks = self.tasks.write().await;
            tasks.push(task.clone());
        }
        persist_record(self.tasks_dir.clone(), task.id.clone(), task.clone());
        task
    }

    /// All tasks belonging to one DSR
    pub async fn tasks_for_dsr(&self, dsr_id: &str) -> Vec<DsrTask> {
        self.tasks
            .read()
            .await
            .iter()
            .filter(|t| t.dsr_id == dsr_id)
            .cloned()
            .collect()
    }

    pub async fn update_task(&self, task: DsrTask) -> Result<()> {
        {
            let mut tasks = self.tasks.write().await;
            let existing = tasks
                .iter_mut()
                .find(|t| t.id == task.id)
                .ok_or_else(|| Error::NotFound(format!("DSR task {}", task.id)))?;
            *existing = task.clone();
        }
        persist_record(self.tasks_dir.clone(), task.id.clone(), task);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DsrType, TaskStatus};
    use std::collections::HashMap;
    use tempfile::TempDir;

    async fn make_store() -> (DsrStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = DsrStore::new(dir.path().to_path_buf()).await.unwrap();
        (store, dir)
    }

    fn make_dsr() -> Dsr {
        let mut subject = HashMap::new();
        subject.insert("email".to_string(), "jane@example.com".to_string());
        Dsr::new("tenant-1", DsrType::Erasure, subject)
    }

    #[tokio::test]
    async fn test_dsr_crud() {
        let (store, _dir) = make_store().await;
        let dsr = store.create_dsr(make_dsr()).await;

        let mut fetched = store.get_dsr(&dsr.id).await.unwrap();
        fetched.notes = Some("reviewed".to_string());
        store.update_dsr(fetched).await.unwrap();
        assert_eq!(
            store.get_dsr(&dsr.id).await.unwrap().notes.as_deref(),
            Some("reviewed")
        );
    }

    #[tokio::test]
    async fn test_tasks_scoped_to_dsr() {
        let (store, _dir) = make_store().await;
        let dsr_a = store.create_dsr(make_dsr()).await;
        let dsr_b = store.create_dsr(make_dsr()).await;

        store.create_task(DsrTask::new(&dsr_a, "src-1")).await;
        store.create_task(DsrTask::new(&dsr_a, "src-2")).await;
        store.create_task(DsrTask::new(&dsr_b, "src-1")).await;

        assert_eq!(store.tasks_for_dsr(&dsr_a.id).await.len(), 2);
        assert_eq!(store.tasks_for_dsr(&dsr_b.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_task_update() {
        let (store, _dir) = make_store().await;
        let dsr = store.create_dsr(make_dsr()).await;
        let mut task = store.create_task(DsrTask::new(&dsr, "src-1")).await;

        task.status = TaskStatus::Failed;
        task.error = Some("connection refused".to_string());
        store.update_task(task.clone()).await.unwrap();

        let tasks = store.tasks_for_dsr(&dsr.id).await;
        assert_eq!(tasks[0].status, TaskStatus::Failed);
        assert_eq!(tasks[0].error.as_deref(), Some("connection refused"));
    }
}
