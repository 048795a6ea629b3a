//! Data source repository

use super::{load_json_files, persist_record};
use crate::error::{Error, Result};
use crate::model::DataSource;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory data source store backed by JSON files
pub struct SourceStore {
    dir: PathBuf,
    sources: Arc<RwLock<Vec<DataSource>>>,
}

impl SourceStore {
    pub async fn new(base_dir: PathBuf) -> std::io::Result<Self> {
        let dir = base_dir.join("sources");
        tokio::fs::create_dir_all(&dir).await?;
        let sources = load_json_files(&dir);
        Ok(Self {
            dir,
            sources: Arc::new(RwLock::new(sources)),
        })
    }

    /// Register a new data source
    pub async fn create(&self, source: DataSource) -> DataSource {
        {
            let mut sources = self.sources.write().await;
            sources.push(source.clone());
        }
        persist_record(self.dir.clone(), source.id.clone(), source.clone());
        source
    }

    /// Get a source by id
    pub async fn get(&self, id: &str) -> Option<DataSource> {
        self.sources.read().await.iter().find(|s| s.id == id).cloned()
    }

    /// All sources owned by a tenant
    pub async fn list_by_tenant(&self, tenant_id: &str) -> Vec<DataSource> {
        self.sources
            .read()
            .await
            .iter()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// Replace an existing source record
    pub async fn update(&self, source: DataSource) -> Result<()> {
        {
            let mut sources = self.sources.write().await;
            let existing = sources
                .iter_mut()
                .find(|s| s.id == source.id)
                .ok_or_else(|| Error::NotFound(format!("data source {}", source.id)))?;
            *existing = source.clone();
        }
        persist_record(self.dir.clone(), source.id.clone(), source);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConnectionStatus, SourceKind, SourceSettings};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_get_update() {
        let dir = TempDir::new().unwrap();
        let store = SourceStore::new(dir.path().to_path_buf()).await.unwrap();

        let source = store
            .create(DataSource::new(
                "tenant-1",
                "db",
                SourceKind::Postgres,
                SourceSettings::default(),
            ))
            .await;

        let mut fetched = store.get(&source.id).await.unwrap();
        assert_eq!(fetched.name, "db");

        fetched.connection_status = ConnectionStatus::Connected;
        store.update(fetched).await.unwrap();
        assert_eq!(
            store.get(&source.id).await.unwrap().connection_status,
            ConnectionStatus::Connected
        );
    }

    #[tokio::test]
    async fn test_list_by_tenant() {
        let dir = TempDir::new().unwrap();
        let store = SourceStore::new(dir.path().to_path_buf()).await.unwrap();

        store
            .create(DataSource::new(
                "tenant-1",
                "a",
                SourceKind::Postgres,
                SourceSettings::default(),
            ))
            .await;
        store
            .create(DataSource::new(
                "tenant-2",
                "b",
                SourceKind::FileUpload,
                SourceSettings::default(),
            ))
            .await;

        assert_eq!(store.list_by_tenant("tenant-1").await.len(), 1);
        assert_eq!(store.list_by_tenant("tenant-3").await.len(), 0);
    }

    #[tokio::test]
    async fn test_update_missing_source() {
        let dir = TempDir::new().unwrap();
        let store = SourceStore::new(dir.path().to_path_buf()).await.unwrap();
        let source = DataSource::new("t", "x", SourceKind::Postgres, SourceSettings::default());
        assert!(matches!(
            store.update(source).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = SourceStore::new(dir.path().to_path_buf()).await.unwrap();
            let source = store
                .create(DataSource::new(
                    "tenant-1",
                    "db",
                    SourceKind::Postgres,
                    SourceSettings::default(),
                ))
                .await;
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            source.id
        };

        let store = SourceStore::new(dir.path().to_path_buf()).await.unwrap();
        assert!(store.get(&id).await.is_some());
    }
}
