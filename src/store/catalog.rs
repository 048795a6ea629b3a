//! Inventory / entity / field / classification repository

use super::{load_json_files, persist_record};
use crate::error::{Error, Result};
use crate::model::{DataEntity, DataField, DataInventory, PiiClassification};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Store for the discovered inventory tree and its PII classifications
pub struct CatalogStore {
    inventories_dir: PathBuf,
    entities_dir: PathBuf,
    fields_dir: PathBuf,
    classifications_dir: PathBuf,
    inventories: Arc<RwLock<Vec<DataInventory>>>,
    entities: Arc<RwLock<Vec<DataEntity>>>,
    fields: Arc<RwLock<Vec<DataField>>>,
    classifications: Arc<RwLock<Vec<PiiClassification>>>,
}

impl CatalogStore {
    pub async fn new(base_dir: PathBuf) -> std::io::Result<Self> {
        let inventories_dir = base_dir.join("inventories");
        let entities_dir = base_dir.join("entities");
        let fields_dir = base_dir.join("fields");
        let classifications_dir = base_dir.join("classifications");
        for dir in [
            &inventories_dir,
            &entities_dir,
            &fields_dir,
            &classifications_dir,
        ] {
            tokio::fs::create_dir_all(dir).await?;
        }

        Ok(Self {
            inventories: Arc::new(RwLock::new(load_json_files(&inventories_dir))),
            entities: Arc::new(RwLock::new(load_json_files(&entities_dir))),
            fields: Arc::new(RwLock::new(load_json_files(&fields_dir))),
            classifications: Arc::new(RwLock::new(load_json_files(&classifications_dir))),
            inventories_dir,
            entities_dir,
            fields_dir,
            classifications_dir,
        })
    }

    // =========================================================================
    // Inventories
    // =========================================================================

    /// Inventory row for a source, creating it when absent
    pub async fn inventory_for_source(&self, tenant_id: &str, source_id: &str) -> DataInventory {
        {
            let inventories = self.inventories.read().await;
            if let Some(inv) = inventories.iter().find(|i| i.source_id == source_id) {
                return inv.clone();
            }
        }
        let inventory = DataInventory::new(tenant_id, source_id);
        {
            let mut inventories = self.inventories.write().await;
            // Re-check under the write lock
            if let Some(inv) = inventories.iter().find(|i| i.source_id == source_id) {
                return inv.clone();
            }
            inventories.push(inventory.clone());
        }
        persist_record(
            self.inventories_dir.clone(),
            inventory.id.clone(),
            inventory.clone(),
        );
        inventory
    }

    pub async fn update_inventory(&self, inventory: DataInventory) -> Result<()> {
        {
            let mut inventories = self.inventories.write().await;
            let existing = inventories
                .iter_mut()
                .find(|i| i.id == inventory.id)
                .ok_or_else(|| Error::NotFound(format!("inventory {}", inventory.id)))?;
            *existing = inventory.clone();
        }
        persist_record(self.inventories_dir.clone(), inventory.id.clone(), inventory);
        Ok(())
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Entity matched by name under an inventory
    pub async fn find_entity(&self, inventory_id: &str, name: &str) -> Option<DataEntity> {
        self.entities
            .read()
            .await
            .iter()
            .find(|e| e.inventory_id == inventory_id && e.name == name)
            .cloned()
    }

    pub async fn create_entity(&self, entity: DataEntity) -> DataEntity {
        {
            let mut entities = self.entities.write().await;
            entities.push(entity.clone());
        }
        persist_record(self.entities_dir.clone(), entity.id.clone(), entity.clone());
        entity
    }

    pub async fn update_entity(&self, entity: DataEntity) -> Result<()> {
        {
            let mut entities = self.entities.write().await;
            let existing = entities
                .iter_mut()
                .find(|e| e.id == entity.id)
                .ok_or_else(|| Error::NotFound(format!("entity {}", entity.id)))?;
            *existing = entity.clone();
        }
        persist_record(self.entities_dir.clone(), entity.id.clone(), entity);
        Ok(())
    }

    pub async fn entities_for_inventory(&self, inventory_id: &str) -> Vec<DataEntity> {
        self.entities
            .read()
            .await
            .iter()
            .filter(|e| e.inventory_id == inventory_id)
            .cloned()
            .collect()
    }

    pub async fn get_entity(&self, id: &str) -> Option<DataEntity> {
        self.entities.read().await.iter().find(|e| e.id == id).cloned()
    }

    // =========================================================================
    // Fields
    // =========================================================================

    /// Field matched by name under an entity
    pub async fn find_field(&self, entity_id: &str, name: &str) -> Option<DataField> {
        self.fields
            .read()
            .await
            .iter()
            .find(|f| f.entity_id == entity_id && f.name == name)
            .cloned()
    }

    pub async fn create_field(&self, field: DataField) -> DataField {
        {
            let mut fields = self.fields.write().await;
            fields.push(field.clone());
        }
        persist_record(self.fields_dir.clone(), field.id.clone(), field.clone());
        field
    }

    pub async fn fields_for_entity(&self, entity_id: &str) -> Vec<DataField> {
        self.fields
            .read()
            .await
            .iter()
            .filter(|f| f.entity_id == entity_id)
            .cloned()
            .collect()
    }

    pub async fn get_field(&self, id: &str) -> Option<DataField> {
        self.fields.read().await.iter().find(|f| f.id == id).cloned()
    }

    // =========================================================================
    // Classifications
    // =========================================================================

    /// Create or supersede the classification for a field. A later scan
    /// replaces the verdict in place, resetting verification to pending.
    pub async fn upsert_classification(&self, classification: PiiClassification) -> PiiClassification {
        let stored = {
            let mut classifications = self.classifications.write().await;
            match classifications
                .iter_mut()
                .find(|c| c.field_id == classification.field_id)
            {
                Some(existing) => {
                    let mut updated = classification;
                    updated.id = existing.id.clone();
                    *existing = updated.clone();
                    updated
                }
                None => {
                    classifications.push(classification.clone());
                    classification
                }
            }
        };
        persist_record(
            self.classifications_dir.clone(),
            stored.id.clone(),
            stored.clone(),
        );
        stored
    }

    /// All classifications recorded against one source
    pub async fn classifications_for_source(&self, source_id: &str) -> Vec<PiiClassification> {
        self.classifications
            .read()
            .await
            .iter()
            .filter(|c| c.source_id == source_id)
            .cloned()
            .collect()
    }

    /// Count of PII fields recorded against one source
    pub async fn pii_field_count_for_source(&self, source_id: &str) -> u64 {
        self.classifications
            .read()
            .await
            .iter()
            .filter(|c| c.source_id == source_id)
            .count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PiiCategory, SensitivityLevel, VerificationStatus};
    use tempfile::TempDir;

    async fn make_store() -> (CatalogStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = CatalogStore::new(dir.path().to_path_buf()).await.unwrap();
        (store, dir)
    }

    fn make_classification(source_id: &str, field_id: &str, confidence: f64) -> PiiClassification {
        PiiClassification {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: "tenant-1".to_string(),
            source_id: source_id.to_string(),
            entity_id: "entity-1".to_string(),
            field_id: field_id.to_string(),
            category: PiiCategory::Contact,
            pii_type: "EMAIL".to_string(),
            sensitivity: SensitivityLevel::Moderate,
            confidence,
            method: "value_pattern".to_string(),
            methods: vec!["value_pattern".to_string()],
            reasoning: "test".to_string(),
            verification: VerificationStatus::Pending,
            verified_by: None,
            verified_at: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_inventory_upsert_by_source() {
        let (store, _dir) = make_store().await;
        let first = store.inventory_for_source("tenant-1", "src-1").await;
        let second = store.inventory_for_source("tenant-1", "src-1").await;
        assert_eq!(first.id, second.id);

        let other = store.inventory_for_source("tenant-1", "src-2").await;
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_entity_and_field_matching_by_name() {
        let (store, _dir) = make_store().await;
        let inv = store.inventory_for_source("tenant-1", "src-1").await;

        assert!(store.find_entity(&inv.id, "users").await.is_none());
        let entity = store
            .create_entity(DataEntity::new(&inv.id, "users", "table"))
            .await;
        assert_eq!(
            store.find_entity(&inv.id, "users").await.unwrap().id,
            entity.id
        );

        let field = store
            .create_field(DataField::new(&entity.id, "email", "text"))
            .await;
        assert_eq!(
            store.find_field(&entity.id, "email").await.unwrap().id,
            field.id
        );
        assert!(store.find_field(&entity.id, "phone").await.is_none());
    }

    #[tokio::test]
    async fn test_classification_superseded_in_place() {
        let (store, _dir) = make_store().await;

        let first = store
            .upsert_classification(make_classification("src-1", "field-1", 0.6))
            .await;
        let second = store
            .upsert_classification(make_classification("src-1", "field-1", 0.9))
            .await;

        // Same row, updated verdict
        assert_eq!(first.id, second.id);
        let all = store.classifications_for_source("src-1").await;
        assert_eq!(all.len(), 1);
        assert!((all[0].confidence - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_pii_count() {
        let (store, _dir) = make_store().await;
        store
            .upsert_classification(make_classification("src-1", "field-1", 0.9))
            .await;
        store
            .upsert_classification(make_classification("src-1", "field-2", 0.8))
            .await;
        store
            .upsert_classification(make_classification("src-2", "field-3", 0.8))
            .await;

        assert_eq!(store.pii_field_count_for_source("src-1").await, 2);
        assert_eq!(store.pii_field_count_for_source("src-2").await, 1);
    }
}
