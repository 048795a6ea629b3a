//! Discovery pipeline: schema walk, sampling, detection, persistence

use crate::connector::{Connector, DiscoveryRequest};
use crate::detect::{CompositeDetector, DetectionInput};
use crate::error::Result;
use crate::model::{
    DataEntity, DataField, DataSource, PiiClassification, ScanStats, VerificationStatus,
};
use crate::store::CatalogStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Walks one source's schema and records what it finds
///
/// Entities and fields are matched by name against previous scans, so a
/// rescan updates records in place instead of duplicating them. A failure
/// on one entity is logged and skipped; the rest of the scan proceeds.
pub struct DiscoveryPipeline {
    catalog: Arc<CatalogStore>,
    detector: Arc<CompositeDetector>,
    sample_limit: usize,
}

impl DiscoveryPipeline {
    pub fn new(
        catalog: Arc<CatalogStore>,
        detector: Arc<CompositeDetector>,
        sample_limit: usize,
    ) -> Self {
        Self {
            catalog,
            detector,
            sample_limit,
        }
    }

    /// Run discovery over an already-connected connector
    pub async fn run(
        &self,
        connector: &dyn Connector,
        source: &DataSource,
        changed_since: Option<DateTime<Utc>>,
    ) -> Result<ScanStats> {
        let inventory = self
            .catalog
            .inventory_for_source(&source.tenant_id, &source.id)
            .await;

        let discovery = connector
            .discover_schema(&DiscoveryRequest { changed_since })
            .await?;
        tracing::info!(
            "Discovered {} of {} entities on source {}",
            discovery.entities.len(),
            discovery.total_entities,
            source.name
        );

        let mut stats = ScanStats::default();

        for descriptor in &discovery.entities {
            let fields = match connector.get_fields(&descriptor.name).await {
                Ok(fields) => fields,
                Err(e) => {
                    tracing::warn!(
                        "Skipping entity '{}' on source {}: {}",
                        descriptor.name,
                        source.name,
                        e
                    );
                    continue;
                }
            };

            let entity = match self.catalog.find_entity(&inventory.id, &descriptor.name).await {
                Some(existing) => existing,
                None => {
                    self.catalog
                        .create_entity(DataEntity::new(
                            &inventory.id,
                            &descriptor.name,
                            &descriptor.entity_type,
                        ))
                        .await
                }
            };
            if entity.record_count != descriptor.record_count {
                let mut updated = entity.clone();
                updated.record_count = descriptor.record_count;
                self.catalog.update_entity(updated).await?;
            }

            let adjacent: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();

            for descriptor_field in &fields {
                let field = match self
                    .catalog
                    .find_field(&entity.id, &descriptor_field.name)
                    .await
                {
                    Some(existing) => existing,
                    None => {
                        self.catalog
                            .create_field(DataField::new(
                                &entity.id,
                                &descriptor_field.name,
                                &descriptor_field.data_type,
                            ))
                            .await
                    }
                };

                // Sampling is best-effort; detection falls back to names
                let samples = match connector
                    .sample_values(&entity.name, &field.name, self.sample_limit)
                    .await
                {
                    Ok(samples) => samples,
                    Err(e) => {
                        tracing::debug!(
                            "No samples for {}.{}: {}",
                            entity.name,
                            field.name,
                            e
                        );
                        Vec::new()
                    }
                };

                let detection = self.detector.detect(&DetectionInput {
                    entity_name: entity.name.clone(),
                    field_name: field.name.clone(),
                    data_type: field.data_type.clone(),
                    samples,
                    adjacent_fields: adjacent.clone(),
                });

                stats.fields_scanned += 1;
                if let Some(top) = detection.top_match {
                    self.catalog
                        .upsert_classification(PiiClassification {
                            id: uuid::Uuid::new_v4().to_string(),
                            tenant_id: source.tenant_id.clone(),
                            source_id: source.id.clone(),
                            entity_id: entity.id.clone(),
                            field_id: field.id.clone(),
                            category: top.category,
                            pii_type: top.pii_type,
                            sensitivity: top.sensitivity,
                            confidence: top.confidence,
                            method: top.methods[0].clone(),
                            methods: top.methods,
                            reasoning: top.reasoning,
                            verification: VerificationStatus::Pending,
                            verified_by: None,
                            verified_at: None,
                            created_at: Utc::now(),
                        })
                        .await;
                    stats.pii_fields_found += 1;
                }
            }

            stats.entities_scanned += 1;
        }

        // Inventory totals are recomputed once per run
        let mut inventory = self
            .catalog
            .inventory_for_source(&source.tenant_id, &source.id)
            .await;
        inventory.total_entities = discovery.total_entities;
        inventory.pii_fields_count = self.catalog.pii_field_count_for_source(&source.id).await;
        inventory.last_scanned_at = Some(Utc::now());
        self.catalog.update_inventory(inventory).await?;

        Ok(stats)
    }
}
