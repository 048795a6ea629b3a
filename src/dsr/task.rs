//! Per-source DSR task execution

use crate::audit::{AuditEntry, AuditLog};
use crate::connector::ConnectorRegistry;
use crate::error::{Error, Result};
use crate::events::{EventKind, EventPublisher};
use crate::model::{DeletionMode, Dsr, DsrTask, DsrType, TaskStatus};
use crate::store::{CatalogStore, DsrStore, SourceStore};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared collaborators handed to every concurrently running task
pub(crate) struct TaskContext {
    pub sources: Arc<SourceStore>,
    pub catalog: Arc<CatalogStore>,
    pub dsrs: Arc<DsrStore>,
    pub registry: Arc<ConnectorRegistry>,
    pub events: EventPublisher,
    pub audit: AuditLog,
}

/// Drive one task to a terminal state
///
/// Execution failures are absorbed into the task record as `Failed`; only
/// store errors propagate. One failing source never aborts its siblings.
pub(crate) async fn run_task(ctx: Arc<TaskContext>, dsr: Dsr, mut task: DsrTask) -> Result<()> {
    task.status = TaskStatus::Running;
    ctx.dsrs.update_task(task.clone()).await?;

    match execute_task(&ctx, &dsr, &task).await {
        Ok((status, result)) => {
            task.status = status;
            task.result = Some(result);
        }
        Err(e) => {
            tracing::warn!(
                "DSR task {} against source {} failed: {}",
                task.id,
                task.source_id,
                e
            );
            task.status = TaskStatus::Failed;
            task.error = Some(e.to_string());
        }
    }
    task.completed_at = Some(Utc::now());
    ctx.dsrs.update_task(task).await
}

async fn execute_task(
    ctx: &TaskContext,
    dsr: &Dsr,
    task: &DsrTask,
) -> Result<(TaskStatus, serde_json::Value)> {
    let source = ctx
        .sources
        .get(&task.source_id)
        .await
        .ok_or_else(|| Error::NotFound(format!("data source {}", task.source_id)))?;

    // Only fields the scanner classified as PII participate in subject
    // matching; unclassified columns are never touched.
    let classifications = ctx.catalog.classifications_for_source(&source.id).await;
    let mut entity_fields: HashMap<String, Vec<String>> = HashMap::new();
    for classification in &classifications {
        let entity = ctx.catalog.get_entity(&classification.entity_id).await;
        let field = ctx.catalog.get_field(&classification.field_id).await;
        if let (Some(entity), Some(field)) = (entity, field) {
            entity_fields.entry(entity.name).or_default().push(field.name);
        }
    }

    // Entities where at least one subject key maps onto a classified field
    let targets: Vec<(String, HashMap<String, String>)> = entity_fields
        .iter()
        .filter_map(|(entity, fields)| {
            let filter = build_filter(&dsr.subject, fields);
            (!filter.is_empty()).then(|| (entity.clone(), filter))
        })
        .collect();

    match task.task_type {
        DsrType::Access | DsrType::Portability => {
            let mut connector = ctx.registry.create(&source)?;
            connector.connect().await?;

            let mut exported = serde_json::Map::new();
            let mut total = 0usize;
            for (entity, filter) in &targets {
                let records = connector.export_records(entity, filter).await?;
                total += records.len();
                exported.insert(entity.clone(), serde_json::Value::Array(records));
            }
            if let Err(e) = connector.close().await {
                tracing::warn!("Failed to close connector for {}: {}", source.name, e);
            }

            ctx.events.publish(
                EventKind::DataAccessed,
                &task.tenant_id,
                json!({"dsrId": dsr.id, "sourceId": source.id, "records": total}),
            );
            ctx.audit.record(
                AuditEntry::new(&task.tenant_id, "system", "dsr.exported", &format!("dsr:{}", dsr.id))
                    .with_detail(format!("{} records from source {}", total, source.name)),
            );
            Ok((
                TaskStatus::Completed,
                json!({"recordsExported": total, "records": exported}),
            ))
        }

        DsrType::Erasure => {
            if source.deletion_mode == DeletionMode::Manual {
                // No connector call; a human performs the deletion
                let entities: Vec<&str> = targets.iter().map(|(e, _)| e.as_str()).collect();
                ctx.events.publish(
                    EventKind::ManualDeletionRequired,
                    &task.tenant_id,
                    json!({"dsrId": dsr.id, "sourceId": source.id, "entities": entities}),
                );
                ctx.audit.record(AuditEntry::new(
                    &task.tenant_id,
                    "system",
                    "dsr.manual_deletion_required",
                    &format!("dsr:{}", dsr.id),
                ));
                return Ok((
                    TaskStatus::ManualActionRequired,
                    json!({
                        "note": format!("source '{}' requires manual deletion", source.name),
                        "entities": entities,
                    }),
                ));
            }

            let mut connector = ctx.registry.create(&source)?;
            connector.connect().await?;

            let mut deleted = 0u64;
            for (entity, filter) in &targets {
                deleted += connector.delete_records(entity, filter).await?;
            }
            if let Err(e) = connector.close().await {
                tracing::warn!("Failed to close connector for {}: {}", source.name, e);
            }

            ctx.events.publish(
                EventKind::DataDeleted,
                &task.tenant_id,
                json!({"dsrId": dsr.id, "sourceId": source.id, "deleted": deleted}),
            );
            ctx.audit.record(
                AuditEntry::new(&task.tenant_id, "system", "dsr.deleted", &format!("dsr:{}", dsr.id))
                    .with_detail(format!("{} records on source {}", deleted, source.name)),
            );
            Ok((TaskStatus::Completed, json!({"recordsDeleted": deleted})))
        }

        DsrType::Correction => Ok((
            TaskStatus::Completed,
            json!({"note": "correction recorded; values are updated through the source of record"}),
        )),

        DsrType::Nomination | DsrType::Appeal => Ok((
            TaskStatus::Completed,
            json!({"note": "no source-level data operation for this request type"}),
        )),
    }
}

/// Map subject keys onto classified field names, case-insensitively. The
/// backend filter uses the field's actual name.
fn build_filter(subject: &HashMap<String, String>, fields: &[String]) -> HashMap<String, String> {
    let mut filter = HashMap::new();
    for (key, value) in subject {
        if let Some(field) = fields.iter().find(|f| f.eq_ignore_ascii_case(key)) {
            filter.insert(field.clone(), value.clone());
        }
    }
    filter
}
