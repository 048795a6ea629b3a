//! DSR lifecycle management and bounded task execution

use super::task::{run_task, TaskContext};
use crate::audit::{AuditEntry, AuditLog};
use crate::config::DsrConfig;
use crate::connector::ConnectorRegistry;
use crate::error::{Error, Result};
use crate::events::{EventKind, EventPublisher};
use crate::model::{aggregate_dsr_status, Dsr, DsrStatus, DsrTask, DsrType, TaskStatus};
use crate::store::{CatalogStore, DsrStore, SourceStore};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Owns the DSR state machine and the fan-out execution of its tasks
pub struct DsrExecutor {
    dsrs: Arc<DsrStore>,
    sources: Arc<SourceStore>,
    catalog: Arc<CatalogStore>,
    registry: Arc<ConnectorRegistry>,
    events: EventPublisher,
    audit: AuditLog,
    config: DsrConfig,
}

impl DsrExecutor {
    pub fn new(
        dsrs: Arc<DsrStore>,
        sources: Arc<SourceStore>,
        catalog: Arc<CatalogStore>,
        registry: Arc<ConnectorRegistry>,
        events: EventPublisher,
        audit: AuditLog,
        config: DsrConfig,
    ) -> Self {
        Self {
            dsrs,
            sources,
            catalog,
            registry,
            events,
            audit,
            config,
        }
    }

    /// Record a new pending request
    pub async fn create_dsr(
        &self,
        tenant_id: &str,
        dsr_type: DsrType,
        subject: HashMap<String, String>,
    ) -> Dsr {
        let dsr = self.dsrs.create_dsr(Dsr::new(tenant_id, dsr_type, subject)).await;
        self.events.publish(
            EventKind::DsrCreated,
            tenant_id,
            json!({"dsrId": dsr.id, "type": dsr.dsr_type.to_string()}),
        );
        self.audit.record(AuditEntry::new(
            tenant_id,
            "system",
            "dsr.created",
            &format!("dsr:{}", dsr.id),
        ));
        tracing::info!("Created {} DSR {}", dsr.dsr_type, dsr.id);
        dsr
    }

    /// Approve a request, fanning it out into one task per data source
    ///
    /// The fan-out is fixed at approval time: sources registered later are
    /// not picked up by this DSR.
    pub async fn approve(&self, dsr_id: &str, actor: &str) -> Result<Dsr> {
        let mut dsr = self
            .dsrs
            .get_dsr(dsr_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("DSR {}", dsr_id)))?;
        dsr.transition(DsrStatus::Approved)?;

        let sources = self.sources.list_by_tenant(&dsr.tenant_id).await;
        for source in &sources {
            self.dsrs.create_task(DsrTask::new(&dsr, &source.id)).await;
        }
        self.dsrs.update_dsr(dsr.clone()).await?;

        self.events.publish(
            EventKind::DsrApproved,
            &dsr.tenant_id,
            json!({"dsrId": dsr.id, "tasks": sources.len()}),
        );
        self.audit.record(AuditEntry::new(
            &dsr.tenant_id,
            actor,
            "dsr.approved",
            &format!("dsr:{}", dsr.id),
        ));
        tracing::info!("DSR {} approved by {}, {} tasks created", dsr.id, actor, sources.len());
        Ok(dsr)
    }

    /// Reject a request
    pub async fn reject(&self, dsr_id: &str, actor: &str, reason: &str) -> Result<Dsr> {
        let mut dsr = self
            .dsrs
            .get_dsr(dsr_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("DSR {}", dsr_id)))?;
        dsr.transition(DsrStatus::Rejected)?;
        dsr.reason = Some(reason.to_string());
        self.dsrs.update_dsr(dsr.clone()).await?;

        self.audit.record(
            AuditEntry::new(&dsr.tenant_id, actor, "dsr.rejected", &format!("dsr:{}", dsr.id))
                .with_detail(reason),
        );
        Ok(dsr)
    }

    /// Execute an approved request: run all its tasks under a bounded pool
    /// and derive the terminal DSR state from the task outcomes
    ///
    /// Only an approved DSR may start; a second execution attempt is
    /// rejected by the state machine.
    pub async fn execute(&self, dsr_id: &str) -> Result<Dsr> {
        let mut dsr = self
            .dsrs
            .get_dsr(dsr_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("DSR {}", dsr_id)))?;
        dsr.transition(DsrStatus::InProgress)?;
        self.dsrs.update_dsr(dsr.clone()).await?;
        self.events.publish(
            EventKind::DsrExecuting,
            &dsr.tenant_id,
            json!({"dsrId": dsr.id}),
        );

        let tasks = self.dsrs.tasks_for_dsr(dsr_id).await;
        tracing::info!("Executing DSR {} across {} sources", dsr.id, tasks.len());

        let semaphore = Arc::new(Semaphore::new(self.config.task_concurrency.max(1)));
        let mut set = JoinSet::new();
        for task in tasks {
            let semaphore = semaphore.clone();
            let ctx = self.task_context();
            let dsr = dsr.clone();
            set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Dsr(format!("task pool closed: {}", e)))?;
                run_task(ctx, dsr, task).await
            });
        }
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("DSR {} task bookkeeping failed: {}", dsr_id, e),
                Err(e) => tracing::warn!("DSR {} task panicked: {}", dsr_id, e),
            }
        }

        let tasks = self.dsrs.tasks_for_dsr(dsr_id).await;
        let outcome = aggregate_dsr_status(&tasks).unwrap_or(DsrStatus::Failed);

        let mut dsr = self
            .dsrs
            .get_dsr(dsr_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("DSR {}", dsr_id)))?;
        dsr.transition(outcome)?;
        if outcome == DsrStatus::Failed {
            let failed = tasks.iter().filter(|t| t.status == TaskStatus::Failed).count();
            dsr.reason = Some(format!("{} task(s) failed", failed));
        }
        self.dsrs.update_dsr(dsr.clone()).await?;

        let kind = if outcome == DsrStatus::Completed {
            EventKind::DsrCompleted
        } else {
            EventKind::DsrFailed
        };
        self.events.publish(
            kind,
            &dsr.tenant_id,
            json!({"dsrId": dsr.id, "status": dsr.status.to_string(), "reason": dsr.reason}),
        );
        self.audit.record(AuditEntry::new(
            &dsr.tenant_id,
            "system",
            &format!("dsr.{}", dsr.status),
            &format!("dsr:{}", dsr.id),
        ));
        tracing::info!("DSR {} finished as {}", dsr.id, dsr.status);
        Ok(dsr)
    }

    fn task_context(&self) -> Arc<TaskContext> {
        Arc::new(TaskContext {
            sources: self.sources.clone(),
            catalog: self.catalog.clone(),
            dsrs: self.dsrs.clone(),
            registry: self.registry.clone(),
            events: self.events.clone(),
            audit: self.audit.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::testing::{row, MockBackend, MockConnectorFactory};
    use crate::events::MemorySink;
    use crate::model::{
        DataEntity, DataField, DataSource, DeletionMode, PiiCategory, PiiClassification,
        SensitivityLevel, SourceKind, SourceSettings, VerificationStatus,
    };
    use tempfile::TempDir;

    struct Harness {
        executor: DsrExecutor,
        dsrs: Arc<DsrStore>,
        sources: Arc<SourceStore>,
        catalog: Arc<CatalogStore>,
        sink: Arc<MemorySink>,
        _dir: TempDir,
    }

    async fn make_harness(backends: Vec<(&DataSource, Arc<MockBackend>)>) -> Harness {
        let dir = TempDir::new().unwrap();
        let base = dir.path().to_path_buf();
        let dsrs = Arc::new(DsrStore::new(base.clone()).await.unwrap());
        let sources = Arc::new(SourceStore::new(base.clone()).await.unwrap());
        let catalog = Arc::new(CatalogStore::new(base.clone()).await.unwrap());

        let mut factory = MockConnectorFactory::new(SourceKind::Postgres);
        for (source, backend) in &backends {
            sources.create((*source).clone()).await;
            factory = factory.with_backend(&source.id, backend.clone());
        }
        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(factory));

        let sink = Arc::new(MemorySink::new());
        let executor = DsrExecutor::new(
            dsrs.clone(),
            sources.clone(),
            catalog.clone(),
            Arc::new(registry),
            EventPublisher::new(sink.clone()),
            AuditLog::new(base),
            DsrConfig::default(),
        );

        Harness {
            executor,
            dsrs,
            sources,
            catalog,
            sink,
            _dir: dir,
        }
    }

    fn users_backend(email: &str) -> Arc<MockBackend> {
        MockBackend::new().add_entity(
            "users",
            &[("email", "text"), ("phone", "text")],
            vec![
                row(&[("email", email), ("phone", "555-0100")]),
                row(&[("email", "other@example.com"), ("phone", "555-0101")]),
            ],
        )
    }

    /// Seed catalog state as a scan would have left it
    async fn classify_email_field(catalog: &CatalogStore, source: &DataSource) {
        let inventory = catalog
            .inventory_for_source(&source.tenant_id, &source.id)
            .await;
        let entity = catalog
            .create_entity(DataEntity::new(&inventory.id, "users", "table"))
            .await;
        let field = catalog
            .create_field(DataField::new(&entity.id, "email", "text"))
            .await;
        catalog
            .upsert_classification(PiiClassification {
                id: uuid::Uuid::new_v4().to_string(),
                tenant_id: source.tenant_id.clone(),
                source_id: source.id.clone(),
                entity_id: entity.id,
                field_id: field.id,
                category: PiiCategory::Contact,
                pii_type: "EMAIL".to_string(),
                sensitivity: SensitivityLevel::Moderate,
                confidence: 0.9,
                method: "value_pattern".to_string(),
                methods: vec!["value_pattern".to_string()],
                reasoning: "seeded".to_string(),
                verification: VerificationStatus::Pending,
                verified_by: None,
                verified_at: None,
                created_at: chrono::Utc::now(),
            })
            .await;
    }

    fn subject(email: &str) -> HashMap<String, String> {
        let mut subject = HashMap::new();
        subject.insert("email".to_string(), email.to_string());
        subject
    }

    #[tokio::test]
    async fn test_erasure_across_auto_and_manual_sources() {
        let auto = DataSource::new("tenant-1", "auto-db", SourceKind::Postgres, SourceSettings::default());
        let mut manual =
            DataSource::new("tenant-1", "manual-db", SourceKind::Postgres, SourceSettings::default());
        manual.deletion_mode = DeletionMode::Manual;

        let auto_backend = users_backend("jane@example.com");
        let manual_backend = users_backend("jane@example.com");
        let h = make_harness(vec![(&auto, auto_backend.clone()), (&manual, manual_backend.clone())])
            .await;
        classify_email_field(&h.catalog, &auto).await;
        classify_email_field(&h.catalog, &manual).await;

        let dsr = h
            .executor
            .create_dsr("tenant-1", DsrType::Erasure, subject("jane@example.com"))
            .await;
        let dsr = h.executor.approve(&dsr.id, "dpo@example.com").await.unwrap();
        assert_eq!(h.dsrs.tasks_for_dsr(&dsr.id).await.len(), 2);

        let dsr = h.executor.execute(&dsr.id).await.unwrap();
        assert_eq!(dsr.status, DsrStatus::Completed);

        // Auto source was deleted from, manual source was never touched
        assert_eq!(auto_backend.delete_call_count(), 1);
        assert_eq!(manual_backend.delete_call_count(), 0);

        let tasks = h.dsrs.tasks_for_dsr(&dsr.id).await;
        let manual_task = tasks.iter().find(|t| t.source_id == manual.id).unwrap();
        assert_eq!(manual_task.status, TaskStatus::ManualActionRequired);
        let auto_task = tasks.iter().find(|t| t.source_id == auto.id).unwrap();
        assert_eq!(auto_task.status, TaskStatus::Completed);
        assert_eq!(auto_task.result.as_ref().unwrap()["recordsDeleted"], 1);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let kinds = h.sink.kinds().await;
        assert!(kinds.contains(&EventKind::DataDeleted));
        assert!(kinds.contains(&EventKind::ManualDeletionRequired));
        assert!(kinds.contains(&EventKind::DsrCompleted));
    }

    #[tokio::test]
    async fn test_failed_task_fails_the_dsr() {
        let good = DataSource::new("tenant-1", "good-db", SourceKind::Postgres, SourceSettings::default());
        let bad = DataSource::new("tenant-1", "bad-db", SourceKind::Postgres, SourceSettings::default());

        let good_backend = users_backend("jane@example.com");
        let bad_backend = users_backend("jane@example.com");
        bad_backend.set_fail_connect(true);

        let h = make_harness(vec![(&good, good_backend), (&bad, bad_backend)]).await;
        classify_email_field(&h.catalog, &good).await;
        classify_email_field(&h.catalog, &bad).await;

        let dsr = h
            .executor
            .create_dsr("tenant-1", DsrType::Erasure, subject("jane@example.com"))
            .await;
        h.executor.approve(&dsr.id, "dpo@example.com").await.unwrap();
        let dsr = h.executor.execute(&dsr.id).await.unwrap();

        assert_eq!(dsr.status, DsrStatus::Failed);
        assert_eq!(dsr.reason.as_deref(), Some("1 task(s) failed"));

        // The healthy source still got its deletion
        let tasks = h.dsrs.tasks_for_dsr(&dsr.id).await;
        let good_task = tasks.iter().find(|t| t.source_id == good.id).unwrap();
        assert_eq!(good_task.status, TaskStatus::Completed);
        let bad_task = tasks.iter().find(|t| t.source_id == bad.id).unwrap();
        assert_eq!(bad_task.status, TaskStatus::Failed);
        assert!(bad_task.error.as_ref().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_access_exports_subject_records() {
        let source = DataSource::new("tenant-1", "db", SourceKind::Postgres, SourceSettings::default());
        let backend = users_backend("jane@example.com");
        let h = make_harness(vec![(&source, backend.clone())]).await;
        classify_email_field(&h.catalog, &source).await;

        let dsr = h
            .executor
            .create_dsr("tenant-1", DsrType::Access, subject("jane@example.com"))
            .await;
        h.executor.approve(&dsr.id, "dpo@example.com").await.unwrap();
        let dsr = h.executor.execute(&dsr.id).await.unwrap();

        assert_eq!(dsr.status, DsrStatus::Completed);
        let tasks = h.dsrs.tasks_for_dsr(&dsr.id).await;
        let result = tasks[0].result.as_ref().unwrap();
        assert_eq!(result["recordsExported"], 1);
        assert_eq!(backend.delete_call_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_requires_approval() {
        let source = DataSource::new("tenant-1", "db", SourceKind::Postgres, SourceSettings::default());
        let h = make_harness(vec![(&source, users_backend("jane@example.com"))]).await;

        let dsr = h
            .executor
            .create_dsr("tenant-1", DsrType::Access, subject("jane@example.com"))
            .await;
        let err = h.executor.execute(&dsr.id).await.unwrap_err();
        assert!(matches!(err, Error::StateTransition(_)));
    }

    #[tokio::test]
    async fn test_double_execution_rejected() {
        let source = DataSource::new("tenant-1", "db", SourceKind::Postgres, SourceSettings::default());
        let h = make_harness(vec![(&source, users_backend("jane@example.com"))]).await;
        classify_email_field(&h.catalog, &source).await;

        let dsr = h
            .executor
            .create_dsr("tenant-1", DsrType::Access, subject("jane@example.com"))
            .await;
        h.executor.approve(&dsr.id, "dpo@example.com").await.unwrap();
        h.executor.execute(&dsr.id).await.unwrap();

        let err = h.executor.execute(&dsr.id).await.unwrap_err();
        assert!(matches!(err, Error::StateTransition(_)));
    }

    #[tokio::test]
    async fn test_rejection() {
        let source = DataSource::new("tenant-1", "db", SourceKind::Postgres, SourceSettings::default());
        let h = make_harness(vec![(&source, users_backend("jane@example.com"))]).await;

        let dsr = h
            .executor
            .create_dsr("tenant-1", DsrType::Erasure, subject("jane@example.com"))
            .await;
        let dsr = h
            .executor
            .reject(&dsr.id, "dpo@example.com", "identity not verified")
            .await
            .unwrap();
        assert_eq!(dsr.status, DsrStatus::Rejected);
        assert_eq!(dsr.reason.as_deref(), Some("identity not verified"));
        assert!(h.dsrs.tasks_for_dsr(&dsr.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_fanout_fixed_at_approval_time() {
        let source = DataSource::new("tenant-1", "db", SourceKind::Postgres, SourceSettings::default());
        let h = make_harness(vec![(&source, users_backend("jane@example.com"))]).await;
        classify_email_field(&h.catalog, &source).await;

        let dsr = h
            .executor
            .create_dsr("tenant-1", DsrType::Access, subject("jane@example.com"))
            .await;
        h.executor.approve(&dsr.id, "dpo@example.com").await.unwrap();

        // A source registered after approval gets no task
        h.sources
            .create(DataSource::new(
                "tenant-1",
                "late-db",
                SourceKind::Postgres,
                SourceSettings::default(),
            ))
            .await;

        assert_eq!(h.dsrs.tasks_for_dsr(&dsr.id).await.len(), 1);
        let dsr = h.executor.execute(&dsr.id).await.unwrap();
        assert_eq!(dsr.status, DsrStatus::Completed);
    }
}
