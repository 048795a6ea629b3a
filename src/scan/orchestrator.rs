//! Scan orchestration: admission, queueing and run execution

use super::DiscoveryPipeline;
use crate::audit::{AuditEntry, AuditLog};
use crate::config::ScanConfig;
use crate::connector::ConnectorRegistry;
use crate::detect::CompositeDetector;
use crate::error::{Error, Result};
use crate::events::{EventKind, EventPublisher};
use crate::model::{ConnectionStatus, DataSource, ScanRun, ScanStatus, ScanType};
use crate::queue::{JobHandler, JobQueue};
use crate::store::{CatalogStore, ScanStore, SourceStore};
use serde_json::json;
use std::sync::Arc;

/// Admits, queues and executes scan runs
///
/// Admission enforces a per-tenant ceiling on concurrently running scans.
/// Execution is guarded so a redelivered job whose run already left the
/// pending state is dropped without side effects.
pub struct ScanOrchestrator {
    sources: Arc<SourceStore>,
    scans: Arc<ScanStore>,
    registry: Arc<ConnectorRegistry>,
    queue: Arc<dyn JobQueue>,
    pipeline: DiscoveryPipeline,
    events: EventPublisher,
    audit: AuditLog,
    config: ScanConfig,
}

impl ScanOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sources: Arc<SourceStore>,
        scans: Arc<ScanStore>,
        catalog: Arc<CatalogStore>,
        registry: Arc<ConnectorRegistry>,
        queue: Arc<dyn JobQueue>,
        detector: Arc<CompositeDetector>,
        events: EventPublisher,
        audit: AuditLog,
        config: ScanConfig,
    ) -> Self {
        let pipeline = DiscoveryPipeline::new(catalog, detector, config.sample_limit);
        Self {
            sources,
            scans,
            registry,
            queue,
            pipeline,
            events,
            audit,
            config,
        }
    }

    /// Start queue workers that execute scan runs
    pub async fn start_workers(self: &Arc<Self>) -> Result<()> {
        let orchestrator = self.clone();
        let handler: JobHandler = Arc::new(move |run_id| {
            let orchestrator = orchestrator.clone();
            Box::pin(async move { orchestrator.run_scan(&run_id).await })
        });
        self.queue.subscribe(handler, self.config.queue_workers).await
    }

    /// Admit a scan request and queue it for execution
    ///
    /// The orchestrator decides the scan type: a source with a prior
    /// completed run is scanned incrementally, a source without one gets a
    /// full scan. `force_full` overrides the choice for explicit rescans.
    pub async fn enqueue_scan(&self, source_id: &str, force_full: bool) -> Result<ScanRun> {
        let source = self
            .sources
            .get(source_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("data source {}", source_id)))?;

        let running = self.scans.count_running_for_tenant(&source.tenant_id).await;
        if running >= self.config.max_concurrent_per_tenant {
            return Err(Error::Quota(format!(
                "tenant {} already has {} running scans (limit {})",
                source.tenant_id, running, self.config.max_concurrent_per_tenant
            )));
        }

        let has_base = self
            .scans
            .latest_completed_for_source(&source.id)
            .await
            .is_some();
        let effective_type = if force_full || !has_base {
            ScanType::Full
        } else {
            ScanType::Incremental
        };

        let run = self
            .scans
            .create(ScanRun::new(&source.id, &source.tenant_id, effective_type))
            .await;

        if let Err(e) = self.queue.enqueue(&run.id).await {
            let mut failed = run.clone();
            failed.fail(format!("dispatch failed: {}", e));
            self.scans.update(failed).await?;
            return Err(e);
        }

        tracing::info!("Queued {:?} scan {} for source {}", effective_type, run.id, source.name);
        Ok(run)
    }

    /// Execute one queued scan run
    pub async fn run_scan(&self, run_id: &str) -> Result<()> {
        let mut run = self
            .scans
            .get(run_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("scan run {}", run_id)))?;

        // Redelivery guard: only pending runs may start
        if run.status != ScanStatus::Pending {
            tracing::info!(
                "Scan {} is {} already, dropping redelivered job",
                run.id,
                run.status
            );
            return Ok(());
        }

        let source = self
            .sources
            .get(&run.source_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("data source {}", run.source_id)))?;

        run.start();
        self.scans.update(run.clone()).await?;

        let changed_since = match run.scan_type {
            ScanType::Incremental => self
                .scans
                .latest_completed_for_source(&source.id)
                .await
                .and_then(|r| r.completed_at),
            ScanType::Full => None,
        };

        match self.execute(&source, changed_since).await {
            Ok(stats) => {
                run.complete(stats);
                self.scans.update(run.clone()).await?;

                let mut source = source;
                source.connection_status = ConnectionStatus::Connected;
                source.last_synced_at = run.completed_at;
                self.sources.update(source.clone()).await?;

                self.events.publish(
                    EventKind::ScanCompleted,
                    &run.tenant_id,
                    json!({
                        "scanId": run.id,
                        "sourceId": source.id,
                        "stats": stats,
                    }),
                );
                self.audit.record(
                    AuditEntry::new(&run.tenant_id, "system", "scan.completed", &format!("scan:{}", run.id))
                        .with_detail(format!(
                            "{} entities, {} fields, {} pii fields",
                            stats.entities_scanned, stats.fields_scanned, stats.pii_fields_found
                        )),
                );
                tracing::info!(
                    "Scan {} completed: {} entities, {} pii fields",
                    run.id,
                    stats.entities_scanned,
                    stats.pii_fields_found
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Scan {} failed: {}", run.id, e);
                run.fail(e.to_string());
                self.scans.update(run.clone()).await?;

                let mut source = source;
                source.connection_status = ConnectionStatus::Error;
                self.sources.update(source.clone()).await?;

                self.events.publish(
                    EventKind::ScanFailed,
                    &run.tenant_id,
                    json!({
                        "scanId": run.id,
                        "sourceId": source.id,
                        "error": run.error,
                    }),
                );
                self.audit.record(AuditEntry::new(
                    &run.tenant_id,
                    "system",
                    "scan.failed",
                    &format!("scan:{}", run.id),
                ));
                Ok(())
            }
        }
    }

    async fn execute(
        &self,
        source: &DataSource,
        changed_since: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<crate::model::ScanStats> {
        let mut connector = self.registry.create(source)?;
        connector.connect().await?;
        let result = self.pipeline.run(connector.as_ref(), source, changed_since).await;
        if let Err(e) = connector.close().await {
            tracing::warn!("Failed to close connector for {}: {}", source.name, e);
        }
        result
    }
}
