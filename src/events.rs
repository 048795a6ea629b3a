//! Domain event publishing
//!
//! Scan and DSR lifecycle transitions are announced as events so that
//! downstream consumers (notifications, webhooks) can react. Publishing is
//! fire-and-forget and never blocks or fails the operation that emitted it.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Kinds of lifecycle events the engine emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ScanCompleted,
    ScanFailed,
    DsrCreated,
    DsrApproved,
    DsrExecuting,
    DsrCompleted,
    DsrFailed,
    DataAccessed,
    DataDeleted,
    ManualDeletionRequired,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::ScanCompleted => "scan_completed",
            EventKind::ScanFailed => "scan_failed",
            EventKind::DsrCreated => "dsr_created",
            EventKind::DsrApproved => "dsr_approved",
            EventKind::DsrExecuting => "dsr_executing",
            EventKind::DsrCompleted => "dsr_completed",
            EventKind::DsrFailed => "dsr_failed",
            EventKind::DataAccessed => "data_accessed",
            EventKind::DataDeleted => "data_deleted",
            EventKind::ManualDeletionRequired => "manual_deletion_required",
        };
        write!(f, "{}", s)
    }
}

/// A single lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub kind: EventKind,
    pub tenant_id: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(kind: EventKind, tenant_id: &str, payload: serde_json::Value) -> Self {
        Self {
            kind,
            tenant_id: tenant_id.to_string(),
            payload,
            occurred_at: Utc::now(),
        }
    }
}

/// Destination for published events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: DomainEvent) -> Result<()>;
}

/// Publishes events without blocking the caller. Delivery failures are
/// logged and dropped.
#[derive(Clone)]
pub struct EventPublisher {
    sink: Arc<dyn EventSink>,
}

impl EventPublisher {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub fn publish(&self, kind: EventKind, tenant_id: &str, payload: serde_json::Value) {
        let event = DomainEvent::new(kind, tenant_id, payload);
        let sink = self.sink.clone();
        tokio::spawn(async move {
            let kind = event.kind;
            if let Err(e) = sink.deliver(event).await {
                tracing::warn!("Failed to deliver {} event: {}", kind, e);
            }
        });
    }
}

/// Sink that writes events to the log
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn deliver(&self, event: DomainEvent) -> Result<()> {
        tracing::info!(
            kind = %event.kind,
            tenant_id = %event.tenant_id,
            payload = %event.payload,
            "Domain event"
        );
        Ok(())
    }
}

/// Sink that collects events in memory, for tests
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().await.clone()
    }

    pub async fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().await.iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn deliver(&self, event: DomainEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_is_fire_and_forget() {
        let sink = Arc::new(MemorySink::new());
        let publisher = EventPublisher::new(sink.clone());

        publisher.publish(EventKind::ScanCompleted, "tenant-1", json!({"scanId": "s1"}));
        publisher.publish(EventKind::DsrCreated, "tenant-1", json!({"dsrId": "d1"}));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let kinds = sink.kinds().await;
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains(&EventKind::ScanCompleted));
        assert!(kinds.contains(&EventKind::DsrCreated));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(EventKind::ManualDeletionRequired.to_string(), "manual_deletion_required");
        assert_eq!(EventKind::ScanFailed.to_string(), "scan_failed");
    }
}
