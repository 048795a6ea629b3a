//! Connector layer
//!
//! One [`Connector`] implementation per backend technology behind a uniform
//! async contract: connect, discover schema, enumerate fields, sample
//! values, export matching rows, delete matching rows, close. Connectors
//! are built through the [`ConnectorRegistry`] and are used by exactly one
//! worker for the duration of one scan or DSR task.

mod file;
mod http_api;
mod postgres;
mod registry;
pub mod testing;

pub use file::{FileConnector, FileConnectorFactory};
pub use http_api::{HttpApiConnector, HttpApiConnectorFactory};
pub use postgres::{PostgresConnector, PostgresConnectorFactory};
pub use registry::ConnectorRegistry;

use crate::error::Result;
use crate::model::{DataSource, SourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Parameters for schema discovery
#[derive(Debug, Clone, Default)]
pub struct DiscoveryRequest {
    /// When set, a connector may restrict results to items modified after
    /// this instant. Items the backend cannot time-filter must still be
    /// enumerated in full.
    pub changed_since: Option<DateTime<Utc>>,
}

/// Result of schema discovery
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Total entities the backend exposes (before any time filter)
    pub total_entities: u64,
    /// Entities selected by this discovery pass
    pub entities: Vec<EntityDescriptor>,
}

/// A table, collection or file as reported by the backend
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub name: String,
    /// Backend-specific kind label (table, collection, file, ...)
    pub entity_type: String,
    pub record_count: Option<u64>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// A column or key as reported by the backend
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub data_type: String,
}

/// Uniform contract for talking to one backend
///
/// Filter keys passed to `export_records` and `delete_records` are field
/// names matched case-insensitively against the backend's columns.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish and validate connectivity. Idempotent; safe to call
    /// before every operation window.
    async fn connect(&mut self) -> Result<()>;

    /// Enumerate the backend's entities
    async fn discover_schema(&self, req: &DiscoveryRequest) -> Result<Discovery>;

    /// Enumerate the fields of one entity
    async fn get_fields(&self, entity: &str) -> Result<Vec<FieldDescriptor>>;

    /// Sample up to `limit` values of one field. Best-effort: returns
    /// fewer than `limit` or an empty set without erroring when the
    /// backend has no readable samples.
    async fn sample_values(&self, entity: &str, field: &str, limit: usize)
        -> Result<Vec<String>>;

    /// Export rows matching the filter (ACCESS / PORTABILITY)
    async fn export_records(
        &self,
        entity: &str,
        filter: &HashMap<String, String>,
    ) -> Result<Vec<serde_json::Value>>;

    /// Delete rows matching the filter (ERASURE); returns deleted count
    async fn delete_records(&self, entity: &str, filter: &HashMap<String, String>)
        -> Result<u64>;

    /// Release backend resources
    async fn close(&mut self) -> Result<()>;
}

/// Builds connectors for one source kind
pub trait ConnectorFactory: Send + Sync {
    /// The source kind this factory serves
    fn kind(&self) -> SourceKind;

    /// Build a connector for the given source
    fn create(&self, source: &DataSource) -> Result<Box<dyn Connector>>;
}
