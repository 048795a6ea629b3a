//! Connector registry: source kind to connector factory

use super::{
    Connector, ConnectorFactory, FileConnectorFactory, HttpApiConnectorFactory,
    PostgresConnectorFactory,
};
use crate::error::{Error, Result};
use crate::model::{DataSource, SourceKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Maps a data-source kind to the factory that builds its connector
///
/// Populated once at startup and read-only afterwards; shared via `Arc`
/// between the scan path and the DSR execution path.
pub struct ConnectorRegistry {
    factories: HashMap<SourceKind, Arc<dyn ConnectorFactory>>,
}

impl ConnectorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with all built-in connectors registered
    pub fn with_defaults(call_timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PostgresConnectorFactory::new(call_timeout)));
        registry.register(Arc::new(HttpApiConnectorFactory::new(call_timeout)));
        registry.register(Arc::new(FileConnectorFactory::new()));
        registry
    }

    /// Register a factory, replacing any previous one for the same kind
    pub fn register(&mut self, factory: Arc<dyn ConnectorFactory>) {
        self.factories.insert(factory.kind(), factory);
    }

    /// Build a connector for the given source
    pub fn create(&self, source: &DataSource) -> Result<Box<dyn Connector>> {
        let factory = self.factories.get(&source.kind).ok_or_else(|| {
            Error::Connector(format!(
                "No connector registered for source kind '{}'",
                source.kind
            ))
        })?;
        factory.create(source)
    }

    /// Registered source kinds
    pub fn kinds(&self) -> Vec<SourceKind> {
        self.factories.keys().copied().collect()
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
