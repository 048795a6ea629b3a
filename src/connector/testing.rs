//! In-memory mock connector for pipeline tests

use super::{
    Connector, ConnectorFactory, Discovery, DiscoveryRequest, EntityDescriptor, FieldDescriptor,
};
use crate::error::{Error, Result};
use crate::model::{DataSource, SourceKind};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One scripted entity with its fields and rows
#[derive(Debug, Clone)]
pub struct MockEntity {
    pub name: String,
    pub entity_type: String,
    /// (field name, data type)
    pub fields: Vec<(String, String)>,
    pub rows: Vec<HashMap<String, String>>,
}

/// Shared scripted backend; clone the `Arc` into a factory to observe
/// calls made during a scan or DSR execution.
#[derive(Debug, Default)]
pub struct MockBackend {
    entities: Mutex<Vec<MockEntity>>,
    /// Recorded (entity, filter) pairs for every delete call
    pub delete_calls: Mutex<Vec<(String, HashMap<String, String>)>>,
    /// Recorded entity names for every export call
    pub export_calls: Mutex<Vec<String>>,
    /// Fail `connect` with a connector error
    pub fail_connect: Mutex<bool>,
    /// Fail `get_fields` for this entity name (partial enumeration)
    pub fail_fields_for: Mutex<Option<String>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add an entity; fields are (name, data_type) pairs, rows are
    /// field-name keyed values.
    pub fn add_entity(
        self: &Arc<Self>,
        name: &str,
        fields: &[(&str, &str)],
        rows: Vec<HashMap<String, String>>,
    ) -> Arc<Self> {
        self.entities.lock().unwrap().push(MockEntity {
            name: name.to_string(),
            entity_type: "table".to_string(),
            fields: fields
                .iter()
                .map(|(n, t)| (n.to_string(), t.to_string()))
                .collect(),
            rows,
        });
        self.clone()
    }

    pub fn set_fail_connect(&self, fail: bool) {
        *self.fail_connect.lock().unwrap() = fail;
    }

    pub fn set_fail_fields_for(&self, entity: Option<&str>) {
        *self.fail_fields_for.lock().unwrap() = entity.map(|e| e.to_string());
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_calls.lock().unwrap().len()
    }

    fn entity(&self, name: &str) -> Result<MockEntity> {
        self.entities
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| Error::Connector(format!("unknown entity '{}'", name)))
    }

    fn matches(row: &HashMap<String, String>, filter: &HashMap<String, String>) -> bool {
        !filter.is_empty()
            && filter.iter().all(|(key, value)| {
                row.iter().any(|(field, cell)| {
                    field.eq_ignore_ascii_case(key) && cell.eq_ignore_ascii_case(value)
                })
            })
    }
}

/// Connector over a [`MockBackend`]
pub struct MockConnector {
    backend: Arc<MockBackend>,
}

impl MockConnector {
    pub fn new(backend: Arc<MockBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&mut self) -> Result<()> {
        if *self.backend.fail_connect.lock().unwrap() {
            return Err(Error::Connector("mock connection refused".to_string()));
        }
        Ok(())
    }

    async fn discover_schema(&self, req: &DiscoveryRequest) -> Result<Discovery> {
        // The mock has no modification times; incremental requests fall
        // back to full enumeration.
        let _ = req;
        let entities = self.backend.entities.lock().unwrap();
        Ok(Discovery {
            total_entities: entities.len() as u64,
            entities: entities
                .iter()
                .map(|e| EntityDescriptor {
                    name: e.name.clone(),
                    entity_type: e.entity_type.clone(),
                    record_count: Some(e.rows.len() as u64),
                    modified_at: None,
                })
                .collect(),
        })
    }

    async fn get_fields(&self, entity: &str) -> Result<Vec<FieldDescriptor>> {
        if self
            .backend
            .fail_fields_for
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|e| e == entity)
        {
            return Err(Error::Connector(format!(
                "mock field enumeration failure for '{}'",
                entity
            )));
        }
        let entity = self.backend.entity(entity)?;
        Ok(entity
            .fields
            .iter()
            .map(|(name, data_type)| FieldDescriptor {
                name: name.clone(),
                data_type: data_type.clone(),
            })
            .collect())
    }

    async fn sample_values(
        &self,
        entity: &str,
        field: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        let entity = self.backend.entity(entity)?;
        Ok(entity
            .rows
            .iter()
            .filter_map(|row| row.get(field))
            .filter(|v| !v.is_empty())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn export_records(
        &self,
        entity: &str,
        filter: &HashMap<String, String>,
    ) -> Result<Vec<serde_json::Value>> {
        self.backend
            .export_calls
            .lock()
            .unwrap()
            .push(entity.to_string());
        let entity = self.backend.entity(entity)?;
        Ok(entity
            .rows
            .iter()
            .filter(|row| MockBackend::matches(row, filter))
            .map(|row| serde_json::to_value(row).unwrap_or(serde_json::Value::Null))
            .collect())
    }

    async fn delete_records(
        &self,
        entity_name: &str,
        filter: &HashMap<String, String>,
    ) -> Result<u64> {
        self.backend
            .delete_calls
            .lock()
            .unwrap()
            .push((entity_name.to_string(), filter.clone()));

        let mut entities = self.backend.entities.lock().unwrap();
        let entity = entities
            .iter_mut()
            .find(|e| e.name == entity_name)
            .ok_or_else(|| Error::Connector(format!("unknown entity '{}'", entity_name)))?;

        let before = entity.rows.len();
        entity.rows.retain(|row| !MockBackend::matches(row, filter));
        Ok((before - entity.rows.len()) as u64)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Factory serving mock connectors keyed by source id
pub struct MockConnectorFactory {
    kind: SourceKind,
    backends: HashMap<String, Arc<MockBackend>>,
}

impl MockConnectorFactory {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            backends: HashMap::new(),
        }
    }

    /// Serve the given backend for the given source id
    pub fn with_backend(mut self, source_id: &str, backend: Arc<MockBackend>) -> Self {
        self.backends.insert(source_id.to_string(), backend);
        self
    }
}

impl ConnectorFactory for MockConnectorFactory {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn create(&self, source: &DataSource) -> Result<Box<dyn Connector>> {
        let backend = self.backends.get(&source.id).ok_or_else(|| {
            Error::Connector(format!("no mock backend for source '{}'", source.id))
        })?;
        Ok(Box::new(MockConnector::new(backend.clone())))
    }
}

/// Build a row from (field, value) pairs
pub fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
