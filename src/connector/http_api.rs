//! Generic REST API connector (cloud drive / mail style backends)

use super::{
    Connector, ConnectorFactory, Discovery, DiscoveryRequest, EntityDescriptor, FieldDescriptor,
};
use crate::error::{Error, Result};
use crate::model::{DataSource, SourceKind, SourceSettings};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaResponse {
    entities: Vec<EntityItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityItem {
    name: String,
    #[serde(default = "default_entity_type")]
    entity_type: String,
    record_count: Option<u64>,
    modified_at: Option<DateTime<Utc>>,
}

fn default_entity_type() -> String {
    "collection".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldItem {
    name: String,
    #[serde(default = "default_data_type")]
    data_type: String,
}

fn default_data_type() -> String {
    "string".to_string()
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    deleted: u64,
}

/// Connector for API-backed sources exposing a generic inventory surface
///
/// Expects the backend (or its sync bridge) to serve:
/// `GET /schema`, `GET /entities/{name}/fields`,
/// `GET /entities/{name}/sample`, `POST /entities/{name}/export`,
/// `POST /entities/{name}/delete`. Bearer authentication; the token is
/// resolved from the environment via the source's credential reference.
pub struct HttpApiConnector {
    name: String,
    settings: SourceSettings,
    http: reqwest::Client,
    connected: bool,
}

impl HttpApiConnector {
    pub fn new(source: &DataSource, call_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(call_timeout)
            .build()
            .map_err(|e| Error::Connector(format!("HTTP client build failed: {}", e)))?;
        Ok(Self {
            name: source.name.clone(),
            settings: source.settings.clone(),
            http,
            connected: false,
        })
    }

    fn base_url(&self) -> Result<&str> {
        self.settings
            .base_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .ok_or_else(|| Error::Config(format!("'{}' has no base URL configured", self.name)))
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.connected {
            return Err(Error::Connector(format!("'{}' is not connected", self.name)));
        }
        Ok(())
    }

    fn bearer_token(&self) -> Option<String> {
        self.settings
            .token_ref
            .as_ref()
            .and_then(|token_ref| std::env::var(token_ref).ok())
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, url);
        if let Some(token) = self.bearer_token() {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T> {
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Connector for HttpApiConnector {
    async fn connect(&mut self) -> Result<()> {
        let url = format!("{}/health", self.base_url()?);
        self.request(reqwest::Method::GET, url)
            .send()
            .await?
            .error_for_status()?;
        self.connected = true;
        tracing::debug!("Connected to API source '{}'", self.name);
        Ok(())
    }

    async fn discover_schema(&self, req: &DiscoveryRequest) -> Result<Discovery> {
        self.ensure_connected()?;
        let mut url = format!("{}/schema", self.base_url()?);
        if let Some(since) = req.changed_since {
            // The backend may honor the filter or ignore it; either way
            // nothing is silently skipped on our side.
            url.push_str(&format!("?changed_since={}", since.to_rfc3339()));
        }
        let schema: SchemaResponse = self.get_json(url).await?;

        let total = schema.entities.len() as u64;
        let entities = schema
            .entities
            .into_iter()
            .map(|e| EntityDescriptor {
                name: e.name,
                entity_type: e.entity_type,
                record_count: e.record_count,
                modified_at: e.modified_at,
            })
            .collect();

        Ok(Discovery {
            total_entities: total,
            entities,
        })
    }

    async fn get_fields(&self, entity: &str) -> Result<Vec<FieldDescriptor>> {
        self.ensure_connected()?;
        let url = format!("{}/entities/{}/fields", self.base_url()?, entity);
        let fields: Vec<FieldItem> = self.get_json(url).await?;
        Ok(fields
            .into_iter()
            .map(|f| FieldDescriptor {
                name: f.name,
                data_type: f.data_type,
            })
            .collect())
    }

    async fn sample_values(
        &self,
        entity: &str,
        field: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        self.ensure_connected()?;
        let url = format!(
            "{}/entities/{}/sample?field={}&limit={}",
            self.base_url()?,
            entity,
            field,
            limit
        );
        // Sampling is best-effort: a backend that cannot produce samples
        // (binary content, no read scope) yields an empty set.
        match self.get_json::<Vec<String>>(url).await {
            Ok(values) => Ok(values),
            Err(e) => {
                tracing::debug!(
                    "'{}': sampling {}.{} unavailable: {}",
                    self.name,
                    entity,
                    field,
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    async fn export_records(
        &self,
        entity: &str,
        filter: &HashMap<String, String>,
    ) -> Result<Vec<serde_json::Value>> {
        self.ensure_connected()?;
        let url = format!("{}/entities/{}/export", self.base_url()?, entity);
        let response = self
            .request(reqwest::Method::POST, url)
            .json(filter)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn delete_records(
        &self,
        entity: &str,
        filter: &HashMap<String, String>,
    ) -> Result<u64> {
        self.ensure_connected()?;
        if filter.is_empty() {
            tracing::warn!("'{}': delete with empty filter, refusing", self.name);
            return Ok(0);
        }
        let url = format!("{}/entities/{}/delete", self.base_url()?, entity);
        let response = self
            .request(reqwest::Method::POST, url)
            .json(filter)
            .send()
            .await?
            .error_for_status()?;
        let body: DeleteResponse = response.json().await?;
        Ok(body.deleted)
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }
}

/// Factory for [`HttpApiConnector`]
pub struct HttpApiConnectorFactory {
    call_timeout: Duration,
}

impl HttpApiConnectorFactory {
    pub fn new(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }
}

impl ConnectorFactory for HttpApiConnectorFactory {
    fn kind(&self) -> SourceKind {
        SourceKind::HttpApi
    }

    fn create(&self, source: &DataSource) -> Result<Box<dyn Connector>> {
        Ok(Box::new(HttpApiConnector::new(source, self.call_timeout)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_source(base_url: Option<&str>) -> DataSource {
        DataSource::new(
            "tenant-1",
            "mail",
            SourceKind::HttpApi,
            SourceSettings {
                base_url: base_url.map(|s| s.to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_base_url_required() {
        let connector =
            HttpApiConnector::new(&make_source(None), Duration::from_secs(5)).unwrap();
        assert!(matches!(connector.base_url().unwrap_err(), Error::Config(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let connector = HttpApiConnector::new(
            &make_source(Some("https://api.example.com/v1/")),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(connector.base_url().unwrap(), "https://api.example.com/v1");
    }

    #[test]
    fn test_schema_response_parsing() {
        let json = r#"{
            "entities": [
                {"name": "messages", "entityType": "mailbox", "recordCount": 120},
                {"name": "contacts"}
            ]
        }"#;
        let schema: SchemaResponse = serde_json::from_str(json).unwrap();
        assert_eq!(schema.entities.len(), 2);
        assert_eq!(schema.entities[0].entity_type, "mailbox");
        assert_eq!(schema.entities[1].entity_type, "collection");
    }
}
