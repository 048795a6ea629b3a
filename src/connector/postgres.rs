//! PostgreSQL connector

use super::{
    Connector, ConnectorFactory, Discovery, DiscoveryRequest, EntityDescriptor, FieldDescriptor,
};
use crate::error::{Error, Result};
use crate::model::{DataSource, SourceKind, SourceSettings};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};

/// Connector for PostgreSQL databases
///
/// Schema discovery goes through `information_schema`; export and delete
/// use parameterized statements with quoted identifiers. Tables carry no
/// modification timestamp in PostgreSQL, so incremental requests fall
/// back to full enumeration.
pub struct PostgresConnector {
    name: String,
    settings: SourceSettings,
    call_timeout: Duration,
    client: Option<Client>,
}

impl PostgresConnector {
    pub fn new(source: &DataSource, call_timeout: Duration) -> Self {
        Self {
            name: source.name.clone(),
            settings: source.settings.clone(),
            call_timeout,
            client: None,
        }
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::Connector(format!("'{}' is not connected", self.name)))
    }

    async fn with_timeout<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, tokio_postgres::Error>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::Connector(format!("{} failed: {}", operation, e))),
            Err(_) => Err(Error::Connector(format!(
                "{} timed out after {:?}",
                operation, self.call_timeout
            ))),
        }
    }

    fn connection_string(&self) -> Result<String> {
        let host = self
            .settings
            .host
            .as_deref()
            .ok_or_else(|| Error::Config(format!("'{}' has no host configured", self.name)))?;
        let database = self
            .settings
            .database
            .as_deref()
            .ok_or_else(|| Error::Config(format!("'{}' has no database configured", self.name)))?;
        let port = self.settings.port.unwrap_or(5432);
        let user = self.settings.username.as_deref().unwrap_or("postgres");

        let mut conn = format!(
            "host={} port={} dbname={} user={}",
            host, port, database, user
        );
        // Credential references resolve through the process environment
        if let Some(password_ref) = &self.settings.password_ref {
            if let Ok(password) = std::env::var(password_ref) {
                conn.push_str(&format!(" password={}", password));
            }
        }
        conn.push_str(&format!(
            " connect_timeout={}",
            self.call_timeout.as_secs().max(1)
        ));
        Ok(conn)
    }
}

/// Quote a SQL identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&mut self) -> Result<()> {
        if let Some(client) = &self.client {
            if !client.is_closed() {
                return Ok(());
            }
        }

        let conn_str = self.connection_string()?;
        let (client, connection) = self
            .with_timeout("connect", tokio_postgres::connect(&conn_str, NoTls))
            .await?;

        let name = self.name.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!("Postgres connection for '{}' ended: {}", name, e);
            }
        });

        // Validate the session before declaring the source connected
        self.with_timeout("connectivity check", client.simple_query("SELECT 1"))
            .await?;

        self.client = Some(client);
        tracing::debug!("Connected to Postgres source '{}'", self.name);
        Ok(())
    }

    async fn discover_schema(&self, req: &DiscoveryRequest) -> Result<Discovery> {
        if req.changed_since.is_some() {
            // No per-table modification timestamps in Postgres; never skip
            // what we cannot time-filter.
            tracing::debug!(
                "'{}': incremental discovery unsupported, enumerating all tables",
                self.name
            );
        }

        let client = self.client()?;
        let rows = self
            .with_timeout(
                "schema discovery",
                client.query(
                    "SELECT table_name FROM information_schema.tables \
                     WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
                     ORDER BY table_name",
                    &[],
                ),
            )
            .await?;

        let entities: Vec<EntityDescriptor> = rows
            .iter()
            .map(|row| EntityDescriptor {
                name: row.get::<_, String>(0),
                entity_type: "table".to_string(),
                record_count: None,
                modified_at: None,
            })
            .collect();

        Ok(Discovery {
            total_entities: entities.len() as u64,
            entities,
        })
    }

    async fn get_fields(&self, entity: &str) -> Result<Vec<FieldDescriptor>> {
        let client = self.client()?;
        let rows = self
            .with_timeout(
                "field enumeration",
                client.query(
                    "SELECT column_name, data_type FROM information_schema.columns \
                     WHERE table_schema = 'public' AND table_name = $1 \
                     ORDER BY ordinal_position",
                    &[&entity],
                ),
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| FieldDescriptor {
                name: row.get::<_, String>(0),
                data_type: row.get::<_, String>(1),
            })
            .collect())
    }

    async fn sample_values(
        &self,
        entity: &str,
        field: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        let client = self.client()?;
        let query = format!(
            "SELECT {col}::text FROM {tbl} WHERE {col} IS NOT NULL LIMIT {limit}",
            col = quote_ident(field),
            tbl = quote_ident(entity),
            limit = limit
        );
        let rows = self
            .with_timeout("sampling", client.query(query.as_str(), &[]))
            .await?;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    async fn export_records(
        &self,
        entity: &str,
        filter: &HashMap<String, String>,
    ) -> Result<Vec<serde_json::Value>> {
        if filter.is_empty() {
            tracing::warn!("'{}': export with empty filter, returning nothing", self.name);
            return Ok(Vec::new());
        }

        let client = self.client()?;
        let (clause, params) = build_filter_clause(filter);
        let query = format!(
            "SELECT row_to_json(t)::text FROM {tbl} t WHERE {clause}",
            tbl = quote_ident(entity),
            clause = clause
        );
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let rows = self
            .with_timeout("export", client.query(query.as_str(), &refs))
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let text: String = row.get(0);
            records.push(serde_json::from_str(&text)?);
        }
        Ok(records)
    }

    async fn delete_records(
        &self,
        entity: &str,
        filter: &HashMap<String, String>,
    ) -> Result<u64> {
        if filter.is_empty() {
            tracing::warn!("'{}': delete with empty filter, refusing", self.name);
            return Ok(0);
        }

        let client = self.client()?;
        let (clause, params) = build_filter_clause(filter);
        let query = format!(
            "DELETE FROM {tbl} WHERE {clause}",
            tbl = quote_ident(entity),
            clause = clause
        );
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        self.with_timeout("delete", client.execute(query.as_str(), &refs))
            .await
    }

    async fn close(&mut self) -> Result<()> {
        self.client = None;
        Ok(())
    }
}

/// Build an AND-ed WHERE clause with positional parameters; value
/// comparison is case-insensitive.
fn build_filter_clause(filter: &HashMap<String, String>) -> (String, Vec<String>) {
    let mut clauses = Vec::with_capacity(filter.len());
    let mut params = Vec::with_capacity(filter.len());
    for (i, (field, value)) in filter.iter().enumerate() {
        clauses.push(format!(
            "lower({col}::text) = lower(${n})",
            col = quote_ident(field),
            n = i + 1
        ));
        params.push(value.clone());
    }
    (clauses.join(" AND "), params)
}

/// Factory for [`PostgresConnector`]
pub struct PostgresConnectorFactory {
    call_timeout: Duration,
}

impl PostgresConnectorFactory {
    pub fn new(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }
}

impl ConnectorFactory for PostgresConnectorFactory {
    fn kind(&self) -> SourceKind {
        SourceKind::Postgres
    }

    fn create(&self, source: &DataSource) -> Result<Box<dyn Connector>> {
        Ok(Box::new(PostgresConnector::new(source, self.call_timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_filter_clause() {
        let mut filter = HashMap::new();
        filter.insert("email".to_string(), "jane@example.com".to_string());
        let (clause, params) = build_filter_clause(&filter);
        assert_eq!(clause, "lower(\"email\"::text) = lower($1)");
        assert_eq!(params, vec!["jane@example.com".to_string()]);
    }

    #[test]
    fn test_connection_string_requires_host() {
        let source = DataSource::new(
            "tenant-1",
            "db",
            SourceKind::Postgres,
            SourceSettings::default(),
        );
        let connector = PostgresConnector::new(&source, Duration::from_secs(5));
        assert!(matches!(
            connector.connection_string().unwrap_err(),
            Error::Config(_)
        ));
    }

    #[tokio::test]
    async fn test_calls_before_connect_fail() {
        let source = DataSource::new(
            "tenant-1",
            "db",
            SourceKind::Postgres,
            SourceSettings {
                host: Some("localhost".to_string()),
                database: Some("app".to_string()),
                ..Default::default()
            },
        );
        let connector = PostgresConnector::new(&source, Duration::from_secs(5));
        let err = connector
            .discover_schema(&DiscoveryRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connector(_)));
    }
}
