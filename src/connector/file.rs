//! Uploaded file connector (CSV)

use super::{
    Connector, ConnectorFactory, Discovery, DiscoveryRequest, EntityDescriptor, FieldDescriptor,
};
use crate::error::{Error, Result};
use crate::model::{DataSource, SourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;

/// Connector for uploaded CSV files
///
/// The file is a single entity named after the file stem; the header row
/// is its field list. Deletion rewrites the file without the matching
/// rows.
pub struct FileConnector {
    name: String,
    path: PathBuf,
}

impl FileConnector {
    pub fn new(source: &DataSource) -> Result<Self> {
        let path = source
            .settings
            .path
            .clone()
            .ok_or_else(|| Error::Config(format!("'{}' has no file path configured", source.name)))?;
        Ok(Self {
            name: source.name.clone(),
            path,
        })
    }

    fn entity_name(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("upload")
            .to_string()
    }

    fn read_all(&self) -> Result<(Vec<String>, Vec<Vec<String>>)> {
        let mut reader = csv::Reader::from_path(&self.path)
            .map_err(|e| Error::Connector(format!("'{}': cannot open file: {}", self.name, e)))?;
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| Error::Connector(format!("'{}': cannot read header: {}", self.name, e)))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record
                .map_err(|e| Error::Connector(format!("'{}': bad CSV row: {}", self.name, e)))?;
            rows.push(record.iter().map(|v| v.to_string()).collect());
        }
        Ok((headers, rows))
    }

    fn modified_at(&self) -> Option<DateTime<Utc>> {
        std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    /// Indexes of columns selected by the filter, with their expected
    /// values; header matching is case-insensitive.
    fn filter_indexes(
        headers: &[String],
        filter: &HashMap<String, String>,
    ) -> Vec<(usize, String)> {
        let mut selected = Vec::new();
        for (key, value) in filter {
            if let Some(idx) = headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(key))
            {
                selected.push((idx, value.clone()));
            }
        }
        selected
    }

    fn row_matches(row: &[String], selected: &[(usize, String)]) -> bool {
        !selected.is_empty()
            && selected
                .iter()
                .all(|(idx, value)| row.get(*idx).is_some_and(|v| v.eq_ignore_ascii_case(value)))
    }
}

#[async_trait]
impl Connector for FileConnector {
    async fn connect(&mut self) -> Result<()> {
        if !self.path.is_file() {
            return Err(Error::Connector(format!(
                "'{}': file {} does not exist",
                self.name,
                self.path.display()
            )));
        }
        Ok(())
    }

    async fn discover_schema(&self, req: &DiscoveryRequest) -> Result<Discovery> {
        let modified_at = self.modified_at();
        let mut entities = Vec::new();

        // A file carries a reliable modification time, so incremental
        // discovery can skip it when unchanged.
        let unchanged = match (req.changed_since, modified_at) {
            (Some(since), Some(modified)) => modified <= since,
            _ => false,
        };

        if !unchanged {
            let (_, rows) = self.read_all()?;
            entities.push(EntityDescriptor {
                name: self.entity_name(),
                entity_type: "file".to_string(),
                record_count: Some(rows.len() as u64),
                modified_at,
            });
        }

        Ok(Discovery {
            total_entities: 1,
            entities,
        })
    }

    async fn get_fields(&self, entity: &str) -> Result<Vec<FieldDescriptor>> {
        if entity != self.entity_name() {
            return Err(Error::Connector(format!(
                "'{}': unknown entity '{}'",
                self.name, entity
            )));
        }
        let (headers, _) = self.read_all()?;
        Ok(headers
            .into_iter()
            .map(|name| FieldDescriptor {
                name,
                data_type: "text".to_string(),
            })
            .collect())
    }

    async fn sample_values(
        &self,
        _entity: &str,
        field: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        let (headers, rows) = self.read_all()?;
        let Some(idx) = headers.iter().position(|h| h == field) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .filter_map(|row| row.get(idx))
            .filter(|v| !v.trim().is_empty())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn export_records(
        &self,
        _entity: &str,
        filter: &HashMap<String, String>,
    ) -> Result<Vec<serde_json::Value>> {
        let (headers, rows) = self.read_all()?;
        let selected = Self::filter_indexes(&headers, filter);

        let mut records = Vec::new();
        for row in &rows {
            if Self::row_matches(row, &selected) {
                let mut object = serde_json::Map::new();
                for (header, value) in headers.iter().zip(row) {
                    object.insert(header.clone(), serde_json::Value::String(value.clone()));
                }
                records.push(serde_json::Value::Object(object));
            }
        }
        Ok(records)
    }

    async fn delete_records(
        &self,
        _entity: &str,
        filter: &HashMap<String, String>,
    ) -> Result<u64> {
        if filter.is_empty() {
            tracing::warn!("'{}': delete with empty filter, refusing", self.name);
            return Ok(0);
        }

        let (headers, rows) = self.read_all()?;
        let selected = Self::filter_indexes(&headers, filter);
        if selected.is_empty() {
            return Ok(0);
        }

        let (kept, removed): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .partition(|row| !Self::row_matches(row, &selected));

        if removed.is_empty() {
            return Ok(0);
        }

        let mut writer = csv::Writer::from_path(&self.path)
            .map_err(|e| Error::Connector(format!("'{}': cannot rewrite file: {}", self.name, e)))?;
        writer
            .write_record(&headers)
            .map_err(|e| Error::Connector(format!("'{}': write failed: {}", self.name, e)))?;
        for row in &kept {
            writer
                .write_record(row)
                .map_err(|e| Error::Connector(format!("'{}': write failed: {}", self.name, e)))?;
        }
        writer
            .flush()
            .map_err(|e| Error::Connector(format!("'{}': flush failed: {}", self.name, e)))?;

        Ok(removed.len() as u64)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Factory for [`FileConnector`]
pub struct FileConnectorFactory;

impl FileConnectorFactory {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileConnectorFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectorFactory for FileConnectorFactory {
    fn kind(&self) -> SourceKind {
        SourceKind::FileUpload
    }

    fn create(&self, source: &DataSource) -> Result<Box<dyn Connector>> {
        Ok(Box::new(FileConnector::new(source)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceSettings;
    use std::io::Write;
    use tempfile::TempDir;

    fn make_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn make_connector(path: PathBuf) -> FileConnector {
        let source = DataSource::new(
            "tenant-1",
            "upload",
            SourceKind::FileUpload,
            SourceSettings {
                path: Some(path),
                ..Default::default()
            },
        );
        FileConnector::new(&source).unwrap()
    }

    const SAMPLE: &str = "email,name,age\n\
        jane@example.com,Jane,33\n\
        bob@example.com,Bob,41\n\
        jane@example.com,Jane Again,29\n";

    #[tokio::test]
    async fn test_discovery_and_fields() {
        let dir = TempDir::new().unwrap();
        let path = make_csv(&dir, "customers.csv", SAMPLE);
        let mut connector = make_connector(path);

        connector.connect().await.unwrap();
        let discovery = connector
            .discover_schema(&DiscoveryRequest::default())
            .await
            .unwrap();
        assert_eq!(discovery.entities.len(), 1);
        assert_eq!(discovery.entities[0].name, "customers");
        assert_eq!(discovery.entities[0].record_count, Some(3));

        let fields = connector.get_fields("customers").await.unwrap();
        assert_eq!(
            fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["email", "name", "age"]
        );
    }

    #[tokio::test]
    async fn test_incremental_skips_unchanged_file() {
        let dir = TempDir::new().unwrap();
        let path = make_csv(&dir, "customers.csv", SAMPLE);
        let connector = make_connector(path);

        let future = Utc::now() + chrono::Duration::hours(1);
        let discovery = connector
            .discover_schema(&DiscoveryRequest {
                changed_since: Some(future),
            })
            .await
            .unwrap();
        assert!(discovery.entities.is_empty());
        assert_eq!(discovery.total_entities, 1);
    }

    #[tokio::test]
    async fn test_sampling() {
        let dir = TempDir::new().unwrap();
        let path = make_csv(&dir, "customers.csv", SAMPLE);
        let connector = make_connector(path);

        let samples = connector
            .sample_values("customers", "email", 2)
            .await
            .unwrap();
        assert_eq!(samples, vec!["jane@example.com", "bob@example.com"]);

        // Unknown field: empty, not an error
        let none = connector
            .sample_values("customers", "missing", 5)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_export_case_insensitive_filter() {
        let dir = TempDir::new().unwrap();
        let path = make_csv(&dir, "customers.csv", SAMPLE);
        let connector = make_connector(path);

        let mut filter = HashMap::new();
        filter.insert("EMAIL".to_string(), "JANE@example.com".to_string());
        let records = connector.export_records("customers", &filter).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], "Jane");
    }

    #[tokio::test]
    async fn test_delete_rewrites_file() {
        let dir = TempDir::new().unwrap();
        let path = make_csv(&dir, "customers.csv", SAMPLE);
        let connector = make_connector(path.clone());

        let mut filter = HashMap::new();
        filter.insert("email".to_string(), "jane@example.com".to_string());
        let deleted = connector.delete_records("customers", &filter).await.unwrap();
        assert_eq!(deleted, 2);

        let remaining = std::fs::read_to_string(&path).unwrap();
        assert!(remaining.contains("bob@example.com"));
        assert!(!remaining.contains("jane@example.com"));
    }

    #[tokio::test]
    async fn test_connect_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut connector = make_connector(dir.path().join("missing.csv"));
        assert!(connector.connect().await.is_err());
    }
}
