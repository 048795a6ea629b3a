//! Data source records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Backend technology behind a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Relational database (PostgreSQL)
    Postgres,
    /// Cloud drive / mail style REST API
    HttpApi,
    /// Uploaded CSV or JSON file
    FileUpload,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::HttpApi => write!(f, "http_api"),
            Self::FileUpload => write!(f, "file_upload"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(Self::Postgres),
            "http_api" => Ok(Self::HttpApi),
            "file_upload" => Ok(Self::FileUpload),
            other => Err(format!("unknown source kind: {}", other)),
        }
    }
}

/// How erasure is carried out against this source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionMode {
    /// Connector deletes matching rows directly
    Auto,
    /// A human must confirm and perform the deletion
    Manual,
}

/// Last observed connection state of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
}

/// Connection settings for a data source
///
/// Which fields are populated depends on the source kind. Credentials are
/// stored as references into the secret store, never inline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSettings {
    /// Database host
    pub host: Option<String>,
    /// Database port
    pub port: Option<u16>,
    /// Database name
    pub database: Option<String>,
    /// Database user
    pub username: Option<String>,
    /// Credential reference for the database password
    pub password_ref: Option<String>,
    /// Base URL for API-backed sources
    pub base_url: Option<String>,
    /// Credential reference for the API bearer token
    pub token_ref: Option<String>,
    /// Path to the uploaded file
    pub path: Option<PathBuf>,
}

/// A tenant-owned backend holding subject data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: String,
    pub tenant_id: String,
    /// Display name (e.g. "Production PostgreSQL")
    pub name: String,
    pub kind: SourceKind,
    pub settings: SourceSettings,
    pub deletion_mode: DeletionMode,
    pub connection_status: ConnectionStatus,
    /// Completion time of the last successful scan
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Optional cron schedule for recurring scans
    pub schedule: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DataSource {
    /// Create a new data source with automated deletion
    pub fn new(
        tenant_id: impl Into<String>,
        name: impl Into<String>,
        kind: SourceKind,
        settings: SourceSettings,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            kind,
            settings,
            deletion_mode: DeletionMode::Auto,
            connection_status: ConnectionStatus::Disconnected,
            last_synced_at: None,
            schedule: None,
            created_at: Utc::now(),
        }
    }
}
