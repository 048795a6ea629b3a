//! Inventory tree and PII classification records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broad category of personal data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    Contact,
    Identity,
    Financial,
    Health,
    Credential,
    Location,
    Other,
}

impl std::fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contact => write!(f, "contact"),
            Self::Identity => write!(f, "identity"),
            Self::Financial => write!(f, "financial"),
            Self::Health => write!(f, "health"),
            Self::Credential => write!(f, "credential"),
            Self::Location => write!(f, "location"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Sensitivity tier of classified data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityLevel {
    Low,
    Moderate,
    High,
    Critical,
}

/// Human review state of a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

/// One row per data source summarizing what discovery found
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataInventory {
    pub id: String,
    pub tenant_id: String,
    pub source_id: String,
    pub total_entities: u64,
    pub pii_fields_count: u64,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

impl DataInventory {
    pub fn new(tenant_id: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            source_id: source_id.into(),
            total_entities: 0,
            pii_fields_count: 0,
            last_scanned_at: None,
        }
    }
}

/// A table, collection or drive item discovered under an inventory
///
/// Matched across scans by name; a renamed entity is treated as new.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataEntity {
    pub id: String,
    pub inventory_id: String,
    pub name: String,
    /// Backend-specific kind label (table, collection, file, ...)
    pub entity_type: String,
    pub record_count: Option<u64>,
    pub discovered_at: DateTime<Utc>,
}

impl DataEntity {
    pub fn new(
        inventory_id: impl Into<String>,
        name: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            inventory_id: inventory_id.into(),
            name: name.into(),
            entity_type: entity_type.into(),
            record_count: None,
            discovered_at: Utc::now(),
        }
    }
}

/// A column or key discovered under an entity, matched by name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataField {
    pub id: String,
    pub entity_id: String,
    pub name: String,
    /// Declared type as reported by the backend
    pub data_type: String,
    pub discovered_at: DateTime<Utc>,
}

impl DataField {
    pub fn new(
        entity_id: impl Into<String>,
        name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entity_id: entity_id.into(),
            name: name.into(),
            data_type: data_type.into(),
            discovered_at: Utc::now(),
        }
    }
}

/// Verdict that one (entity, field) pair contains personal data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PiiClassification {
    pub id: String,
    pub tenant_id: String,
    pub source_id: String,
    pub entity_id: String,
    pub field_id: String,
    pub category: PiiCategory,
    /// Specific type tag (e.g. "EMAIL", "PHONE")
    pub pii_type: String,
    pub sensitivity: SensitivityLevel,
    /// Merged confidence in [0, 1]
    pub confidence: f64,
    /// Primary detection method
    pub method: String,
    /// Every contributing method, primary first
    pub methods: Vec<String>,
    pub reasoning: String,
    pub verification: VerificationStatus,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitivity_ordering() {
        assert!(SensitivityLevel::Critical > SensitivityLevel::High);
        assert!(SensitivityLevel::Moderate > SensitivityLevel::Low);
    }

    #[test]
    fn test_inventory_serialization() {
        let inv = DataInventory::new("tenant-1", "src-1");
        let json = serde_json::to_string(&inv).unwrap();
        assert!(json.contains("\"sourceId\":\"src-1\""));
        assert!(json.contains("\"piiFieldsCount\":0"));
    }
}
