//! PIIGuard configuration management

use crate::model::{PiiCategory, SensitivityLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main PIIGuard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PiiGuardConfig {
    /// Scan orchestration configuration
    #[serde(default)]
    pub scan: ScanConfig,

    /// DSR execution configuration
    #[serde(default)]
    pub dsr: DsrConfig,

    /// Detection engine configuration
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Connector configuration
    #[serde(default)]
    pub connectors: ConnectorConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Scan orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Maximum concurrently running scans per tenant
    pub max_concurrent_per_tenant: usize,

    /// Values sampled per field during discovery
    pub sample_limit: usize,

    /// Queue workers pulling scan jobs
    pub queue_workers: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_tenant: 3,
            sample_limit: 10,
            queue_workers: 2,
        }
    }
}

/// DSR execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DsrConfig {
    /// Maximum concurrent tasks (connector sessions) per execution
    pub task_concurrency: usize,
}

impl Default for DsrConfig {
    fn default() -> Self {
        Self { task_concurrency: 5 }
    }
}

/// Detection engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum merged confidence required to persist a classification.
    /// 0.0 disables the floor: any top match counts as PII.
    pub min_confidence: f64,

    /// Per-strategy weight overrides keyed by method tag
    #[serde(default)]
    pub weights: HashMap<String, f64>,

    /// Value pattern rules; empty means the shipped defaults
    #[serde(default)]
    pub rules: Vec<DetectionRule>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
            weights: HashMap::new(),
            rules: Vec::new(),
        }
    }
}

impl DetectionConfig {
    /// Effective rule set: configured rules, or the shipped defaults
    pub fn effective_rules(&self) -> Vec<DetectionRule> {
        if self.rules.is_empty() {
            default_detection_rules()
        } else {
            self.rules.clone()
        }
    }

    /// Weight for a strategy method tag (1.0 when not configured)
    pub fn weight_for(&self, method: &str) -> f64 {
        self.weights.get(method).copied().unwrap_or(1.0)
    }
}

/// Connector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Per-call timeout at the connector boundary, in seconds
    pub call_timeout_secs: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self { call_timeout_secs: 30 }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base data directory; defaults to ~/.piiguard
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the base data directory
    pub fn base_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs_next::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".piiguard")
        })
    }
}

/// A single value-pattern detection rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRule {
    /// Rule name
    pub name: String,

    /// Regex pattern matched against sampled values
    pub pattern: String,

    /// PII category assigned on match
    pub category: PiiCategory,

    /// Specific type tag (e.g. "EMAIL")
    pub pii_type: String,

    /// Sensitivity tier assigned on match
    pub sensitivity: SensitivityLevel,

    /// Human-readable description
    pub description: String,
}

/// Default value-pattern rules shipped with PIIGuard
pub fn default_detection_rules() -> Vec<DetectionRule> {
    vec![
        DetectionRule {
            name: "email".to_string(),
            pattern: r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$".to_string(),
            category: PiiCategory::Contact,
            pii_type: "EMAIL".to_string(),
            sensitivity: SensitivityLevel::Moderate,
            description: "Email address".to_string(),
        },
        DetectionRule {
            name: "phone".to_string(),
            pattern: r"^\+?[0-9][0-9\-\s().]{6,18}[0-9]$".to_string(),
            category: PiiCategory::Contact,
            pii_type: "PHONE".to_string(),
            sensitivity: SensitivityLevel::Moderate,
            description: "Phone number".to_string(),
        },
        DetectionRule {
            name: "ssn".to_string(),
            pattern: r"^\d{3}-\d{2}-\d{4}$".to_string(),
            category: PiiCategory::Identity,
            pii_type: "SSN".to_string(),
            sensitivity: SensitivityLevel::Critical,
            description: "US Social Security number".to_string(),
        },
        DetectionRule {
            name: "credit_card".to_string(),
            pattern: r"^(?:\d[ -]?){13,16}$".to_string(),
            category: PiiCategory::Financial,
            pii_type: "CREDIT_CARD".to_string(),
            sensitivity: SensitivityLevel::Critical,
            description: "Payment card number".to_string(),
        },
        DetectionRule {
            name: "iban".to_string(),
            pattern: r"^[A-Z]{2}\d{2}[A-Z0-9]{11,30}$".to_string(),
            category: PiiCategory::Financial,
            pii_type: "IBAN".to_string(),
            sensitivity: SensitivityLevel::High,
            description: "International bank account number".to_string(),
        },
        DetectionRule {
            name: "ip_address".to_string(),
            pattern: r"^(?:\d{1,3}\.){3}\d{1,3}$".to_string(),
            category: PiiCategory::Location,
            pii_type: "IP_ADDRESS".to_string(),
            sensitivity: SensitivityLevel::Low,
            description: "IPv4 address".to_string(),
        },
        DetectionRule {
            name: "date_of_birth".to_string(),
            pattern: r"^(19|20)\d{2}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$".to_string(),
            category: PiiCategory::Identity,
            pii_type: "DATE_OF_BIRTH".to_string(),
            sensitivity: SensitivityLevel::High,
            description: "ISO date plausibly a birth date".to_string(),
        },
        DetectionRule {
            name: "postal_code".to_string(),
            pattern: r"^\d{5}(-\d{4})?$".to_string(),
            category: PiiCategory::Location,
            pii_type: "POSTAL_CODE".to_string(),
            sensitivity: SensitivityLevel::Low,
            description: "US ZIP code".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PiiGuardConfig::default();
        assert_eq!(config.scan.max_concurrent_per_tenant, 3);
        assert_eq!(config.scan.sample_limit, 10);
        assert_eq!(config.dsr.task_concurrency, 5);
        assert_eq!(config.connectors.call_timeout_secs, 30);
        assert_eq!(config.detection.min_confidence, 0.0);
    }

    #[test]
    fn test_default_rules_compile() {
        for rule in default_detection_rules() {
            assert!(
                regex::Regex::new(&rule.pattern).is_ok(),
                "rule '{}' has an invalid pattern",
                rule.name
            );
        }
    }

    #[test]
    fn test_effective_rules_prefers_configured() {
        let mut config = DetectionConfig::default();
        assert!(!config.effective_rules().is_empty());

        config.rules.push(DetectionRule {
            name: "custom".to_string(),
            pattern: "^x$".to_string(),
            category: PiiCategory::Other,
            pii_type: "CUSTOM".to_string(),
            sensitivity: SensitivityLevel::Low,
            description: "custom".to_string(),
        });
        let rules = config.effective_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "custom");
    }

    #[test]
    fn test_weight_lookup() {
        let mut config = DetectionConfig::default();
        assert_eq!(config.weight_for("value_pattern"), 1.0);
        config.weights.insert("field_name".to_string(), 0.5);
        assert_eq!(config.weight_for("field_name"), 0.5);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PiiGuardConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: PiiGuardConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.scan.max_concurrent_per_tenant, 3);
    }
}
