//! Field-name heuristic detection strategy

use super::{DetectionInput, DetectionStrategy, PiiCandidate};
use crate::model::{PiiCategory, SensitivityLevel};

/// Method tag for this strategy
pub const METHOD: &str = "field_name";

/// Keyword entry in the heuristic tables
struct Keyword {
    token: &'static str,
    category: PiiCategory,
    pii_type: &'static str,
    sensitivity: SensitivityLevel,
    confidence: f64,
}

const EXACT: &[Keyword] = &[
    Keyword { token: "email", category: PiiCategory::Contact, pii_type: "EMAIL", sensitivity: SensitivityLevel::Moderate, confidence: 0.9 },
    Keyword { token: "email_address", category: PiiCategory::Contact, pii_type: "EMAIL", sensitivity: SensitivityLevel::Moderate, confidence: 0.9 },
    Keyword { token: "phone", category: PiiCategory::Contact, pii_type: "PHONE", sensitivity: SensitivityLevel::Moderate, confidence: 0.85 },
    Keyword { token: "phone_number", category: PiiCategory::Contact, pii_type: "PHONE", sensitivity: SensitivityLevel::Moderate, confidence: 0.9 },
    Keyword { token: "mobile", category: PiiCategory::Contact, pii_type: "PHONE", sensitivity: SensitivityLevel::Moderate, confidence: 0.8 },
    Keyword { token: "ssn", category: PiiCategory::Identity, pii_type: "SSN", sensitivity: SensitivityLevel::Critical, confidence: 0.95 },
    Keyword { token: "social_security_number", category: PiiCategory::Identity, pii_type: "SSN", sensitivity: SensitivityLevel::Critical, confidence: 0.95 },
    Keyword { token: "first_name", category: PiiCategory::Identity, pii_type: "NAME", sensitivity: SensitivityLevel::Moderate, confidence: 0.85 },
    Keyword { token: "last_name", category: PiiCategory::Identity, pii_type: "NAME", sensitivity: SensitivityLevel::Moderate, confidence: 0.85 },
    Keyword { token: "full_name", category: PiiCategory::Identity, pii_type: "NAME", sensitivity: SensitivityLevel::Moderate, confidence: 0.85 },
    Keyword { token: "surname", category: PiiCategory::Identity, pii_type: "NAME", sensitivity: SensitivityLevel::Moderate, confidence: 0.8 },
    Keyword { token: "date_of_birth", category: PiiCategory::Identity, pii_type: "DATE_OF_BIRTH", sensitivity: SensitivityLevel::High, confidence: 0.9 },
    Keyword { token: "dob", category: PiiCategory::Identity, pii_type: "DATE_OF_BIRTH", sensitivity: SensitivityLevel::High, confidence: 0.85 },
    Keyword { token: "address", category: PiiCategory::Location, pii_type: "ADDRESS", sensitivity: SensitivityLevel::Moderate, confidence: 0.8 },
    Keyword { token: "street_address", category: PiiCategory::Location, pii_type: "ADDRESS", sensitivity: SensitivityLevel::Moderate, confidence: 0.85 },
    Keyword { token: "zip_code", category: PiiCategory::Location, pii_type: "POSTAL_CODE", sensitivity: SensitivityLevel::Low, confidence: 0.8 },
    Keyword { token: "postal_code", category: PiiCategory::Location, pii_type: "POSTAL_CODE", sensitivity: SensitivityLevel::Low, confidence: 0.8 },
    Keyword { token: "password", category: PiiCategory::Credential, pii_type: "PASSWORD", sensitivity: SensitivityLevel::Critical, confidence: 0.95 },
    Keyword { token: "password_hash", category: PiiCategory::Credential, pii_type: "PASSWORD", sensitivity: SensitivityLevel::Critical, confidence: 0.9 },
    Keyword { token: "api_key", category: PiiCategory::Credential, pii_type: "API_KEY", sensitivity: SensitivityLevel::Critical, confidence: 0.9 },
    Keyword { token: "iban", category: PiiCategory::Financial, pii_type: "IBAN", sensitivity: SensitivityLevel::High, confidence: 0.9 },
    Keyword { token: "card_number", category: PiiCategory::Financial, pii_type: "CREDIT_CARD", sensitivity: SensitivityLevel::Critical, confidence: 0.9 },
    Keyword { token: "credit_card", category: PiiCategory::Financial, pii_type: "CREDIT_CARD", sensitivity: SensitivityLevel::Critical, confidence: 0.9 },
    Keyword { token: "ip_address", category: PiiCategory::Location, pii_type: "IP_ADDRESS", sensitivity: SensitivityLevel::Low, confidence: 0.8 },
    Keyword { token: "diagnosis", category: PiiCategory::Health, pii_type: "MEDICAL", sensitivity: SensitivityLevel::Critical, confidence: 0.8 },
];

const SUBSTRING: &[Keyword] = &[
    Keyword { token: "email", category: PiiCategory::Contact, pii_type: "EMAIL", sensitivity: SensitivityLevel::Moderate, confidence: 0.7 },
    Keyword { token: "phone", category: PiiCategory::Contact, pii_type: "PHONE", sensitivity: SensitivityLevel::Moderate, confidence: 0.65 },
    Keyword { token: "name", category: PiiCategory::Identity, pii_type: "NAME", sensitivity: SensitivityLevel::Moderate, confidence: 0.5 },
    Keyword { token: "birth", category: PiiCategory::Identity, pii_type: "DATE_OF_BIRTH", sensitivity: SensitivityLevel::High, confidence: 0.6 },
    Keyword { token: "address", category: PiiCategory::Location, pii_type: "ADDRESS", sensitivity: SensitivityLevel::Moderate, confidence: 0.55 },
    Keyword { token: "passport", category: PiiCategory::Identity, pii_type: "PASSPORT", sensitivity: SensitivityLevel::Critical, confidence: 0.8 },
    Keyword { token: "secret", category: PiiCategory::Credential, pii_type: "SECRET", sensitivity: SensitivityLevel::Critical, confidence: 0.7 },
    Keyword { token: "token", category: PiiCategory::Credential, pii_type: "API_KEY", sensitivity: SensitivityLevel::High, confidence: 0.55 },
    Keyword { token: "salary", category: PiiCategory::Financial, pii_type: "SALARY", sensitivity: SensitivityLevel::High, confidence: 0.7 },
];

/// Fields commonly adjacent to each other; the presence of a sibling from
/// the same group strengthens a name-based match (e.g. `first_name` next
/// to `last_name`).
const ADJACENT_GROUPS: &[&[&str]] = &[
    &["first_name", "last_name", "middle_name", "full_name"],
    &["street_address", "city", "state", "zip_code", "postal_code", "country"],
    &["email", "phone", "phone_number"],
];

const ADJACENT_BOOST: f64 = 0.05;

/// Detects PII from column/key names, declared types and sibling columns
pub struct FieldNameStrategy;

impl FieldNameStrategy {
    pub fn new() -> Self {
        Self
    }

    fn normalize(name: &str) -> String {
        name.trim()
            .to_lowercase()
            .replace([' ', '-', '.'], "_")
    }

    /// Boost when a sibling field from the same adjacency group is present
    fn adjacency_boost(field: &str, adjacent: &[String]) -> f64 {
        for group in ADJACENT_GROUPS {
            if !group.contains(&field) {
                continue;
            }
            let has_sibling = adjacent
                .iter()
                .map(|a| Self::normalize(a))
                .any(|a| a != field && group.contains(&a.as_str()));
            if has_sibling {
                return ADJACENT_BOOST;
            }
        }
        0.0
    }
}

impl Default for FieldNameStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionStrategy for FieldNameStrategy {
    fn method(&self) -> &str {
        METHOD
    }

    fn detect(&self, input: &DetectionInput) -> Vec<PiiCandidate> {
        let name = Self::normalize(&input.field_name);
        if name.is_empty() {
            return Vec::new();
        }

        let boost = Self::adjacency_boost(&name, &input.adjacent_fields);

        let hit = EXACT
            .iter()
            .find(|k| k.token == name)
            .or_else(|| SUBSTRING.iter().find(|k| name.contains(k.token)));

        let Some(keyword) = hit else {
            return Vec::new();
        };

        // Numeric/binary declared types make a name-only match less likely
        // to hold real values of that kind.
        let type_penalty = match input.data_type.to_lowercase().as_str() {
            t if t.contains("bool") || t.contains("bytea") || t.contains("blob") => 0.2,
            _ => 0.0,
        };

        let confidence = (keyword.confidence + boost - type_penalty).clamp(0.0, 1.0);
        if confidence == 0.0 {
            return Vec::new();
        }

        vec![PiiCandidate {
            category: keyword.category,
            pii_type: keyword.pii_type.to_string(),
            sensitivity: keyword.sensitivity,
            confidence,
            method: METHOD.to_string(),
            reasoning: format!(
                "field name '{}' matches the '{}' keyword",
                input.field_name, keyword.token
            ),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(field: &str) -> DetectionInput {
        DetectionInput {
            entity_name: "users".to_string(),
            field_name: field.to_string(),
            data_type: "text".to_string(),
            samples: Vec::new(),
            adjacent_fields: Vec::new(),
        }
    }

    #[test]
    fn test_exact_match() {
        let strategy = FieldNameStrategy::new();
        let candidates = strategy.detect(&input("email"));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].pii_type, "EMAIL");
        assert!((candidates[0].confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_substring_match() {
        let strategy = FieldNameStrategy::new();
        let candidates = strategy.detect(&input("customer_email_addr"));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].pii_type, "EMAIL");
        assert!(candidates[0].confidence < 0.9);
    }

    #[test]
    fn test_no_opinion_for_unrelated_name() {
        let strategy = FieldNameStrategy::new();
        assert!(strategy.detect(&input("quantity")).is_empty());
    }

    #[test]
    fn test_normalization() {
        let strategy = FieldNameStrategy::new();
        let candidates = strategy.detect(&input("First Name"));
        assert_eq!(candidates[0].pii_type, "NAME");
    }

    #[test]
    fn test_adjacent_sibling_boost() {
        let strategy = FieldNameStrategy::new();

        let alone = strategy.detect(&input("first_name"))[0].confidence;

        let mut with_sibling = input("first_name");
        with_sibling.adjacent_fields = vec!["last_name".to_string(), "age".to_string()];
        let boosted = strategy.detect(&with_sibling)[0].confidence;

        assert!(boosted > alone);
    }

    #[test]
    fn test_type_penalty() {
        let strategy = FieldNameStrategy::new();
        let mut boolean = input("email");
        boolean.data_type = "boolean".to_string();
        let penalized = strategy.detect(&boolean)[0].confidence;
        assert!(penalized < 0.9);
    }
}
