//! Value-pattern detection strategy

use super::{DetectionInput, DetectionStrategy, PiiCandidate};
use crate::config::DetectionRule;
use crate::error::{Error, Result};
use crate::model::{PiiCategory, SensitivityLevel};
use regex::Regex;

/// Method tag for this strategy
pub const METHOD: &str = "value_pattern";

/// Detects PII by matching compiled regex rules against sampled values
///
/// Confidence is the fraction of non-empty samples that fully match a
/// rule, so a column where every sampled value looks like an email scores
/// 1.0 and a column with one stray match scores low.
pub struct PatternStrategy {
    rules: Vec<CompiledRule>,
}

struct CompiledRule {
    name: String,
    pattern: Regex,
    category: PiiCategory,
    pii_type: String,
    sensitivity: SensitivityLevel,
}

impl PatternStrategy {
    /// Compile the given rules
    pub fn new(rules: Vec<DetectionRule>) -> Result<Self> {
        let compiled = rules
            .into_iter()
            .map(|rule| {
                let pattern = Regex::new(&rule.pattern).map_err(|e| {
                    Error::Detection(format!(
                        "Invalid regex pattern for rule '{}': {}",
                        rule.name, e
                    ))
                })?;
                Ok(CompiledRule {
                    name: rule.name,
                    pattern,
                    category: rule.category,
                    pii_type: rule.pii_type,
                    sensitivity: rule.sensitivity,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules: compiled })
    }
}

impl DetectionStrategy for PatternStrategy {
    fn method(&self) -> &str {
        METHOD
    }

    fn detect(&self, input: &DetectionInput) -> Vec<PiiCandidate> {
        let samples: Vec<&str> = input
            .samples
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if samples.is_empty() {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for rule in &self.rules {
            let matched = samples.iter().filter(|s| rule.pattern.is_match(s)).count();
            if matched == 0 {
                continue;
            }
            let confidence = matched as f64 / samples.len() as f64;
            candidates.push(PiiCandidate {
                category: rule.category,
                pii_type: rule.pii_type.clone(),
                sensitivity: rule.sensitivity,
                confidence,
                method: METHOD.to_string(),
                reasoning: format!(
                    "{} of {} sampled values match the '{}' pattern",
                    matched,
                    samples.len(),
                    rule.name
                ),
            });
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_detection_rules;

    fn make_strategy() -> PatternStrategy {
        PatternStrategy::new(default_detection_rules()).unwrap()
    }

    fn input_with_samples(samples: &[&str]) -> DetectionInput {
        DetectionInput {
            entity_name: "users".to_string(),
            field_name: "value".to_string(),
            data_type: "text".to_string(),
            samples: samples.iter().map(|s| s.to_string()).collect(),
            adjacent_fields: Vec::new(),
        }
    }

    #[test]
    fn test_all_samples_match_email() {
        let strategy = make_strategy();
        let input = input_with_samples(&["a@example.com", "b@example.org", "c@test.io"]);

        let candidates = strategy.detect(&input);
        let email = candidates.iter().find(|c| c.pii_type == "EMAIL").unwrap();
        assert!((email.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(email.category, PiiCategory::Contact);
        assert_eq!(email.method, "value_pattern");
    }

    #[test]
    fn test_partial_match_lowers_confidence() {
        let strategy = make_strategy();
        let input = input_with_samples(&["a@example.com", "not an email", "also not", "nope"]);

        let candidates = strategy.detect(&input);
        let email = candidates.iter().find(|c| c.pii_type == "EMAIL").unwrap();
        assert!((email.confidence - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_samples_no_opinion() {
        let strategy = make_strategy();
        assert!(strategy.detect(&input_with_samples(&[])).is_empty());
        // Whitespace-only samples are ignored too
        assert!(strategy.detect(&input_with_samples(&["  ", ""])).is_empty());
    }

    #[test]
    fn test_ssn_is_critical() {
        let strategy = make_strategy();
        let input = input_with_samples(&["123-45-6789"]);

        let candidates = strategy.detect(&input);
        let ssn = candidates.iter().find(|c| c.pii_type == "SSN").unwrap();
        assert_eq!(ssn.sensitivity, SensitivityLevel::Critical);
        assert_eq!(ssn.category, PiiCategory::Identity);
    }

    #[test]
    fn test_invalid_rule_rejected() {
        let rules = vec![DetectionRule {
            name: "broken".to_string(),
            pattern: "([".to_string(),
            category: PiiCategory::Other,
            pii_type: "X".to_string(),
            sensitivity: SensitivityLevel::Low,
            description: String::new(),
        }];
        assert!(PatternStrategy::new(rules).is_err());
    }
}
