//! PII detection engine
//!
//! Pluggable detection strategies inspect one field (name, declared type,
//! sampled values, adjacent field names) and emit zero or more candidates.
//! The [`CompositeDetector`] merges candidates from every registered
//! strategy into a single ranked classification per field.

mod composite;
mod names;
mod patterns;

pub use composite::{CompositeDetector, FieldDetection, MergedCandidate};
pub use names::FieldNameStrategy;
pub use patterns::PatternStrategy;

use crate::model::{PiiCategory, SensitivityLevel};

/// Everything a strategy gets to see about one field
#[derive(Debug, Clone, Default)]
pub struct DetectionInput {
    /// Entity (table/collection/file) name
    pub entity_name: String,
    /// Field (column/key) name
    pub field_name: String,
    /// Declared data type as reported by the backend
    pub data_type: String,
    /// Sampled values (best-effort, possibly empty)
    pub samples: Vec<String>,
    /// Names of sibling fields on the same entity
    pub adjacent_fields: Vec<String>,
}

/// One strategy's opinion about a field
#[derive(Debug, Clone)]
pub struct PiiCandidate {
    pub category: PiiCategory,
    pub pii_type: String,
    pub sensitivity: SensitivityLevel,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Method tag identifying the strategy
    pub method: String,
    pub reasoning: String,
}

/// A pluggable PII scorer
///
/// Returning an empty vec means the strategy has no opinion; several
/// candidates mean the field is ambiguous.
pub trait DetectionStrategy: Send + Sync {
    /// Method tag recorded on candidates from this strategy
    fn method(&self) -> &str;

    /// Inspect one field
    fn detect(&self, input: &DetectionInput) -> Vec<PiiCandidate>;
}
