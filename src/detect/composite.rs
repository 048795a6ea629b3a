//! Composite detector: weighted aggregation of strategy candidates

use super::{DetectionInput, DetectionStrategy, PiiCandidate};
use crate::config::DetectionConfig;
use crate::model::{PiiCategory, SensitivityLevel};
use std::sync::Arc;

/// A candidate after merging contributions from multiple strategies
#[derive(Debug, Clone)]
pub struct MergedCandidate {
    pub category: PiiCategory,
    pub pii_type: String,
    pub sensitivity: SensitivityLevel,
    /// Weighted average of contributing confidences
    pub confidence: f64,
    /// Contributing method tags in strategy-registration order;
    /// element 0 is the primary method for persistence
    pub methods: Vec<String>,
    pub reasoning: String,
}

/// The aggregated verdict for one field
#[derive(Debug, Clone)]
pub struct FieldDetection {
    /// Whether the field is flagged as PII
    pub is_pii: bool,
    /// Highest-confidence merged candidate, if any cleared the floor
    pub top_match: Option<MergedCandidate>,
    /// All merged candidates, highest confidence first
    pub candidates: Vec<MergedCandidate>,
}

/// Runs every registered strategy against a field and merges the results
///
/// Candidates sharing a (category, type) pair are combined by weighted
/// average; the per-strategy weight comes from configuration and defaults
/// to 1.0. The strategy list is fixed after construction and the detector
/// is safe to share across concurrent scans.
pub struct CompositeDetector {
    strategies: Vec<Arc<dyn DetectionStrategy>>,
    config: DetectionConfig,
}

impl CompositeDetector {
    pub fn new(strategies: Vec<Arc<dyn DetectionStrategy>>, config: DetectionConfig) -> Self {
        Self { strategies, config }
    }

    /// Detect PII in one field
    pub fn detect(&self, input: &DetectionInput) -> FieldDetection {
        // Collect contributions in registration order so the merged
        // methods list is deterministic.
        let mut merged: Vec<MergeSlot> = Vec::new();

        for strategy in &self.strategies {
            let weight = self.config.weight_for(strategy.method());
            for candidate in strategy.detect(input) {
                let slot = merged
                    .iter_mut()
                    .find(|s| s.category == candidate.category && s.pii_type == candidate.pii_type);
                match slot {
                    Some(slot) => slot.add(candidate, weight),
                    None => merged.push(MergeSlot::start(candidate, weight)),
                }
            }
        }

        let mut candidates: Vec<MergedCandidate> =
            merged.into_iter().map(MergeSlot::finish).collect();
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let top_match = candidates
            .first()
            .filter(|c| c.confidence >= self.config.min_confidence)
            .cloned();
        let is_pii = top_match.is_some();

        FieldDetection {
            is_pii,
            top_match,
            candidates,
        }
    }
}

/// Accumulator for one (category, type) pair
struct MergeSlot {
    category: PiiCategory,
    pii_type: String,
    sensitivity: SensitivityLevel,
    weighted_sum: f64,
    weight_total: f64,
    methods: Vec<String>,
    reasons: Vec<String>,
}

impl MergeSlot {
    fn start(candidate: PiiCandidate, weight: f64) -> Self {
        Self {
            category: candidate.category,
            pii_type: candidate.pii_type,
            sensitivity: candidate.sensitivity,
            weighted_sum: candidate.confidence * weight,
            weight_total: weight,
            methods: vec![candidate.method],
            reasons: vec![candidate.reasoning],
        }
    }

    fn add(&mut self, candidate: PiiCandidate, weight: f64) {
        self.weighted_sum += candidate.confidence * weight;
        self.weight_total += weight;
        self.sensitivity = self.sensitivity.max(candidate.sensitivity);
        if !self.methods.contains(&candidate.method) {
            self.methods.push(candidate.method);
        }
        self.reasons.push(candidate.reasoning);
    }

    fn finish(self) -> MergedCandidate {
        let confidence = if self.weight_total > 0.0 {
            self.weighted_sum / self.weight_total
        } else {
            0.0
        };
        MergedCandidate {
            category: self.category,
            pii_type: self.pii_type,
            sensitivity: self.sensitivity,
            confidence,
            methods: self.methods,
            reasoning: self.reasons.join("; "),
        }
    }
}
