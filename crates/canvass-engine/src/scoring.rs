//! Composite confidence per candidate strategy.
//!
//! `confidence = element_ratio * pattern_ratio * usability_ratio`. The factors
//! multiply so that any single missing dimension collapses the score to zero.

use crate::config::ScoringConfig;
use crate::inference::InferenceHint;
use crate::knowledge::KnowledgeBase;
use crate::strategy::{Candidate, StrategyDefinition};
use canvass_common::snapshot::{ElementKind, QuestionSnapshot, SnapshotElement};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceScore {
    pub element_ratio: f64,
    pub pattern_ratio: f64,
    pub usability_ratio: f64,
    pub value: f64,
}

impl ConfidenceScore {
    pub fn compose(element_ratio: f64, pattern_ratio: f64, usability_ratio: f64) -> Self {
        let element_ratio = element_ratio.clamp(0.0, 1.0);
        let pattern_ratio = pattern_ratio.clamp(0.0, 1.0);
        let usability_ratio = usability_ratio.clamp(0.0, 1.0);
        Self {
            element_ratio,
            pattern_ratio,
            usability_ratio,
            value: element_ratio * pattern_ratio * usability_ratio,
        }
    }

    pub fn zero() -> Self {
        Self::compose(0.0, 0.0, 0.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredCandidate<'a> {
    pub strategy: &'a StrategyDefinition,
    /// Raw match signal from the matcher.
    pub signal: f64,
    pub score: ConfidenceScore,
    /// Score after the inference blend. This is what is compared to the threshold.
    pub confidence: f64,
    pub threshold: f64,
    pub eligible: bool,
}

pub struct ConfidenceScorer<'a> {
    config: &'a ScoringConfig,
}

impl<'a> ConfidenceScorer<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self { config }
    }

    pub fn score(
        &self,
        strategy: &StrategyDefinition,
        snapshot: &QuestionSnapshot,
        knowledge: &KnowledgeBase,
    ) -> ConfidenceScore {
        let matched = matched_elements(strategy, snapshot);
        let kinds = strategy.declared_kinds();

        let element_ratio = if kinds.is_empty() {
            if matched.iter().any(|e| e.is_visible()) { 1.0 } else { 0.0 }
        } else {
            let present = kinds
                .iter()
                .filter(|k| matched.iter().any(|e| e.kind == **k && e.is_visible()))
                .count();
            present as f64 / kinds.len() as f64
        };

        let pattern_ratio = if strategy.criteria.keywords.is_empty() {
            1.0
        } else {
            strategy.keyword_signal(&snapshot.normalized_text(), knowledge)
        };

        let usability_ratio = if matched.is_empty() {
            0.0
        } else {
            matched.iter().filter(|e| e.is_interactable()).count() as f64 / matched.len() as f64
        };

        ConfidenceScore::compose(element_ratio, pattern_ratio, usability_ratio)
    }

    /// Scale a score by the inference hint: `value * ((1 - w) + w * hint)`.
    /// Never raises the score.
    pub fn blend(&self, value: f64, hint: Option<&InferenceHint>) -> f64 {
        let weight = self.config.inference_weight.clamp(0.0, 1.0);
        match hint {
            Some(hint) if weight > 0.0 => {
                value * ((1.0 - weight) + weight * hint.confidence.clamp(0.0, 1.0))
            }
            _ => value,
        }
    }

    /// Declared threshold, raised (never lowered) by a configured override.
    pub fn effective_threshold(&self, strategy: &StrategyDefinition) -> f64 {
        let declared = strategy.validation_criteria().threshold;
        let threshold = match self.config.threshold_overrides.get(&strategy.name) {
            Some(o) => declared.max(*o),
            None => declared,
        };
        threshold.clamp(0.0, 1.0)
    }

    /// Score every candidate and order by confidence. The sort is stable, so the
    /// matcher's order breaks ties.
    pub fn rank<'s>(
        &self,
        candidates: &[Candidate<'s>],
        snapshot: &QuestionSnapshot,
        knowledge: &KnowledgeBase,
        hint: Option<&InferenceHint>,
    ) -> Vec<ScoredCandidate<'s>> {
        let mut scored: Vec<ScoredCandidate<'s>> = candidates
            .iter()
            .map(|c| {
                let score = self.score(c.strategy, snapshot, knowledge);
                let confidence = self.blend(score.value, hint);
                let threshold = self.effective_threshold(c.strategy);
                ScoredCandidate {
                    strategy: c.strategy,
                    signal: c.signal,
                    score,
                    confidence,
                    threshold,
                    eligible: confidence > 0.0 && confidence >= threshold,
                }
            })
            .collect();
        scored.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        scored
    }
}

/// Elements a strategy would work with: those of its declared kinds, narrowed
/// to allow-listed labels when it has any. With neither, every non-button element.
fn matched_elements<'s>(
    strategy: &StrategyDefinition,
    snapshot: &'s QuestionSnapshot,
) -> Vec<&'s SnapshotElement> {
    let kinds = strategy.declared_kinds();
    let restrict_labels = !strategy.criteria.answer_labels.is_empty();
    snapshot
        .elements
        .iter()
        .filter(|e| {
            if kinds.is_empty() {
                restrict_labels || e.kind != ElementKind::Button
            } else {
                kinds.contains(&e.kind)
            }
        })
        .filter(|e| !restrict_labels || strategy.allows_answer(&e.label))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::builtin::fallback_strategy;

    #[test]
    fn threshold_override_only_raises() {
        let mut config = ScoringConfig::default();
        let fallback = fallback_strategy();
        let mut strategy = fallback.clone();
        strategy.name = "x".into();
        strategy.criteria.threshold = 0.9;
        config.threshold_overrides.insert("x".into(), 0.5);
        assert_eq!(ConfidenceScorer::new(&config).effective_threshold(&strategy), 0.9);
        config.threshold_overrides.insert("x".into(), 0.97);
        assert_eq!(ConfidenceScorer::new(&config).effective_threshold(&strategy), 0.97);
    }

    #[test]
    fn blend_never_raises() {
        let config = ScoringConfig {
            inference_weight: 0.5,
            ..Default::default()
        };
        let scorer = ConfidenceScorer::new(&config);
        let hint = InferenceHint {
            value: None,
            confidence: 2.0,
        };
        assert_eq!(scorer.blend(0.8, Some(&hint)), 0.8);
        let weak = InferenceHint {
            value: None,
            confidence: 0.0,
        };
        assert_eq!(scorer.blend(0.8, Some(&weak)), 0.4);
        assert_eq!(scorer.blend(0.0, Some(&hint)), 0.0);
    }
}
