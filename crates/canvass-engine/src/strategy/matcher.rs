use super::{StrategyDefinition, StrategyRegistry};
use crate::knowledge::KnowledgeBase;
use canvass_common::snapshot::QuestionSnapshot;

/// A strategy proposed for a question, with its raw match signal in [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub strategy: &'a StrategyDefinition,
    pub signal: f64,
}

/// Proposes candidate strategies for a snapshot. Pure over snapshot + store.
pub struct CapabilityMatcher<'a> {
    registry: &'a StrategyRegistry,
}

impl<'a> CapabilityMatcher<'a> {
    pub fn new(registry: &'a StrategyRegistry) -> Self {
        Self { registry }
    }

    /// Every partially matching strategy, strongest signal first, ties broken by
    /// declaration priority. The fallback is always the last entry.
    pub fn candidates(
        &self,
        snapshot: &QuestionSnapshot,
        knowledge: &KnowledgeBase,
    ) -> Vec<Candidate<'a>> {
        let text = snapshot.normalized_text();
        let mut candidates: Vec<Candidate<'a>> = self
            .registry
            .specific()
            .iter()
            .filter(|s| s.matches(snapshot, knowledge))
            .map(|strategy| Candidate {
                strategy,
                signal: (strategy.kind_signal(snapshot) + strategy.keyword_signal(&text, knowledge))
                    / 2.0,
            })
            .collect();

        // Registry order is priority order, and the sort is stable.
        candidates.sort_by(|a, b| b.signal.total_cmp(&a.signal));

        candidates.push(Candidate {
            strategy: self.registry.fallback(),
            signal: 0.0,
        });
        candidates
    }
}
