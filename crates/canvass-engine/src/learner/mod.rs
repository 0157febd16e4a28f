//! Learning from interventions.

pub mod proposer;
pub mod recognizer;

pub use proposer::Proposer;
pub use recognizer::FamilyRecognizer;

use crate::config::LearningConfig;
use crate::intervention::{CaptureStatus, InterventionRecord};
use crate::knowledge::{AppendOutcome, KnowledgeBase, KnowledgeStore, StoreError};
use crate::strategy::StrategyRegistry;
use canvass_common::knowledge::KnowledgeSuggestion;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub records: usize,
    pub suggestions: usize,
    /// Store entries the replay added or changed.
    pub changed: u64,
}

/// Result of [`KnowledgeLearner::absorb`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Absorbed {
    /// Where the record landed; the id may carry a suffix when another
    /// capture already used it.
    pub stored: AppendOutcome,
    pub knowledge: KnowledgeBase,
}

pub struct KnowledgeLearner {
    config: LearningConfig,
    recognizer: FamilyRecognizer,
}

impl KnowledgeLearner {
    pub fn new(config: LearningConfig, registry: &StrategyRegistry) -> Self {
        let recognizer = FamilyRecognizer::new(registry, config.min_family_overlap);
        Self { config, recognizer }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub fn infer_family(&self, question: &str, knowledge: &KnowledgeBase) -> String {
        self.recognizer.infer(question, knowledge)
    }

    pub fn propose(
        &self,
        family: &str,
        question: &str,
        status: &CaptureStatus,
    ) -> Vec<KnowledgeSuggestion> {
        Proposer::new(&self.config).propose(family, question, status)
    }

    /// Append the record, then merge its suggestions. The record goes first so
    /// a crash in between is repaired by [`KnowledgeLearner::rebuild`].
    pub async fn absorb(
        &self,
        store: &dyn KnowledgeStore,
        record: &InterventionRecord,
    ) -> Result<Absorbed, StoreError> {
        let stored = store.append_intervention(record).await?;
        if !stored.is_appended() {
            debug!(id = %stored.id(), "Intervention already recorded");
        }
        let knowledge = store.merge(&record.suggestions).await?;
        info!(
            id = %stored.id(),
            family = %record.family,
            suggestions = record.suggestions.len(),
            version = knowledge.version,
            "Intervention absorbed"
        );
        Ok(Absorbed { stored, knowledge })
    }

    /// Re-merge every stored record's suggestions.
    pub async fn rebuild(&self, store: &dyn KnowledgeStore) -> Result<RebuildReport, StoreError> {
        let before = store.load().await?.version;
        let records = store.interventions().await?;
        let suggestions: Vec<KnowledgeSuggestion> = records
            .iter()
            .flat_map(|r| r.suggestions.iter().cloned())
            .collect();
        let after = store.merge(&suggestions).await?.version;
        let report = RebuildReport {
            records: records.len(),
            suggestions: suggestions.len(),
            changed: after.saturating_sub(before),
        };
        info!(
            records = report.records,
            suggestions = report.suggestions,
            changed = report.changed,
            "Knowledge rebuilt from interventions"
        );
        Ok(report)
    }
}
