//! Response strategies.
//!
//! A strategy is plain data: the question family it answers, the [`Criteria`]
//! required for confident automation, and a [`Responder`] tag selecting the
//! planning function that turns a snapshot plus stored knowledge into page
//! actions. Strategies hold no per-question state.

pub mod builtin;
pub mod matcher;
pub mod registry;
pub mod responder;

pub use matcher::{Candidate, CapabilityMatcher};
pub use registry::StrategyRegistry;
pub use responder::{AnswerLookup, PlanError, PlannedAction};

use crate::knowledge::KnowledgeBase;
use canvass_common::snapshot::{ElementKind, QuestionSnapshot};
use canvass_common::text;
use serde::{Deserialize, Serialize};

/// What a strategy needs to see before it may act without a human.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    #[serde(default)]
    pub required_kinds: Vec<ElementKind>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Restricts matched elements to these option labels. Used by the fallback.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub answer_labels: Vec<String>,
    pub threshold: f64,
}

/// Planning behaviour, dispatched through [`Responder::planner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Responder {
    /// Type known values into text inputs.
    TypeText,
    /// Pick known options in select elements.
    SelectOption,
    /// Check the single known radio in each group.
    ChooseOne,
    /// Check or clear every checkbox with a known state.
    CheckAll,
    /// Pick an allow-listed neutral answer.
    SafeDefault,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDefinition {
    pub name: String,
    pub family: String,
    /// Lower runs first among equal match signals.
    #[serde(default = "default_priority")]
    pub priority: u32,
    pub responder: Responder,
    pub criteria: Criteria,
}

fn default_priority() -> u32 {
    100
}

impl StrategyDefinition {
    pub fn validation_criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn is_fallback(&self) -> bool {
        self.responder == Responder::SafeDefault
    }

    /// Fraction of declared element kinds present on the page, visible or not.
    pub fn kind_signal(&self, snapshot: &QuestionSnapshot) -> f64 {
        let kinds = self.declared_kinds();
        if kinds.is_empty() {
            return 0.0;
        }
        let present = kinds
            .iter()
            .filter(|k| snapshot.elements_of_kind(**k).next().is_some())
            .count();
        present as f64 / kinds.len() as f64
    }

    /// Fraction of declared keywords found in the question text. A learned
    /// phrasing of this family counts as full coverage.
    pub fn keyword_signal(&self, normalized_text: &str, knowledge: &KnowledgeBase) -> f64 {
        if knowledge
            .phrasings(&self.family)
            .any(|phrase| !phrase.is_empty() && normalized_text.contains(phrase))
        {
            return 1.0;
        }
        if self.criteria.keywords.is_empty() {
            return 0.0;
        }
        let found = self
            .criteria
            .keywords
            .iter()
            .filter(|k| text::contains_term(normalized_text, k))
            .count();
        found as f64 / self.criteria.keywords.len() as f64
    }

    /// True when any declared element kind or keyword is present.
    pub fn matches(&self, snapshot: &QuestionSnapshot, knowledge: &KnowledgeBase) -> bool {
        if self.is_fallback() {
            return true;
        }
        self.kind_signal(snapshot) > 0.0
            || self.keyword_signal(&snapshot.normalized_text(), knowledge) > 0.0
    }

    /// Build the page actions answering `snapshot`.
    pub fn plan(
        &self,
        snapshot: &QuestionSnapshot,
        lookup: &AnswerLookup<'_>,
    ) -> Result<Vec<PlannedAction>, PlanError> {
        (self.responder.planner())(self, snapshot, lookup)
    }

    pub(crate) fn declared_kinds(&self) -> Vec<ElementKind> {
        let mut kinds = self.criteria.required_kinds.clone();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    pub(crate) fn allows_answer(&self, label: &str) -> bool {
        let label = text::normalize_label(label);
        self.criteria
            .answer_labels
            .iter()
            .any(|a| text::normalize_label(a) == label)
    }
}
