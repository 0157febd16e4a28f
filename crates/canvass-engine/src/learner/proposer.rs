use crate::config::LearningConfig;
use crate::intervention::CaptureStatus;
use canvass_common::knowledge::{KnowledgeSuggestion, UNCATEGORIZED};
use canvass_common::text;

/// Turns a resolved capture into knowledge suggestions.
pub struct Proposer<'a> {
    config: &'a LearningConfig,
}

impl<'a> Proposer<'a> {
    pub fn new(config: &'a LearningConfig) -> Self {
        Self { config }
    }

    /// One answer per captured element, plus an optional locator hint per
    /// element and one phrasing for the question. Unresolved captures yield nothing.
    pub fn propose(
        &self,
        family: &str,
        question: &str,
        status: &CaptureStatus,
    ) -> Vec<KnowledgeSuggestion> {
        if !self.config.enabled {
            return Vec::new();
        }
        let CaptureStatus::Resolved { answers } = status else {
            return Vec::new();
        };

        let mut suggestions = Vec::new();
        for answer in answers {
            if answer.value.trim().is_empty() || text::normalize_label(&answer.label).is_empty() {
                continue;
            }
            suggestions.push(KnowledgeSuggestion::answer(family, &answer.label, &answer.value));
            if self.config.record_locators {
                suggestions.push(KnowledgeSuggestion::locator(
                    family,
                    &answer.label,
                    &answer.locator,
                ));
            }
        }

        if !suggestions.is_empty() && self.config.learn_phrasings && family != UNCATEGORIZED {
            let stem = text::question_stem(question, self.config.phrasing_words);
            if !stem.is_empty() {
                suggestions.push(KnowledgeSuggestion::phrasing(family, &stem));
            }
        }
        suggestions.dedup();
        suggestions
    }
}
