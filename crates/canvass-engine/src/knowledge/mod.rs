//! Durable learned facts, keyed by question family.

pub mod file;
pub mod store;

pub use file::FileStore;
pub use store::{AppendOutcome, KnowledgeStore, MemoryStore, StoreError};

use canvass_common::knowledge::KnowledgeSuggestion;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// In-memory view of the knowledge store.
///
/// `version` advances only when a merge changes something, so re-applying a
/// suggestion leaves the whole value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    answers: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    phrasings: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    locators: BTreeMap<String, BTreeMap<String, String>>,
}

impl KnowledgeBase {
    /// Apply one suggestion. Last write wins per key; returns whether anything changed.
    pub fn apply(&mut self, suggestion: &KnowledgeSuggestion) -> bool {
        let changed = match suggestion {
            KnowledgeSuggestion::Answer {
                family,
                label,
                value,
            } => upsert(
                self.answers.entry(family.clone()).or_default(),
                label,
                value,
            ),
            KnowledgeSuggestion::Phrasing { family, phrase } => self
                .phrasings
                .entry(family.clone())
                .or_default()
                .insert(phrase.clone()),
            KnowledgeSuggestion::Locator {
                family,
                label,
                locator,
            } => upsert(
                self.locators.entry(family.clone()).or_default(),
                label,
                locator,
            ),
        };
        if changed {
            self.version += 1;
        }
        changed
    }

    /// Apply many suggestions; returns how many changed the base.
    pub fn merge<'s, I>(&mut self, suggestions: I) -> usize
    where
        I: IntoIterator<Item = &'s KnowledgeSuggestion>,
    {
        suggestions
            .into_iter()
            .filter(|s| self.apply(s))
            .count()
    }

    pub fn answer(&self, family: &str, label: &str) -> Option<&str> {
        self.answers
            .get(family)
            .and_then(|labels| labels.get(label))
            .map(String::as_str)
    }

    pub fn answers(&self, family: &str) -> Option<&BTreeMap<String, String>> {
        self.answers.get(family)
    }

    pub fn phrasings(&self, family: &str) -> impl Iterator<Item = &str> {
        self.phrasings
            .get(family)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn label_for_locator(&self, family: &str, locator: &str) -> Option<&str> {
        self.locators
            .get(family)?
            .iter()
            .find(|(_, l)| l.as_str() == locator)
            .map(|(label, _)| label.as_str())
    }

    pub fn families(&self) -> BTreeSet<&str> {
        self.answers
            .keys()
            .chain(self.phrasings.keys())
            .chain(self.locators.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn answer_count(&self) -> usize {
        self.answers.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty() && self.phrasings.is_empty() && self.locators.is_empty()
    }
}

fn upsert(map: &mut BTreeMap<String, String>, key: &str, value: &str) -> bool {
    match map.get(key) {
        Some(existing) if existing == value => false,
        _ => {
            map.insert(key.to_string(), value.to_string());
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applying_twice_equals_applying_once() {
        let suggestion = KnowledgeSuggestion::answer("demographics", "Age", "34");
        let mut once = KnowledgeBase::default();
        once.apply(&suggestion);
        let mut twice = once.clone();
        assert!(!twice.apply(&suggestion));
        assert_eq!(once, twice);
    }

    #[test]
    fn overwrite_changes_value_and_version() {
        let mut kb = KnowledgeBase::default();
        kb.apply(&KnowledgeSuggestion::answer("demographics", "Age", "34"));
        assert!(kb.apply(&KnowledgeSuggestion::answer("demographics", "age", "35")));
        assert_eq!(kb.answer("demographics", "age"), Some("35"));
        assert_eq!(kb.answer_count(), 1);
        assert_eq!(kb.version, 2);
    }

    #[test]
    fn locator_hint_maps_back_to_label() {
        let mut kb = KnowledgeBase::default();
        kb.apply(&KnowledgeSuggestion::locator("demographics", "Age", "#q1"));
        assert_eq!(kb.label_for_locator("demographics", "#q1"), Some("age"));
        assert_eq!(kb.label_for_locator("demographics", "#q2"), None);
    }
}
