use super::{Responder, StrategyDefinition};
use crate::knowledge::KnowledgeBase;
use canvass_common::knowledge::{CHECKED, UNCHECKED};
use canvass_common::snapshot::{ElementKind, PageAction, QuestionSnapshot, SnapshotElement};
use canvass_common::text;
use std::collections::BTreeMap;
use thiserror::Error;

/// One step of a strategy's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub locator: String,
    pub label: String,
    pub action: PageAction,
}

impl PlannedAction {
    fn new(element: &SnapshotElement, action: PageAction) -> Self {
        Self {
            locator: element.locator.clone(),
            label: element.label.clone(),
            action,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("no known answer for {0}")]
    NoKnownAnswer(String),
    #[error("ambiguous stored answer for {0}")]
    Ambiguous(String),
    #[error("no interactable {0} element")]
    NoElement(ElementKind),
}

pub type Planner =
    fn(&StrategyDefinition, &QuestionSnapshot, &AnswerLookup<'_>) -> Result<Vec<PlannedAction>, PlanError>;

impl Responder {
    pub fn planner(self) -> Planner {
        match self {
            Responder::TypeText => type_text,
            Responder::SelectOption => select_option,
            Responder::ChooseOne => choose_one,
            Responder::CheckAll => check_all,
            Responder::SafeDefault => safe_default,
        }
    }
}

/// Stored-answer lookup scoped to one family.
///
/// Exact normalised label first, then the closest stored label above the
/// similarity floor, then the label last seen on the element's locator.
pub struct AnswerLookup<'a> {
    knowledge: &'a KnowledgeBase,
    family: &'a str,
    similarity: f64,
}

impl<'a> AnswerLookup<'a> {
    pub fn new(knowledge: &'a KnowledgeBase, family: &'a str, similarity: f64) -> Self {
        Self {
            knowledge,
            family,
            similarity,
        }
    }

    pub fn answer_for(&self, element: &SnapshotElement) -> Option<&'a str> {
        let label = element.normalized_label();
        if !label.is_empty() {
            if let Some(value) = self.knowledge.answer(self.family, &label) {
                return Some(value);
            }
            if let Some(value) = self.closest(&label) {
                return Some(value);
            }
        }
        let hinted = self.knowledge.label_for_locator(self.family, &element.locator)?;
        self.knowledge.answer(self.family, hinted)
    }

    fn closest(&self, label: &str) -> Option<&'a str> {
        let answers = self.knowledge.answers(self.family)?;
        answers
            .iter()
            .filter(|(stored, _)| self.same_words(stored, label))
            .map(|(stored, value)| (strsim::jaro_winkler(stored, label), value))
            .filter(|(score, _)| *score >= self.similarity)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, value)| value.as_str())
    }

    /// Labels agree word for word: only spelling may differ, and words with
    /// digits must match exactly.
    fn same_words(&self, stored: &str, label: &str) -> bool {
        let stored: Vec<&str> = stored.split_whitespace().collect();
        let label: Vec<&str> = label.split_whitespace().collect();
        stored.len() == label.len()
            && stored.iter().zip(&label).all(|(a, b)| {
                a == b
                    || (!a.chars().any(|c| c.is_ascii_digit())
                        && !b.chars().any(|c| c.is_ascii_digit())
                        && strsim::jaro_winkler(a, b) >= self.similarity)
            })
    }
}

fn interactable<'s>(
    snapshot: &'s QuestionSnapshot,
    kind: ElementKind,
) -> impl Iterator<Item = &'s SnapshotElement> {
    snapshot
        .elements_of_kind(kind)
        .filter(|e| e.is_interactable())
}

fn type_text(
    def: &StrategyDefinition,
    snapshot: &QuestionSnapshot,
    lookup: &AnswerLookup<'_>,
) -> Result<Vec<PlannedAction>, PlanError> {
    let mut actions = Vec::new();
    let mut seen = false;
    for input in interactable(snapshot, ElementKind::TextInput) {
        seen = true;
        if let Some(value) = lookup.answer_for(input) {
            actions.push(PlannedAction::new(
                input,
                PageAction::Type {
                    text: value.to_string(),
                    clear: true,
                },
            ));
        }
    }
    if !seen {
        return Err(PlanError::NoElement(ElementKind::TextInput));
    }
    if actions.is_empty() {
        return Err(PlanError::NoKnownAnswer(def.family.clone()));
    }
    Ok(actions)
}

fn select_option(
    def: &StrategyDefinition,
    snapshot: &QuestionSnapshot,
    lookup: &AnswerLookup<'_>,
) -> Result<Vec<PlannedAction>, PlanError> {
    let mut actions = Vec::new();
    let mut seen = false;
    for select in interactable(snapshot, ElementKind::Select) {
        seen = true;
        let Some(value) = lookup.answer_for(select) else {
            continue;
        };
        let wanted = text::normalize(value);
        if let Some(option) = select
            .options
            .iter()
            .find(|o| text::normalize(o) == wanted)
        {
            actions.push(PlannedAction::new(
                select,
                PageAction::Select {
                    option: option.clone(),
                },
            ));
        }
    }
    if !seen {
        return Err(PlanError::NoElement(ElementKind::Select));
    }
    if actions.is_empty() {
        return Err(PlanError::NoKnownAnswer(def.family.clone()));
    }
    Ok(actions)
}

fn choose_one(
    def: &StrategyDefinition,
    snapshot: &QuestionSnapshot,
    lookup: &AnswerLookup<'_>,
) -> Result<Vec<PlannedAction>, PlanError> {
    let mut groups: BTreeMap<&str, Vec<&SnapshotElement>> = BTreeMap::new();
    for radio in interactable(snapshot, ElementKind::Radio) {
        groups
            .entry(radio.group.as_deref().unwrap_or(""))
            .or_default()
            .push(radio);
    }
    if groups.is_empty() {
        return Err(PlanError::NoElement(ElementKind::Radio));
    }

    let mut actions = Vec::new();
    for (group, radios) in groups {
        let known: Vec<_> = radios
            .iter()
            .filter(|r| lookup.answer_for(r) == Some(CHECKED))
            .collect();
        let name = if group.is_empty() {
            def.family.clone()
        } else {
            format!("{} ({})", def.family, group)
        };
        match known.as_slice() {
            [] => return Err(PlanError::NoKnownAnswer(name)),
            [radio] => {
                if !radio.state.checked {
                    actions.push(PlannedAction::new(radio, PageAction::Check { state: true }));
                }
            }
            _ => return Err(PlanError::Ambiguous(name)),
        }
    }
    Ok(actions)
}

fn check_all(
    def: &StrategyDefinition,
    snapshot: &QuestionSnapshot,
    lookup: &AnswerLookup<'_>,
) -> Result<Vec<PlannedAction>, PlanError> {
    let mut actions = Vec::new();
    let mut known = 0;
    let mut seen = false;
    for checkbox in interactable(snapshot, ElementKind::Checkbox) {
        seen = true;
        let wanted = match lookup.answer_for(checkbox) {
            Some(CHECKED) => true,
            Some(UNCHECKED) => false,
            _ => continue,
        };
        known += 1;
        if checkbox.state.checked != wanted {
            actions.push(PlannedAction::new(
                checkbox,
                PageAction::Check { state: wanted },
            ));
        }
    }
    if !seen {
        return Err(PlanError::NoElement(ElementKind::Checkbox));
    }
    if known == 0 {
        return Err(PlanError::NoKnownAnswer(def.family.clone()));
    }
    Ok(actions)
}

fn safe_default(
    def: &StrategyDefinition,
    snapshot: &QuestionSnapshot,
    _lookup: &AnswerLookup<'_>,
) -> Result<Vec<PlannedAction>, PlanError> {
    for answer in &def.criteria.answer_labels {
        let answer = text::normalize_label(answer);
        let found = snapshot
            .elements
            .iter()
            .filter(|e| e.is_interactable())
            .find(|e| e.normalized_label() == answer);
        if let Some(element) = found {
            let action = match element.kind {
                ElementKind::Radio | ElementKind::Checkbox => PageAction::Check { state: true },
                ElementKind::Button => PageAction::Click,
                _ => continue,
            };
            return Ok(vec![PlannedAction::new(element, action)]);
        }
    }
    Err(PlanError::NoKnownAnswer("safe default".to_string()))
}
