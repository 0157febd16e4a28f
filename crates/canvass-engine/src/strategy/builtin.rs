use super::{Criteria, Responder, StrategyDefinition};
use canvass_common::snapshot::ElementKind;

pub const FALLBACK_NAME: &str = "unknown";
pub const FALLBACK_FAMILY: &str = "unknown";

/// Answers the fallback may give without a human.
pub const SAFE_ANSWERS: &[&str] = &[
    "don't know",
    "do not know",
    "not sure",
    "unsure",
    "neutral",
    "neither agree nor disagree",
    "no opinion",
    "prefer not to say",
    "prefer not to answer",
];

fn definition(
    name: &str,
    family: &str,
    priority: u32,
    responder: Responder,
    kinds: &[ElementKind],
    keywords: &[&str],
    threshold: f64,
) -> StrategyDefinition {
    StrategyDefinition {
        name: name.to_string(),
        family: family.to_string(),
        priority,
        responder,
        criteria: Criteria {
            required_kinds: kinds.to_vec(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            answer_labels: Vec::new(),
            threshold,
        },
    }
}

/// Built-in strategies, most specific first.
pub fn builtin_strategies() -> Vec<StrategyDefinition> {
    vec![
        definition(
            "demographics-age",
            "demographics",
            10,
            Responder::TypeText,
            &[ElementKind::TextInput],
            &["age"],
            0.85,
        ),
        definition(
            "demographics-postcode",
            "demographics",
            11,
            Responder::TypeText,
            &[ElementKind::TextInput],
            &["postcode"],
            0.85,
        ),
        definition(
            "demographics-gender",
            "demographics",
            12,
            Responder::ChooseOne,
            &[ElementKind::Radio],
            &["gender"],
            0.90,
        ),
        definition(
            "demographics-income",
            "demographics",
            13,
            Responder::SelectOption,
            &[ElementKind::Select],
            &["income"],
            0.90,
        ),
        definition(
            "trust-rating",
            "trust-rating",
            19,
            Responder::ChooseOne,
            &[ElementKind::Radio],
            &["trust"],
            0.90,
        ),
        definition(
            "rating-matrix",
            "rating-matrix",
            20,
            Responder::ChooseOne,
            &[ElementKind::Radio],
            &["rate"],
            0.95,
        ),
        definition(
            "brand-familiarity",
            "brand-familiarity",
            21,
            Responder::ChooseOne,
            &[ElementKind::Radio],
            &["familiar"],
            0.90,
        ),
        definition(
            "recency-activities",
            "recency-activities",
            29,
            Responder::CheckAll,
            &[ElementKind::Checkbox],
            &["activities"],
            0.90,
        ),
        definition(
            "multi-select-brand",
            "multi-select-brand",
            30,
            Responder::CheckAll,
            &[ElementKind::Checkbox],
            &["brand", "select all"],
            0.90,
        ),
        definition(
            "multi-select",
            "multi-select",
            31,
            Responder::CheckAll,
            &[ElementKind::Checkbox],
            &["select all"],
            0.90,
        ),
        definition(
            "free-text",
            "free-text",
            40,
            Responder::TypeText,
            &[ElementKind::TextInput],
            &["describe"],
            0.95,
        ),
    ]
}

/// The always-present fallback. Acts only on allow-listed neutral answers,
/// and only at full confidence.
pub fn fallback_strategy() -> StrategyDefinition {
    StrategyDefinition {
        name: FALLBACK_NAME.to_string(),
        family: FALLBACK_FAMILY.to_string(),
        priority: u32::MAX,
        responder: Responder::SafeDefault,
        criteria: Criteria {
            required_kinds: Vec::new(),
            keywords: Vec::new(),
            answer_labels: SAFE_ANSWERS.iter().map(|a| a.to_string()).collect(),
            threshold: 1.0,
        },
    }
}
