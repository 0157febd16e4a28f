use crate::text;
use serde::{Deserialize, Serialize};

/// Stored value for a checkbox or radio the operator selected.
pub const CHECKED: &str = "checked";
/// Stored value for a checkbox the operator cleared.
pub const UNCHECKED: &str = "unchecked";
/// Family used when no known family overlaps the question text.
pub const UNCATEGORIZED: &str = "uncategorized";

/// A proposed durable fact, keyed by question family.
///
/// Constructors normalise family and label so two suggestions describing the
/// same fact compare equal and land on the same store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KnowledgeSuggestion {
    /// label -> value answer mapping.
    Answer {
        family: String,
        label: String,
        value: String,
    },
    /// A question phrasing confirmed by the operator as belonging to the family.
    Phrasing { family: String, phrase: String },
    /// Locator token last seen carrying the label.
    Locator {
        family: String,
        label: String,
        locator: String,
    },
}

impl KnowledgeSuggestion {
    pub fn answer(family: &str, label: &str, value: &str) -> Self {
        KnowledgeSuggestion::Answer {
            family: normalize_family(family),
            label: text::normalize_label(label),
            value: value.trim().to_string(),
        }
    }

    pub fn phrasing(family: &str, phrase: &str) -> Self {
        KnowledgeSuggestion::Phrasing {
            family: normalize_family(family),
            phrase: text::normalize(phrase),
        }
    }

    pub fn locator(family: &str, label: &str, locator: &str) -> Self {
        KnowledgeSuggestion::Locator {
            family: normalize_family(family),
            label: text::normalize_label(label),
            locator: locator.to_string(),
        }
    }

    pub fn family(&self) -> &str {
        match self {
            KnowledgeSuggestion::Answer { family, .. }
            | KnowledgeSuggestion::Phrasing { family, .. }
            | KnowledgeSuggestion::Locator { family, .. } => family,
        }
    }

    pub fn is_answer(&self) -> bool {
        matches!(self, KnowledgeSuggestion::Answer { .. })
    }
}

pub fn normalize_family(family: &str) -> String {
    let family = text::normalize(family).replace([' ', '_'], "-");
    if family.is_empty() {
        UNCATEGORIZED.to_string()
    } else {
        family
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_normalise_keys() {
        assert_eq!(
            KnowledgeSuggestion::answer("Multi Select Brand", " Tesla: ", "checked"),
            KnowledgeSuggestion::answer("multi-select-brand", "tesla", "checked"),
        );
        assert_eq!(normalize_family("  "), UNCATEGORIZED);
    }

    #[test]
    fn serialises_with_kind_tag() {
        let s = KnowledgeSuggestion::phrasing("rating-matrix", "How would you rate");
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["kind"], "phrasing");
        assert_eq!(json["phrase"], "how would you rate");
    }
}
