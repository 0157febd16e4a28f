use crate::knowledge::KnowledgeBase;
use crate::strategy::StrategyRegistry;
use canvass_common::knowledge::UNCATEGORIZED;
use canvass_common::text;

/// Files a question under a family by keyword overlap.
pub struct FamilyRecognizer {
    /// Known families and their keywords, in registry priority order.
    families: Vec<(String, Vec<String>)>,
    min_overlap: usize,
}

impl FamilyRecognizer {
    pub fn new(registry: &StrategyRegistry, min_overlap: usize) -> Self {
        Self {
            families: registry.family_keywords(),
            min_overlap: min_overlap.max(1),
        }
    }

    /// Family with the largest overlap, at least `min_overlap`. A learned
    /// phrasing found in the text counts as one unit of overlap. Ties go to
    /// the family declared first; families known only from the store come last.
    pub fn infer(&self, question: &str, knowledge: &KnowledgeBase) -> String {
        let normalized = text::normalize(question);
        let phrasing_hits = |family: &str| {
            knowledge
                .phrasings(family)
                .filter(|p| !p.is_empty() && normalized.contains(p))
                .count()
        };

        let mut best: Option<(&str, usize)> = None;
        let declared = self.families.iter().map(|(family, keywords)| {
            let hits = keywords
                .iter()
                .filter(|k| text::contains_term(&normalized, k))
                .count();
            (family.as_str(), hits + phrasing_hits(family))
        });
        let learned_only = knowledge
            .families()
            .into_iter()
            .filter(|f| *f != UNCATEGORIZED && !self.families.iter().any(|(d, _)| d == f))
            .map(|f| (f, phrasing_hits(f)));

        for (family, overlap) in declared.chain(learned_only) {
            if overlap >= self.min_overlap && best.is_none_or(|(_, top)| overlap > top) {
                best = Some((family, overlap));
            }
        }
        best.map_or_else(|| UNCATEGORIZED.to_string(), |(f, _)| f.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvass_common::knowledge::KnowledgeSuggestion;

    #[test]
    fn strongest_overlap_wins() {
        let recognizer = FamilyRecognizer::new(&StrategyRegistry::with_builtins(), 1);
        let kb = KnowledgeBase::default();
        assert_eq!(
            recognizer.infer("Which car brands do you know? Select all that apply.", &kb),
            "multi-select-brand"
        );
        assert_eq!(recognizer.infer("What is your age?", &kb), "demographics");
        assert_eq!(recognizer.infer("Favourite colour?", &kb), UNCATEGORIZED);
    }

    #[test]
    fn learned_phrasing_files_new_wording() {
        let recognizer = FamilyRecognizer::new(&StrategyRegistry::with_builtins(), 1);
        let mut kb = KnowledgeBase::default();
        kb.apply(&KnowledgeSuggestion::phrasing("pets", "how many pets"));
        assert_eq!(recognizer.infer("How many pets live with you?", &kb), "pets");
    }
}
