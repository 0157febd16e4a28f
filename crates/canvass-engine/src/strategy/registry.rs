use super::StrategyDefinition;
use super::builtin::{FALLBACK_NAME, builtin_strategies, fallback_strategy};

/// Registry of strategies available to a session.
///
/// Specific strategies are kept in declaration priority order. The fallback is
/// stored apart so it can never be missing.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    strategies: Vec<StrategyDefinition>,
    fallback: StrategyDefinition,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyRegistry {
    /// Registry holding only the fallback.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            fallback: fallback_strategy(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for def in builtin_strategies() {
            registry.register(def);
        }
        registry
    }

    /// Register a definition, replacing any same-named one.
    ///
    /// Returns false if the definition was rejected: the fallback is fixed, and
    /// no other definition may use the safe-default responder.
    pub fn register(&mut self, definition: StrategyDefinition) -> bool {
        if definition.name == FALLBACK_NAME || definition.is_fallback() {
            return false;
        }

        self.strategies.retain(|s| s.name != definition.name);
        let pos = self
            .strategies
            .iter()
            .position(|s| s.priority > definition.priority)
            .unwrap_or(self.strategies.len());
        self.strategies.insert(pos, definition);
        true
    }

    /// Unregister a strategy by name. The fallback cannot be removed.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.strategies.len();
        self.strategies.retain(|s| s.name != name);
        self.strategies.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&StrategyDefinition> {
        if name == self.fallback.name {
            return Some(&self.fallback);
        }
        self.strategies.iter().find(|s| s.name == name)
    }

    /// Specific strategies in priority order, excluding the fallback.
    pub fn specific(&self) -> &[StrategyDefinition] {
        &self.strategies
    }

    pub fn fallback(&self) -> &StrategyDefinition {
        &self.fallback
    }

    /// All strategies, fallback last.
    pub fn list(&self) -> Vec<&StrategyDefinition> {
        self.strategies
            .iter()
            .chain(std::iter::once(&self.fallback))
            .collect()
    }

    /// Known families with the union of their strategies' keywords, in priority order.
    pub fn family_keywords(&self) -> Vec<(String, Vec<String>)> {
        let mut families: Vec<(String, Vec<String>)> = Vec::new();
        for def in &self.strategies {
            let idx = match families.iter().position(|(f, _)| *f == def.family) {
                Some(idx) => idx,
                None => {
                    families.push((def.family.clone(), Vec::new()));
                    families.len() - 1
                }
            };
            let keywords = &mut families[idx].1;
            for keyword in &def.criteria.keywords {
                if !keywords.contains(keyword) {
                    keywords.push(keyword.clone());
                }
            }
        }
        families
    }
}
