use crate::strategy::StrategyDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanvassConfig {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// Extra strategy definitions. Same-named built-ins are replaced.
    #[serde(default)]
    pub strategies: Vec<StrategyDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,
    /// How long the page is watched for validation errors after an answer.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Case-insensitive regexes matched against page notices.
    #[serde(default = "default_error_patterns")]
    pub error_patterns: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            action_timeout_ms: default_action_timeout_ms(),
            settle_ms: default_settle_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            error_patterns: default_error_patterns(),
        }
    }
}

fn default_action_timeout_ms() -> u64 {
    10000
}

fn default_settle_ms() -> u64 {
    1500
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_error_patterns() -> Vec<String> {
    vec![
        r"please (select|choose|answer|enter|complete)".to_string(),
        r"\brequired\b".to_string(),
        r"at least one".to_string(),
        r"\binvalid\b".to_string(),
        r"must (select|choose|enter|be)".to_string(),
    ]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight of the inference service's confidence, in [0, 1]. 0 disables blending.
    #[serde(default)]
    pub inference_weight: f64,
    /// Per-strategy threshold overrides. Only values above the declared threshold apply.
    #[serde(default)]
    pub threshold_overrides: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    #[serde(default = "default_learning_enabled")]
    pub enabled: bool,
    /// Minimum keyword overlap for a question to be filed under a known family.
    #[serde(default = "default_min_family_overlap")]
    pub min_family_overlap: usize,
    /// Jaro-Winkler similarity for fuzzy label lookup.
    #[serde(default = "default_label_similarity")]
    pub label_similarity: f64,
    #[serde(default)]
    pub record_locators: bool,
    #[serde(default = "default_learn_phrasings")]
    pub learn_phrasings: bool,
    #[serde(default = "default_phrasing_words")]
    pub phrasing_words: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: default_learning_enabled(),
            min_family_overlap: default_min_family_overlap(),
            label_similarity: default_label_similarity(),
            record_locators: false,
            learn_phrasings: default_learn_phrasings(),
            phrasing_words: default_phrasing_words(),
        }
    }
}

fn default_learning_enabled() -> bool {
    true
}

fn default_min_family_overlap() -> usize {
    1
}

fn default_label_similarity() -> f64 {
    0.92
}

fn default_learn_phrasings() -> bool {
    true
}

fn default_phrasing_words() -> usize {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_knowledge_dir")]
    pub knowledge_dir: PathBuf,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            knowledge_dir: default_knowledge_dir(),
            ledger_path: default_ledger_path(),
        }
    }
}

fn canvass_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".canvass")
}

fn default_knowledge_dir() -> PathBuf {
    canvass_home().join("knowledge")
}

fn default_ledger_path() -> PathBuf {
    canvass_home().join("ledger.jsonl")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_sensitive_labels")]
    pub sensitive_labels: Vec<String>,
    #[serde(default = "default_redact_in_logs")]
    pub redact_in_logs: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            sensitive_labels: default_sensitive_labels(),
            redact_in_logs: default_redact_in_logs(),
        }
    }
}

impl SecurityConfig {
    /// Value as it may appear in logs.
    pub fn loggable<'a>(&self, label: &str, value: &'a str) -> &'a str {
        if !self.redact_in_logs {
            return value;
        }
        let label = label.to_lowercase();
        if self
            .sensitive_labels
            .iter()
            .any(|s| label.contains(&s.to_lowercase()))
        {
            "[REDACTED]"
        } else {
            value
        }
    }
}

fn default_sensitive_labels() -> Vec<String> {
    vec![
        "password".to_string(),
        "email".to_string(),
        "phone".to_string(),
        "address".to_string(),
        "date of birth".to_string(),
        "card".to_string(),
    ]
}

fn default_redact_in_logs() -> bool {
    true
}
