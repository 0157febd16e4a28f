use canvass_engine::config::{CanvassConfig, ConfigError, ConfigLoader};
use canvass_engine::ledger::LedgerSummary;
use canvass_engine::strategy::{Responder, StrategyRegistry};
use canvass_engine::{DeferReason, DispatchPath, LedgerEntry, QuestionOutcome};
use tempfile::TempDir;

#[test]
fn test_empty_config_uses_defaults() {
    let config = ConfigLoader::parse("{}").unwrap();
    assert_eq!(config.dispatch.settle_ms, 1500);
    assert_eq!(config.dispatch.action_timeout_ms, 10000);
    assert_eq!(config.learning.label_similarity, 0.92);
    assert!(config.learning.enabled);
    assert!(config.security.redact_in_logs);
    assert!(config.strategies.is_empty());
}

#[test]
fn test_partial_sections_keep_other_defaults() {
    let yaml = r#"
dispatch:
  settle_ms: 500
scoring:
  threshold_overrides:
    demographics-age: 0.97
"#;
    let config = ConfigLoader::parse(yaml).unwrap();
    assert_eq!(config.dispatch.settle_ms, 500);
    assert_eq!(config.dispatch.poll_interval_ms, 250);
    assert!(!config.dispatch.error_patterns.is_empty());
    assert_eq!(
        config.scoring.threshold_overrides.get("demographics-age"),
        Some(&0.97)
    );
}

#[test]
fn test_invalid_error_pattern_is_rejected() {
    let yaml = r#"
dispatch:
  error_patterns: ["(unclosed"]
"#;
    assert!(matches!(
        ConfigLoader::parse(yaml),
        Err(ConfigError::Pattern { .. })
    ));
}

#[test]
fn test_out_of_range_values_are_rejected() {
    assert!(matches!(
        ConfigLoader::parse("scoring:\n  inference_weight: 1.5\n"),
        Err(ConfigError::Invalid { .. })
    ));
    assert!(matches!(
        ConfigLoader::parse("learning:\n  label_similarity: -0.1\n"),
        Err(ConfigError::Invalid { .. })
    ));
}

#[test]
fn test_strategies_from_config_register_by_priority() {
    let yaml = r#"
strategies:
  - name: household-size
    family: household
    priority: 15
    responder: type_text
    criteria:
      required_kinds: [text-input]
      keywords: [household]
      threshold: 0.9
"#;
    let config: CanvassConfig = ConfigLoader::parse(yaml).unwrap();
    let mut registry = StrategyRegistry::with_builtins();
    for def in config.strategies {
        assert!(registry.register(def));
    }
    let names: Vec<_> = registry.specific().iter().map(|s| s.name.as_str()).collect();
    let pos = names.iter().position(|n| *n == "household-size").unwrap();
    assert_eq!(names[pos - 1], "demographics-income");
    assert_eq!(
        registry.get("household-size").unwrap().responder,
        Responder::TypeText
    );
}

#[tokio::test]
async fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("canvass.yaml");
    tokio::fs::write(&path, "learning:\n  record_locators: true\n")
        .await
        .unwrap();
    let config = ConfigLoader::load_from(&path).await.unwrap();
    assert!(config.learning.record_locators);

    let missing = ConfigLoader::load_from(&dir.path().join("nope.yaml")).await;
    assert!(matches!(missing, Err(ConfigError::Io(_))));
}

fn entry(family: &str, path: DispatchPath, confidence: f64, elapsed_ms: u64) -> LedgerEntry {
    let (outcome, reason) = match path {
        DispatchPath::Automated => (QuestionOutcome::Success, None),
        DispatchPath::Deferred => (QuestionOutcome::Deferred, Some(DeferReason::LowConfidence)),
    };
    LedgerEntry {
        session_id: "s1".into(),
        question_index: 0,
        family: family.into(),
        path,
        confidence,
        outcome,
        elapsed_ms,
        reason,
        strategy: None,
        detail: None,
    }
}

#[test]
fn test_ledger_summary_aggregates() {
    let entries = vec![
        entry("demographics", DispatchPath::Automated, 1.0, 10_000),
        entry("demographics", DispatchPath::Deferred, 0.5, 20_000),
        entry("rating-matrix", DispatchPath::Deferred, 0.0, 30_000),
        entry("demographics", DispatchPath::Automated, 1.0, 0),
    ];
    let summary = LedgerSummary::from_entries(&entries);
    assert_eq!(summary.sessions, 1);
    assert_eq!(summary.questions, 4);
    assert_eq!(summary.automated, 2);
    assert_eq!(summary.deferred, 2);
    assert_eq!(summary.automation_rate, 0.5);
    assert_eq!(summary.reasons.get("low-confidence"), Some(&2));
    assert_eq!(summary.questions_per_minute, 4.0);

    let demographics = &summary.families["demographics"];
    assert_eq!(demographics.attempts, 3);
    assert_eq!(demographics.successes, 2);
    assert_eq!(demographics.deferrals, 1);
    assert!((demographics.mean_confidence - 2.5 / 3.0).abs() < 1e-9);
}

#[test]
fn test_empty_ledger_summary() {
    let summary = LedgerSummary::from_entries(&[]);
    assert_eq!(summary.questions, 0);
    assert_eq!(summary.automation_rate, 0.0);
    assert_eq!(summary.questions_per_minute, 0.0);
}
