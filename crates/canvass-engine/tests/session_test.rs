use async_trait::async_trait;
use canvass_engine::config::CanvassConfig;
use canvass_engine::driver::{DriverError, OperatorEdit, PageDriver, ScriptedDriver, ScriptedPage};
use canvass_engine::intervention::{ChannelSignal, InterventionRecord};
use canvass_engine::knowledge::{
    AppendOutcome, KnowledgeBase, KnowledgeStore, MemoryStore, StoreError,
};
use canvass_engine::ledger::MemoryLedger;
use canvass_engine::snapshot::{
    ElementHandle, ElementKind, PageAction, QuestionSnapshot, SnapshotElement,
};
use canvass_engine::strategy::builtin::{FALLBACK_NAME, fallback_strategy};
use canvass_engine::{
    DeferReason, DispatchPath, KnowledgeSuggestion, QuestionOutcome, QuestionState, SessionEngine,
    SessionError,
};
use std::path::PathBuf;
use std::sync::Arc;

fn engine(store: &MemoryStore, ledger: &MemoryLedger) -> SessionEngine {
    let mut config = CanvassConfig::default();
    config.dispatch.settle_ms = 0;
    config.dispatch.poll_interval_ms = 1;
    config.dispatch.action_timeout_ms = 1000;
    SessionEngine::new(
        "s1",
        config,
        Arc::new(store.clone()),
        Box::new(ledger.clone()),
    )
}

fn age_page() -> ScriptedPage {
    ScriptedPage::new(QuestionSnapshot::new(
        "What is your age?",
        vec![SnapshotElement::new("#age", ElementKind::TextInput, "Age")],
    ))
}

fn rating_page() -> ScriptedPage {
    ScriptedPage::new(QuestionSnapshot::new(
        "How would you rate our service?",
        vec![SnapshotElement::new("#comments", ElementKind::TextInput, "Comments")],
    ))
}

fn brands_page() -> ScriptedPage {
    ScriptedPage::new(QuestionSnapshot::new(
        "Which car brands have you considered? Select all that apply.",
        vec![
            SnapshotElement::new("#tesla", ElementKind::Checkbox, "Tesla"),
            SnapshotElement::new("#ford", ElementKind::Checkbox, "Ford"),
            SnapshotElement::new("#bmw", ElementKind::Checkbox, "BMW"),
        ],
    ))
}

fn seeded(suggestions: &[KnowledgeSuggestion]) -> MemoryStore {
    let mut kb = KnowledgeBase::default();
    kb.merge(suggestions);
    MemoryStore::with_knowledge(kb)
}

#[tokio::test]
async fn test_known_age_is_automated() {
    let store = seeded(&[KnowledgeSuggestion::answer("demographics", "Age", "34")]);
    let ledger = MemoryLedger::new();
    let mut engine = engine(&store, &ledger);
    let mut driver = ScriptedDriver::from_pages(vec![age_page()]);
    let mut operator = driver.operator();

    let report = engine
        .process_question(&mut driver, &mut operator)
        .await
        .unwrap();

    assert_eq!(report.path, DispatchPath::Automated);
    assert_eq!(report.outcome, QuestionOutcome::Success);
    assert_eq!(report.strategy.as_deref(), Some("demographics-age"));
    assert_eq!(report.confidence, 1.0);
    assert_eq!(
        report.states,
        vec![
            QuestionState::Unclassified,
            QuestionState::Matched,
            QuestionState::Scored,
            QuestionState::Dispatched,
            QuestionState::Validated,
            QuestionState::Recorded,
        ]
    );
    assert!(driver.prompts().is_empty());
    let live = driver.live_snapshot().unwrap();
    assert_eq!(live.element("#age").unwrap().value.as_deref(), Some("34"));

    let entries = ledger.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].family, "demographics");
    assert_eq!(entries[0].reason, None);
}

#[tokio::test]
async fn test_missing_radios_defer_low_confidence() {
    let store = MemoryStore::new();
    let ledger = MemoryLedger::new();
    let mut engine = engine(&store, &ledger);
    let mut driver = ScriptedDriver::from_pages(vec![rating_page()]);
    let mut operator = driver.operator();

    let report = engine
        .process_question(&mut driver, &mut operator)
        .await
        .unwrap();

    assert_eq!(report.path, DispatchPath::Deferred);
    assert_eq!(report.outcome, QuestionOutcome::Deferred);
    assert_eq!(report.reason, Some(DeferReason::LowConfidence));
    assert_eq!(report.confidence, 0.0);
    assert_eq!(
        report.states,
        vec![
            QuestionState::Unclassified,
            QuestionState::Matched,
            QuestionState::Scored,
            QuestionState::Deferred,
            QuestionState::Recorded,
        ]
    );
    assert!(driver.actions().is_empty());
    assert_eq!(driver.prompts().len(), 1);
    assert_eq!(report.intervention.as_deref(), Some("s1-0"));
    assert!(!report.captured);

    let records = store.interventions().await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].is_resolved());
    assert_eq!(ledger.entries()[0].reason, Some(DeferReason::LowConfidence));
}

#[tokio::test]
async fn test_rejected_answer_defers_with_before_state() {
    let store = seeded(&[KnowledgeSuggestion::answer(
        "multi-select-brand",
        "Tesla",
        "checked",
    )]);
    let ledger = MemoryLedger::new();
    let mut engine = engine(&store, &ledger);

    let mut page = brands_page();
    page.notices_after_action = vec!["Please select at least one option".into()];
    page.operator_edits = vec![OperatorEdit::check("#ford")];
    let mut driver = ScriptedDriver::from_pages(vec![page]);
    let mut operator = driver.operator();

    let report = engine
        .process_question(&mut driver, &mut operator)
        .await
        .unwrap();

    assert_eq!(report.reason, Some(DeferReason::ValidationRejected));
    assert_eq!(report.strategy.as_deref(), Some("multi-select-brand"));
    assert_eq!(
        &report.states[3..],
        &[
            QuestionState::Dispatched,
            QuestionState::Rejected,
            QuestionState::Deferred,
            QuestionState::Recorded,
        ]
    );
    assert_eq!(
        driver.actions()[0].action,
        PageAction::Check { state: true }
    );

    let records: Vec<InterventionRecord> = store.interventions().await.unwrap();
    let record = &records[0];
    assert_eq!(record.reason, DeferReason::ValidationRejected);
    // Before-state is the page after the automated attempt, before the operator's fix.
    assert!(record.snapshot.element("#tesla").unwrap().state.checked);
    assert!(!record.snapshot.element("#ford").unwrap().state.checked);
    assert!(!record.snapshot.notices.is_empty());
    assert_eq!(record.changes.len(), 1);
    assert_eq!(record.changes[0].locator, "#ford");

    let knowledge = store.load().await.unwrap();
    assert_eq!(knowledge.answer("multi-select-brand", "ford"), Some("checked"));
}

#[tokio::test]
async fn test_operator_answers_are_reused_next_session() {
    let store = MemoryStore::new();
    let ledger = MemoryLedger::new();

    let mut page = brands_page();
    page.operator_edits = vec![OperatorEdit::check("#tesla"), OperatorEdit::check("#ford")];
    let mut driver = ScriptedDriver::from_pages(vec![page]);
    let mut operator = driver.operator();
    let report = engine(&store, &ledger)
        .process_question(&mut driver, &mut operator)
        .await
        .unwrap();

    assert_eq!(report.reason, Some(DeferReason::ExecutionFault));
    assert!(report.detail.as_deref().unwrap().starts_with("declined"));
    assert!(report.captured);
    let knowledge = store.load().await.unwrap();
    assert_eq!(knowledge.answer("multi-select-brand", "tesla"), Some("checked"));
    assert_eq!(knowledge.answer("multi-select-brand", "ford"), Some("checked"));

    // A later session answers the same question on its own.
    let mut driver = ScriptedDriver::from_pages(vec![brands_page()]);
    let mut operator = driver.operator();
    let report = engine(&store, &ledger)
        .process_question(&mut driver, &mut operator)
        .await
        .unwrap();
    assert_eq!(report.path, DispatchPath::Automated);
    let live = driver.live_snapshot().unwrap();
    assert!(live.element("#tesla").unwrap().state.checked);
    assert!(live.element("#ford").unwrap().state.checked);
    assert!(!live.element("#bmw").unwrap().state.checked);
}

#[tokio::test]
async fn test_run_records_one_entry_per_question_in_order() {
    let store = seeded(&[KnowledgeSuggestion::answer("demographics", "Age", "34")]);
    let ledger = MemoryLedger::new();
    let mut engine = engine(&store, &ledger);
    let mut driver = ScriptedDriver::from_pages(vec![age_page(), rating_page(), brands_page()]);
    let mut operator = driver.operator();

    let report = engine
        .run(&mut driver, &mut operator, None)
        .await
        .unwrap();

    assert_eq!(report.questions.len(), 3);
    assert_eq!(report.automated(), 1);
    assert_eq!(report.deferred(), 2);
    let indices: Vec<_> = ledger
        .entries()
        .iter()
        .map(|e| e.question_index)
        .collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(driver.current_page(), 3);
}

#[tokio::test]
async fn test_configured_fallback_cannot_answer_consent() {
    let store = MemoryStore::new();
    let ledger = MemoryLedger::new();
    let mut config = CanvassConfig::default();
    config.dispatch.settle_ms = 0;
    let mut loosened = fallback_strategy();
    loosened.criteria.threshold = 0.5;
    loosened.criteria.answer_labels = vec!["Yes".into()];
    config.strategies.push(loosened);
    let mut engine = SessionEngine::new(
        "s1",
        config,
        Arc::new(store.clone()),
        Box::new(ledger.clone()),
    );
    assert_eq!(engine.registry().fallback(), &fallback_strategy());

    let page = ScriptedPage::new(QuestionSnapshot::new(
        "Do you consent to share your medical records?",
        vec![
            SnapshotElement::new("#yes", ElementKind::Radio, "Yes"),
            SnapshotElement::new("#no", ElementKind::Radio, "No"),
        ],
    ));
    let mut driver = ScriptedDriver::from_pages(vec![page]);
    let mut operator = driver.operator();
    let report = engine
        .process_question(&mut driver, &mut operator)
        .await
        .unwrap();

    assert_eq!(report.path, DispatchPath::Deferred);
    assert!(driver.actions().is_empty());
    let live = driver.live_snapshot().unwrap();
    assert!(!live.element("#yes").unwrap().state.checked);
    assert_eq!(engine.registry().fallback().name, FALLBACK_NAME);
}

/// Driver for a single static question; it keeps the default `advance`.
struct SinglePageDriver {
    page: QuestionSnapshot,
    acted: Vec<String>,
}

#[async_trait]
impl PageDriver for SinglePageDriver {
    async fn snapshot(&mut self) -> Result<QuestionSnapshot, DriverError> {
        Ok(self.page.clone())
    }

    async fn locate(&mut self, token: &str) -> Result<ElementHandle, DriverError> {
        Ok(ElementHandle::new(token))
    }

    async fn act(&mut self, handle: &ElementHandle, _action: &PageAction) -> Result<(), DriverError> {
        self.acted.push(handle.token.clone());
        Ok(())
    }

    async fn wait_settled(&mut self, _timeout_ms: u64) -> bool {
        true
    }
}

#[tokio::test]
async fn test_driver_without_navigation_runs_one_question() {
    let store = seeded(&[KnowledgeSuggestion::answer("demographics", "Age", "34")]);
    let ledger = MemoryLedger::new();
    let mut engine = engine(&store, &ledger);
    let mut driver = SinglePageDriver {
        page: age_page().snapshot,
        acted: Vec::new(),
    };
    let (mut signal, _handle) = ChannelSignal::new();

    let report = engine.run(&mut driver, &mut signal, None).await.unwrap();

    assert_eq!(report.questions.len(), 1);
    assert_eq!(report.automated(), 1);
    assert_eq!(driver.acted, vec!["#age".to_string()]);
    assert_eq!(ledger.entries().len(), 1);
}

#[tokio::test]
async fn test_run_stops_at_question_limit() {
    let store = MemoryStore::new();
    let ledger = MemoryLedger::new();
    let mut engine = engine(&store, &ledger);
    let mut driver = ScriptedDriver::from_pages(vec![rating_page(), rating_page(), rating_page()]);
    let mut operator = driver.operator();

    let report = engine
        .run(&mut driver, &mut operator, Some(2))
        .await
        .unwrap();
    assert_eq!(report.questions.len(), 2);
    assert_eq!(ledger.entries().len(), 2);
}

#[tokio::test]
async fn test_operator_abort_records_failure_and_ends_session() {
    let store = MemoryStore::new();
    let ledger = MemoryLedger::new();
    let mut engine = engine(&store, &ledger);
    let mut driver = ScriptedDriver::from_pages(vec![rating_page()]);
    let (mut signal, handle) = ChannelSignal::new();
    handle.abort();

    let result = engine.process_question(&mut driver, &mut signal).await;
    assert!(matches!(
        result,
        Err(SessionError::Aborted { question_index: 0 })
    ));
    let entries = ledger.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, QuestionOutcome::Failure);
    assert!(store.interventions().await.unwrap().is_empty());
}

struct BrokenStore;

#[async_trait]
impl KnowledgeStore for BrokenStore {
    async fn load(&self) -> Result<KnowledgeBase, StoreError> {
        Err(StoreError::Corrupt {
            path: PathBuf::from("knowledge.json"),
            message: "truncated".into(),
        })
    }

    async fn merge(
        &self,
        _suggestions: &[KnowledgeSuggestion],
    ) -> Result<KnowledgeBase, StoreError> {
        self.load().await
    }

    async fn append_intervention(
        &self,
        record: &InterventionRecord,
    ) -> Result<AppendOutcome, StoreError> {
        Ok(AppendOutcome::Appended {
            id: record.id.clone(),
        })
    }

    async fn interventions(&self) -> Result<Vec<InterventionRecord>, StoreError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_store_corruption_is_fatal() {
    let ledger = MemoryLedger::new();
    let mut engine = SessionEngine::new(
        "s1",
        CanvassConfig::default(),
        Arc::new(BrokenStore),
        Box::new(ledger.clone()),
    );
    let mut driver = ScriptedDriver::from_pages(vec![age_page()]);
    let mut operator = driver.operator();

    let result = engine.process_question(&mut driver, &mut operator).await;
    assert!(matches!(result, Err(SessionError::Store(_))));
    assert_eq!(ledger.entries()[0].outcome, QuestionOutcome::Failure);
}
