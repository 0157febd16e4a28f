use async_trait::async_trait;
use canvass_engine::config::{DispatchConfig, SecurityConfig};
use canvass_engine::dispatch::{DispatchOutcome, Dispatcher};
use canvass_engine::driver::{DriverError, PageDriver};
use canvass_engine::knowledge::KnowledgeBase;
use canvass_engine::snapshot::{
    ElementHandle, ElementKind, PageAction, QuestionSnapshot, SnapshotElement,
};
use canvass_engine::strategy::{AnswerLookup, StrategyRegistry};
use canvass_engine::KnowledgeSuggestion;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Failure {
    None,
    Error,
    Panic,
    Hang,
    SnapshotPanic,
    SettleHang,
}

struct MockDriver {
    page: QuestionSnapshot,
    failure: Failure,
    notices_after_act: Vec<String>,
    acted: Vec<(String, PageAction)>,
}

impl MockDriver {
    fn new(page: QuestionSnapshot, failure: Failure) -> Self {
        Self {
            page,
            failure,
            notices_after_act: Vec::new(),
            acted: Vec::new(),
        }
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn snapshot(&mut self) -> Result<QuestionSnapshot, DriverError> {
        if self.failure == Failure::SnapshotPanic && !self.acted.is_empty() {
            panic!("snapshot exploded");
        }
        Ok(self.page.clone())
    }

    async fn locate(&mut self, token: &str) -> Result<ElementHandle, DriverError> {
        Ok(ElementHandle::new(token))
    }

    async fn act(&mut self, handle: &ElementHandle, action: &PageAction) -> Result<(), DriverError> {
        match self.failure {
            Failure::None => {}
            Failure::Error => {
                return Err(DriverError::ElementStale {
                    locator: handle.token.clone(),
                });
            }
            Failure::Panic => panic!("driver exploded"),
            Failure::Hang => tokio::time::sleep(Duration::from_secs(3600)).await,
            Failure::SnapshotPanic | Failure::SettleHang => {}
        }
        self.acted.push((handle.token.clone(), action.clone()));
        self.page.notices.extend(self.notices_after_act.drain(..));
        Ok(())
    }

    async fn wait_settled(&mut self, _timeout_ms: u64) -> bool {
        if self.failure == Failure::SettleHang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        true
    }
}

fn quick_config() -> DispatchConfig {
    DispatchConfig {
        action_timeout_ms: 50,
        settle_ms: 0,
        poll_interval_ms: 1,
        ..Default::default()
    }
}

fn age_page() -> QuestionSnapshot {
    QuestionSnapshot::new(
        "What is your age?",
        vec![SnapshotElement::new("#age", ElementKind::TextInput, "Age")],
    )
}

fn known_age() -> KnowledgeBase {
    let mut kb = KnowledgeBase::default();
    kb.apply(&KnowledgeSuggestion::answer("demographics", "Age", "34"));
    kb
}

async fn dispatch_age(driver: &mut MockDriver, kb: &KnowledgeBase) -> DispatchOutcome {
    let registry = StrategyRegistry::with_builtins();
    let strategy = registry.get("demographics-age").unwrap();
    let dispatcher = Dispatcher::new(quick_config(), SecurityConfig::default());
    let lookup = AnswerLookup::new(kb, &strategy.family, 0.92);
    let page = driver.page.clone();
    dispatcher.execute(driver, strategy, &page, &lookup).await
}

#[tokio::test]
async fn test_successful_execution_validates() {
    let mut driver = MockDriver::new(age_page(), Failure::None);
    let outcome = dispatch_age(&mut driver, &known_age()).await;
    assert_eq!(outcome, DispatchOutcome::Validated);
    assert_eq!(
        driver.acted,
        vec![(
            "#age".to_string(),
            PageAction::Type {
                text: "34".into(),
                clear: true
            }
        )]
    );
}

#[tokio::test]
async fn test_driver_error_becomes_fault() {
    let mut driver = MockDriver::new(age_page(), Failure::Error);
    let outcome = dispatch_age(&mut driver, &known_age()).await;
    match outcome {
        DispatchOutcome::Faulted { detail } => assert!(detail.contains("ELEMENT_STALE")),
        other => panic!("expected fault, got {:?}", other),
    }
}

#[tokio::test]
async fn test_driver_panic_is_contained() {
    let mut driver = MockDriver::new(age_page(), Failure::Panic);
    let outcome = dispatch_age(&mut driver, &known_age()).await;
    match outcome {
        DispatchOutcome::Faulted { detail } => assert!(detail.contains("driver exploded")),
        other => panic!("expected fault, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_hung_action_times_out() {
    let mut driver = MockDriver::new(age_page(), Failure::Hang);
    let outcome = dispatch_age(&mut driver, &known_age()).await;
    match outcome {
        DispatchOutcome::Faulted { detail } => assert!(detail.contains("timed out")),
        other => panic!("expected fault, got {:?}", other),
    }
    assert!(driver.acted.is_empty());
}

#[tokio::test]
async fn test_unknown_answer_declines_without_acting() {
    let mut driver = MockDriver::new(age_page(), Failure::None);
    let outcome = dispatch_age(&mut driver, &KnowledgeBase::default()).await;
    match outcome {
        DispatchOutcome::Faulted { detail } => assert!(detail.starts_with("declined")),
        other => panic!("expected decline, got {:?}", other),
    }
    assert!(driver.acted.is_empty());
}

#[tokio::test]
async fn test_error_notice_after_action_rejects() {
    let mut driver = MockDriver::new(age_page(), Failure::None);
    driver.notices_after_act = vec!["This field is required".into()];
    let outcome = dispatch_age(&mut driver, &known_age()).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Rejected {
            indicators: vec!["This field is required".into()]
        }
    );
}

#[tokio::test]
async fn test_invalid_marker_rejects() {
    let mut page = age_page();
    page.elements[0].state.invalid = true;
    let mut driver = MockDriver::new(page, Failure::None);
    let outcome = dispatch_age(&mut driver, &known_age()).await;
    assert!(matches!(outcome, DispatchOutcome::Rejected { .. }));
}

#[tokio::test]
async fn test_panic_during_validation_is_contained() {
    let mut driver = MockDriver::new(age_page(), Failure::SnapshotPanic);
    let outcome = dispatch_age(&mut driver, &known_age()).await;
    match outcome {
        DispatchOutcome::Faulted { detail } => {
            assert!(detail.starts_with("validation snapshot failed"));
            assert!(detail.contains("snapshot exploded"));
        }
        other => panic!("expected fault, got {:?}", other),
    }
    assert_eq!(driver.acted.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_settle_wait_times_out() {
    let mut driver = MockDriver::new(age_page(), Failure::SettleHang);
    let outcome = dispatch_age(&mut driver, &known_age()).await;
    match outcome {
        DispatchOutcome::Faulted { detail } => {
            assert!(detail.contains("timed out"));
            assert!(detail.contains("settle"));
        }
        other => panic!("expected fault, got {:?}", other),
    }
}
