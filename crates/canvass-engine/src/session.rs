//! One survey session: classify, score, dispatch or defer, learn, record.
//!
//! Exactly one question is in flight at a time. Automation uncertainty never
//! ends a session; only store and ledger failures, a failed initial snapshot,
//! and an operator abort do.

use crate::config::CanvassConfig;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::driver::{DriverError, PageDriver};
use crate::inference::InferenceService;
use crate::intervention::{self, InterventionPrompt, InterventionRecord, OperatorSignal};
use crate::knowledge::{KnowledgeStore, StoreError};
use crate::learner::KnowledgeLearner;
use crate::ledger::{LedgerError, LedgerSink};
use crate::scoring::ConfidenceScorer;
use crate::strategy::{AnswerLookup, CapabilityMatcher, StrategyRegistry};
use canvass_common::knowledge::UNCATEGORIZED;
use canvass_common::ledger::{DeferReason, DispatchPath, LedgerEntry, QuestionOutcome};
use canvass_common::snapshot::QuestionSnapshot;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionState {
    Unclassified,
    Matched,
    Scored,
    Dispatched,
    Validated,
    Rejected,
    Deferred,
    Recorded,
}

impl QuestionState {
    pub fn can_transition(self, next: QuestionState) -> bool {
        use QuestionState::*;
        matches!(
            (self, next),
            (Unclassified, Matched)
                | (Matched, Scored)
                | (Scored, Dispatched)
                | (Scored, Deferred)
                | (Dispatched, Validated)
                | (Dispatched, Rejected)
                | (Dispatched, Deferred)
                | (Rejected, Deferred)
                | (Validated, Recorded)
                | (Deferred, Recorded)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == QuestionState::Recorded
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Knowledge store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Ledger failure: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Page driver failure: {0}")]
    Driver(#[from] DriverError),

    #[error("Operator aborted the session at question {question_index}")]
    Aborted { question_index: usize },

    #[error("Invalid question transition {from:?} -> {to:?}")]
    Transition {
        from: QuestionState,
        to: QuestionState,
    },
}

/// What happened to one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionReport {
    pub index: usize,
    pub family: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    pub path: DispatchPath,
    pub outcome: QuestionOutcome,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DeferReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Every state the question passed through, in order.
    pub states: Vec<QuestionState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intervention: Option<String>,
    pub captured: bool,
    pub suggestions: usize,
}

impl QuestionReport {
    fn new(index: usize) -> Self {
        Self {
            index,
            family: UNCATEGORIZED.to_string(),
            strategy: None,
            path: DispatchPath::Deferred,
            outcome: QuestionOutcome::Failure,
            confidence: 0.0,
            reason: None,
            detail: None,
            states: vec![QuestionState::Unclassified],
            intervention: None,
            captured: false,
            suggestions: 0,
        }
    }

    pub fn state(&self) -> QuestionState {
        self.states
            .last()
            .copied()
            .unwrap_or(QuestionState::Unclassified)
    }

    fn enter(&mut self, next: QuestionState) -> Result<(), SessionError> {
        let from = self.state();
        if !from.can_transition(next) {
            return Err(SessionError::Transition { from, to: next });
        }
        self.states.push(next);
        Ok(())
    }

    fn ledger_entry(&self, session_id: &str, elapsed_ms: u64) -> LedgerEntry {
        LedgerEntry {
            session_id: session_id.to_string(),
            question_index: self.index,
            family: self.family.clone(),
            path: self.path,
            confidence: self.confidence,
            outcome: self.outcome,
            elapsed_ms,
            reason: self.reason,
            strategy: self.strategy.clone(),
            detail: self.detail.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session_id: String,
    pub questions: Vec<QuestionReport>,
}

impl SessionReport {
    pub fn automated(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| q.path == DispatchPath::Automated)
            .count()
    }

    pub fn deferred(&self) -> usize {
        self.questions.len() - self.automated()
    }
}

pub struct SessionEngine {
    session_id: String,
    config: CanvassConfig,
    registry: StrategyRegistry,
    dispatcher: Dispatcher,
    learner: KnowledgeLearner,
    store: Arc<dyn KnowledgeStore>,
    ledger: Box<dyn LedgerSink>,
    inference: Option<Arc<dyn InferenceService>>,
    next_index: usize,
}

impl SessionEngine {
    pub fn new(
        session_id: impl Into<String>,
        config: CanvassConfig,
        store: Arc<dyn KnowledgeStore>,
        ledger: Box<dyn LedgerSink>,
    ) -> Self {
        let mut registry = StrategyRegistry::with_builtins();
        for definition in &config.strategies {
            if !registry.register(definition.clone()) {
                warn!(strategy = %definition.name, "Rejected strategy definition");
            }
        }
        let dispatcher = Dispatcher::new(config.dispatch.clone(), config.security.clone());
        let learner = KnowledgeLearner::new(config.learning.clone(), &registry);
        Self {
            session_id: session_id.into(),
            config,
            registry,
            dispatcher,
            learner,
            store,
            ledger,
            inference: None,
            next_index: 0,
        }
    }

    pub fn with_inference(mut self, service: Arc<dyn InferenceService>) -> Self {
        self.inference = Some(service);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn learner(&self) -> &KnowledgeLearner {
        &self.learner
    }

    /// Process the question currently on the page and write its ledger entry.
    pub async fn process_question<D, O>(
        &mut self,
        driver: &mut D,
        operator: &mut O,
    ) -> Result<QuestionReport, SessionError>
    where
        D: PageDriver + ?Sized,
        O: OperatorSignal + ?Sized,
    {
        let started = Instant::now();
        let snapshot = driver.snapshot().await?;
        let index = self.next_index;
        self.next_index += 1;

        let mut report = QuestionReport::new(index);
        let result = self
            .handle(&mut report, &snapshot, driver, operator)
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                self.ledger
                    .append(&report.ledger_entry(&self.session_id, elapsed_ms))
                    .await?;
                Ok(report)
            }
            Err(error) => {
                report.outcome = QuestionOutcome::Failure;
                if let Err(e) = self
                    .ledger
                    .append(&report.ledger_entry(&self.session_id, elapsed_ms))
                    .await
                {
                    warn!(question = index, error = %e, "Could not record failed question");
                }
                Err(error)
            }
        }
    }

    async fn handle<D, O>(
        &self,
        report: &mut QuestionReport,
        snapshot: &QuestionSnapshot,
        driver: &mut D,
        operator: &mut O,
    ) -> Result<(), SessionError>
    where
        D: PageDriver + ?Sized,
        O: OperatorSignal + ?Sized,
    {
        let index = report.index;
        let knowledge = self.store.load().await?;

        let candidates = CapabilityMatcher::new(&self.registry).candidates(snapshot, &knowledge);
        report.enter(QuestionState::Matched)?;

        let hint = match &self.inference {
            Some(service) if self.config.scoring.inference_weight > 0.0 => {
                service.suggest(snapshot).await
            }
            _ => None,
        };
        let ranked = ConfidenceScorer::new(&self.config.scoring).rank(
            &candidates,
            snapshot,
            &knowledge,
            hint.as_ref(),
        );
        report.enter(QuestionState::Scored)?;
        report.confidence = ranked.first().map_or(0.0, |c| c.confidence);
        report.family = self.learner.infer_family(&snapshot.text, &knowledge);

        let (reason, detail) = match ranked.iter().find(|c| c.eligible) {
            Some(chosen) => {
                report.strategy = Some(chosen.strategy.name.clone());
                report.confidence = chosen.confidence;
                report.enter(QuestionState::Dispatched)?;
                info!(
                    question = index,
                    strategy = %chosen.strategy.name,
                    confidence = chosen.confidence,
                    threshold = chosen.threshold,
                    "Dispatching"
                );

                let lookup = AnswerLookup::new(
                    &knowledge,
                    &chosen.strategy.family,
                    self.config.learning.label_similarity,
                );
                match self
                    .dispatcher
                    .execute(driver, chosen.strategy, snapshot, &lookup)
                    .await
                {
                    DispatchOutcome::Validated => {
                        report.enter(QuestionState::Validated)?;
                        report.family = chosen.strategy.family.clone();
                        report.path = DispatchPath::Automated;
                        report.outcome = QuestionOutcome::Success;
                        report.enter(QuestionState::Recorded)?;
                        info!(question = index, strategy = %chosen.strategy.name, "Answer accepted");
                        return Ok(());
                    }
                    DispatchOutcome::Rejected { indicators } => {
                        report.enter(QuestionState::Rejected)?;
                        (DeferReason::ValidationRejected, Some(indicators.join("; ")))
                    }
                    DispatchOutcome::Faulted { detail } => (DeferReason::ExecutionFault, Some(detail)),
                }
            }
            None => {
                let detail = ranked.first().map(|c| {
                    format!(
                        "{} scored {:.2}, needs {:.2}",
                        c.strategy.name, c.confidence, c.threshold
                    )
                });
                (DeferReason::LowConfidence, detail)
            }
        };

        report.enter(QuestionState::Deferred)?;
        report.path = DispatchPath::Deferred;
        report.reason = Some(reason);
        report.detail = detail;
        info!(
            question = index,
            reason = %reason,
            family = %report.family,
            confidence = report.confidence,
            "Deferring to operator"
        );

        let prompt = InterventionPrompt {
            session_id: self.session_id.clone(),
            question_index: index,
            question: snapshot.text.clone(),
            family: report.family.clone(),
            reason,
            detail: report.detail.clone(),
        };
        let capture = intervention::capture(driver, operator, snapshot, &prompt)
            .await
            .map_err(|_| SessionError::Aborted {
                question_index: index,
            })?;

        let suggestions = self
            .learner
            .propose(&report.family, &snapshot.text, &capture.status);
        let record = InterventionRecord::new(&prompt, report.strategy.clone(), capture, suggestions);
        report.captured = record.is_resolved();
        report.suggestions = record.suggestions.len();
        let absorbed = self.learner.absorb(&*self.store, &record).await?;
        report.intervention = Some(absorbed.stored.id().to_string());

        report.outcome = QuestionOutcome::Deferred;
        report.enter(QuestionState::Recorded)?;
        Ok(())
    }

    /// Process questions until the driver reports the end of the survey or
    /// `max_questions` have been handled. The engine advances the page after
    /// every question, automated or deferred.
    pub async fn run<D, O>(
        &mut self,
        driver: &mut D,
        operator: &mut O,
        max_questions: Option<usize>,
    ) -> Result<SessionReport, SessionError>
    where
        D: PageDriver + ?Sized,
        O: OperatorSignal + ?Sized,
    {
        let mut report = SessionReport {
            session_id: self.session_id.clone(),
            questions: Vec::new(),
        };
        loop {
            if max_questions.is_some_and(|max| report.questions.len() >= max) {
                break;
            }
            report.questions.push(self.process_question(driver, operator).await?);
            if !driver.advance().await? {
                break;
            }
        }
        info!(
            session = %self.session_id,
            questions = report.questions.len(),
            automated = report.automated(),
            deferred = report.deferred(),
            "Session finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_cannot_skip_to_recorded() {
        assert!(QuestionState::Rejected.can_transition(QuestionState::Deferred));
        assert!(!QuestionState::Rejected.can_transition(QuestionState::Recorded));
        assert!(!QuestionState::Scored.can_transition(QuestionState::Validated));
        assert!(QuestionState::Recorded.is_terminal());
    }
}
