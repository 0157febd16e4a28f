//! Human intervention: freeze the page, wait for the operator, recover what they did.

pub mod diff;
pub mod operator;

pub use diff::{
    CaptureStatus, CapturedAnswer, ChangeKind, ElementChange, UncapturedCause, diff, resolve,
};
pub use operator::{
    ChannelSignal, InterventionPrompt, OperatorAborted, OperatorHandle, OperatorSignal,
};

use crate::driver::PageDriver;
use canvass_common::knowledge::KnowledgeSuggestion;
use canvass_common::ledger::DeferReason;
use canvass_common::snapshot::QuestionSnapshot;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tracing::{info, warn};

/// Durable record of one deferral. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionRecord {
    /// `{session_id}-{question_index}`, suffixed `.n` when a different capture
    /// already holds that id.
    pub id: String,
    pub session_id: String,
    pub question_index: usize,
    pub recorded_at: SystemTime,
    pub reason: DeferReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub family: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Page state before the operator acted.
    pub snapshot: QuestionSnapshot,
    #[serde(default)]
    pub changes: Vec<ElementChange>,
    pub status: CaptureStatus,
    #[serde(default)]
    pub suggestions: Vec<KnowledgeSuggestion>,
}

impl InterventionRecord {
    pub fn record_id(session_id: &str, question_index: usize) -> String {
        format!("{}-{}", session_id, question_index)
    }

    pub fn new(
        prompt: &InterventionPrompt,
        strategy: Option<String>,
        capture: Capture,
        suggestions: Vec<KnowledgeSuggestion>,
    ) -> Self {
        Self {
            id: Self::record_id(&prompt.session_id, prompt.question_index),
            session_id: prompt.session_id.clone(),
            question_index: prompt.question_index,
            recorded_at: SystemTime::now(),
            reason: prompt.reason,
            detail: prompt.detail.clone(),
            family: prompt.family.clone(),
            strategy,
            snapshot: capture.before,
            changes: capture.changes,
            status: capture.status,
            suggestions,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status.is_resolved()
    }

    /// Same question and same operator action, whenever it was recorded.
    pub fn same_capture(&self, other: &Self) -> bool {
        self.session_id == other.session_id
            && self.question_index == other.question_index
            && self.snapshot == other.snapshot
            && self.changes == other.changes
            && self.status == other.status
    }
}

/// Before-state, diff, and resolution of one intervention.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub before: QuestionSnapshot,
    pub changes: Vec<ElementChange>,
    pub status: CaptureStatus,
}

/// Run one intervention against the live page.
///
/// The before-state is re-read from the page so it reflects any automated
/// attempt that preceded the deferral. `fallback` is used only if that read
/// fails. The wait on the operator is unbounded.
pub async fn capture<D, O>(
    driver: &mut D,
    operator: &mut O,
    fallback: &QuestionSnapshot,
    prompt: &InterventionPrompt,
) -> Result<Capture, OperatorAborted>
where
    D: PageDriver + ?Sized,
    O: OperatorSignal + ?Sized,
{
    let before = match driver.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, code = e.code(), "Before-state snapshot failed, using question snapshot");
            fallback.clone()
        }
    };

    operator.resume(prompt).await?;

    let after = match driver.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, code = e.code(), "After-state snapshot failed");
            return Ok(Capture {
                before,
                changes: Vec::new(),
                status: CaptureStatus::Uncaptured {
                    cause: UncapturedCause::SnapshotFailed,
                },
            });
        }
    };

    let changes = diff(&before, &after);
    let status = resolve(&changes);
    match &status {
        CaptureStatus::Resolved { answers } => {
            info!(question = prompt.question_index, answers = answers.len(), "Intervention captured")
        }
        CaptureStatus::Uncaptured { cause } => {
            info!(question = prompt.question_index, cause = ?cause, changes = changes.len(), "Intervention uncaptured")
        }
    }
    Ok(Capture {
        before,
        changes,
        status,
    })
}
