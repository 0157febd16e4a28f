use async_trait::async_trait;
use canvass_common::ledger::DeferReason;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Context shown to the operator while a question is deferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionPrompt {
    pub session_id: String,
    pub question_index: usize,
    pub question: String,
    pub family: String,
    pub reason: DeferReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Operator aborted the session")]
pub struct OperatorAborted;

/// The human side of an intervention.
///
/// `resume` completes once the operator has finished acting on the page. It
/// has no timeout; cancellation is expressed only through [`OperatorAborted`].
#[async_trait]
pub trait OperatorSignal: Send {
    async fn resume(&mut self, prompt: &InterventionPrompt) -> Result<(), OperatorAborted>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperatorCommand {
    Resume,
    Abort,
}

/// Sending half of a [`ChannelSignal`]. Dropping every handle aborts the session.
#[derive(Debug, Clone)]
pub struct OperatorHandle {
    tx: mpsc::UnboundedSender<OperatorCommand>,
}

impl OperatorHandle {
    /// Returns false if the session has already ended.
    pub fn resume(&self) -> bool {
        self.tx.send(OperatorCommand::Resume).is_ok()
    }

    pub fn abort(&self) -> bool {
        self.tx.send(OperatorCommand::Abort).is_ok()
    }
}

/// Operator signal fed through a channel, for UIs and test harnesses.
#[derive(Debug)]
pub struct ChannelSignal {
    rx: mpsc::UnboundedReceiver<OperatorCommand>,
}

impl ChannelSignal {
    pub fn new() -> (Self, OperatorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, OperatorHandle { tx })
    }
}

#[async_trait]
impl OperatorSignal for ChannelSignal {
    async fn resume(&mut self, prompt: &InterventionPrompt) -> Result<(), OperatorAborted> {
        tracing::info!(
            question = prompt.question_index,
            reason = %prompt.reason,
            "Waiting for operator"
        );
        match self.rx.recv().await {
            Some(OperatorCommand::Resume) => Ok(()),
            Some(OperatorCommand::Abort) | None => Err(OperatorAborted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> InterventionPrompt {
        InterventionPrompt {
            session_id: "s".into(),
            question_index: 0,
            question: "Q".into(),
            family: "uncategorized".into(),
            reason: DeferReason::LowConfidence,
            detail: None,
        }
    }

    #[tokio::test]
    async fn resume_and_abort_are_delivered_in_order() {
        let (mut signal, handle) = ChannelSignal::new();
        assert!(handle.resume());
        assert!(handle.abort());
        assert_eq!(signal.resume(&prompt()).await, Ok(()));
        assert_eq!(signal.resume(&prompt()).await, Err(OperatorAborted));
    }

    #[tokio::test]
    async fn dropped_handle_aborts() {
        let (mut signal, handle) = ChannelSignal::new();
        drop(handle);
        assert_eq!(signal.resume(&prompt()).await, Err(OperatorAborted));
    }
}
