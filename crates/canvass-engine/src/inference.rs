use async_trait::async_trait;
use canvass_common::snapshot::QuestionSnapshot;
use serde::{Deserialize, Serialize};

/// Optional opinion from a model-backed service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// In [0, 1]; values outside are clamped by the scorer.
    pub confidence: f64,
}

/// One more signal for the scorer. It can lower a confidence, never bypass a threshold.
#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn suggest(&self, snapshot: &QuestionSnapshot) -> Option<InferenceHint>;
}

/// Service that always returns the same hint. Used for dry runs and tests.
#[derive(Debug, Clone)]
pub struct FixedInference(pub InferenceHint);

#[async_trait]
impl InferenceService for FixedInference {
    async fn suggest(&self, _snapshot: &QuestionSnapshot) -> Option<InferenceHint> {
        Some(self.0.clone())
    }
}
