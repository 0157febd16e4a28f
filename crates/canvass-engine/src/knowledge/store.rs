use super::KnowledgeBase;
use crate::intervention::InterventionRecord;
use async_trait::async_trait;
use canvass_common::knowledge::KnowledgeSuggestion;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Knowledge store failures. Always fatal to a session: there is no safe default
/// for lost learned state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt knowledge store {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable `(family, label) -> value` mapping plus the append-only intervention log.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn load(&self) -> Result<KnowledgeBase, StoreError>;

    /// Read-modify-write merge. Returns the base as stored afterwards.
    async fn merge(
        &self,
        suggestions: &[KnowledgeSuggestion],
    ) -> Result<KnowledgeBase, StoreError>;

    /// Append a record unless the same capture is already stored.
    async fn append_intervention(
        &self,
        record: &InterventionRecord,
    ) -> Result<AppendOutcome, StoreError>;

    async fn interventions(&self) -> Result<Vec<InterventionRecord>, StoreError>;
}

/// Where a record ended up in the intervention log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended { id: String },
    /// The same capture was already stored under `id`.
    AlreadyStored { id: String },
}

impl AppendOutcome {
    pub fn id(&self) -> &str {
        match self {
            AppendOutcome::Appended { id } | AppendOutcome::AlreadyStored { id } => id,
        }
    }

    pub fn is_appended(&self) -> bool {
        matches!(self, AppendOutcome::Appended { .. })
    }
}

pub(crate) enum Admission {
    Duplicate(String),
    Append(InterventionRecord),
}

/// Decide how `record` joins a log holding `existing`.
///
/// A different capture that reuses a stored id (a reused session id, say) is
/// kept under the next free `<id>.<n>` instead of being dropped.
pub(crate) fn admit(existing: &[InterventionRecord], record: &InterventionRecord) -> Admission {
    let mut taken = 0;
    for stored in existing.iter().filter(|r| is_id_variant(&r.id, &record.id)) {
        if stored.same_capture(record) {
            return Admission::Duplicate(stored.id.clone());
        }
        taken += 1;
    }
    if taken == 0 {
        return Admission::Append(record.clone());
    }
    let mut renamed = record.clone();
    renamed.id = format!("{}.{}", record.id, taken);
    warn!(
        id = %record.id,
        stored_as = %renamed.id,
        "Record id already holds a different capture"
    );
    Admission::Append(renamed)
}

fn is_id_variant(id: &str, base: &str) -> bool {
    match id.strip_prefix(base) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('.')
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())),
        None => false,
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    knowledge: KnowledgeBase,
    records: Vec<InterventionRecord>,
}

/// In-memory store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_knowledge(knowledge: KnowledgeBase) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                knowledge,
                records: Vec::new(),
            })),
        }
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn load(&self) -> Result<KnowledgeBase, StoreError> {
        Ok(self.state.lock().await.knowledge.clone())
    }

    async fn merge(
        &self,
        suggestions: &[KnowledgeSuggestion],
    ) -> Result<KnowledgeBase, StoreError> {
        let mut state = self.state.lock().await;
        state.knowledge.merge(suggestions);
        Ok(state.knowledge.clone())
    }

    async fn append_intervention(
        &self,
        record: &InterventionRecord,
    ) -> Result<AppendOutcome, StoreError> {
        let mut state = self.state.lock().await;
        match admit(&state.records, record) {
            Admission::Duplicate(id) => Ok(AppendOutcome::AlreadyStored { id }),
            Admission::Append(record) => {
                let id = record.id.clone();
                state.records.push(record);
                Ok(AppendOutcome::Appended { id })
            }
        }
    }

    async fn interventions(&self) -> Result<Vec<InterventionRecord>, StoreError> {
        Ok(self.state.lock().await.records.clone())
    }
}
