pub mod config;
pub mod dispatch;
pub mod driver;
pub mod inference;
pub mod intervention;
mod jsonl;
pub mod knowledge;
pub mod learner;
pub mod ledger;
pub mod scoring;
pub mod session;
pub mod strategy;

pub use canvass_common::knowledge::KnowledgeSuggestion;
pub use canvass_common::ledger::{DeferReason, DispatchPath, LedgerEntry, QuestionOutcome};
pub use canvass_common::snapshot;
pub use session::{QuestionReport, QuestionState, SessionEngine, SessionError, SessionReport};
