pub mod error;
pub mod knowledge;
pub mod ledger;
pub mod snapshot;
pub mod text;

pub use error::DriverError;
pub use knowledge::KnowledgeSuggestion;
pub use ledger::{DeferReason, DispatchPath, LedgerEntry, QuestionOutcome};
pub use snapshot::{ElementHandle, ElementKind, ElementState, PageAction, QuestionSnapshot, SnapshotElement};
