//! Page driver seam. The engine never parses markup; it only sees snapshots.

pub mod scripted;

pub use scripted::{OperatorEdit, Script, ScriptedDriver, ScriptedOperator, ScriptedPage};

use async_trait::async_trait;
pub use canvass_common::error::DriverError;
use canvass_common::snapshot::{ElementHandle, PageAction, QuestionSnapshot};

/// Interface every page driver implements (browser automation, scripted replays, test mocks).
#[async_trait]
pub trait PageDriver: Send {
    /// Describe the question currently rendered.
    async fn snapshot(&mut self) -> Result<QuestionSnapshot, DriverError>;

    /// Resolve a locator token from the current snapshot.
    async fn locate(&mut self, token: &str) -> Result<ElementHandle, DriverError>;

    /// Perform one interaction.
    async fn act(&mut self, handle: &ElementHandle, action: &PageAction) -> Result<(), DriverError>;

    /// Wait for the page to stop changing. Returns false if it did not settle in time.
    async fn wait_settled(&mut self, timeout_ms: u64) -> bool;

    /// Move on to the next question. Returns false when the survey has ended.
    ///
    /// Drivers that cannot navigate keep the default and present a single question.
    async fn advance(&mut self) -> Result<bool, DriverError> {
        Ok(false)
    }
}
