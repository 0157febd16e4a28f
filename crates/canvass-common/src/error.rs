/// Errors reported by a page driver implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriverError {
    // ============================================================
    // Page Errors
    // ============================================================
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Snapshot failed: {0}")]
    Snapshot(String),

    // ============================================================
    // Element Errors
    // ============================================================
    #[error("Element {locator} not found")]
    ElementNotFound { locator: String },

    #[error("Element {locator} is stale (removed from page)")]
    ElementStale { locator: String },

    #[error("Element {locator} is not interactable: {reason}")]
    ElementNotInteractable { locator: String, reason: String },

    #[error("Option not found: {value}")]
    OptionNotFound { value: String },

    // ============================================================
    // Execution Errors
    // ============================================================
    #[error("Timeout: {operation}")]
    Timeout { operation: String },

    #[error("Connection lost")]
    ConnectionLost,

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Other: {0}")]
    Other(String),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl From<std::io::Error> for DriverError {
    fn from(err: std::io::Error) -> Self {
        DriverError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        DriverError::Serialization(err.to_string())
    }
}

impl DriverError {
    /// Stable error code, used in ledger details and logs.
    pub fn code(&self) -> &'static str {
        match self {
            DriverError::Navigation(_) => "NAVIGATION_ERROR",
            DriverError::Snapshot(_) => "SNAPSHOT_ERROR",
            DriverError::ElementNotFound { .. } => "ELEMENT_NOT_FOUND",
            DriverError::ElementStale { .. } => "ELEMENT_STALE",
            DriverError::ElementNotInteractable { .. } => "ELEMENT_NOT_INTERACTABLE",
            DriverError::OptionNotFound { .. } => "OPTION_NOT_FOUND",
            DriverError::Timeout { .. } => "TIMEOUT",
            DriverError::ConnectionLost => "CONNECTION_LOST",
            DriverError::Io(_) => "IO_ERROR",
            DriverError::Serialization(_) => "SERIALIZATION_ERROR",
            DriverError::Other(_) => "UNKNOWN_ERROR",
            DriverError::NotSupported(_) => "NOT_SUPPORTED",
        }
    }
}
