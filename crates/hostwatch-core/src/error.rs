//! Error types for the hostwatch system
//!
//! One variant per collaborator seam, so the top-level pass boundary can
//! report where an unexpected failure came from.

use thiserror::Error;

/// Result type alias for hostwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the hostwatch system
#[derive(Error, Debug)]
pub enum Error {
    /// Connectivity probe errors
    #[error("Probe error: {0}")]
    Probe(String),

    /// Container inventory fetch errors
    #[error("Inventory error: {0}")]
    Inventory(String),

    /// Resource repository errors
    #[error("Resource repository error: {0}")]
    Repository(String),

    /// Host store errors
    #[error("Host store error: {0}")]
    HostStore(String),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notification(String),

    /// Proxy check/start/attach errors
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// Single-flight lock errors
    #[error("Lock error: {0}")]
    Lock(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed collaborator output
    #[error("Parse error: {0}")]
    Parse(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a probe error
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    /// Create an inventory error
    pub fn inventory(msg: impl Into<String>) -> Self {
        Self::Inventory(msg.into())
    }

    /// Create a resource repository error
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    /// Create a host store error
    pub fn host_store(msg: impl Into<String>) -> Self {
        Self::HostStore(msg.into())
    }

    /// Create a notification error
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Create a proxy error
    pub fn proxy(msg: impl Into<String>) -> Self {
        Self::Proxy(msg.into())
    }

    /// Create a lock error
    pub fn lock(msg: impl Into<String>) -> Self {
        Self::Lock(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
