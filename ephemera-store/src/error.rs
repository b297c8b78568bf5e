//! Store error types

use thiserror::Error;

/// Store operation result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures surfaced by a [`SessionStore`](crate::SessionStore) backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached (connection refused, pool exhausted, I/O)
    #[error("Store unavailable during {operation}: {message}")]
    Unavailable { operation: String, message: String },

    /// The command did not finish within the configured timeout
    #[error("Store command {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The key holds a different kind of value than the command expects
    #[error("Key {key} holds the wrong kind of value for {operation}")]
    WrongType { key: String, operation: String },

    /// Any other backend failure
    #[error("Store backend error during {operation}: {message}")]
    Backend {
        operation: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid store configuration: {message}")]
    Config { message: String },
}

impl StoreError {
    pub fn unavailable<O: Into<String>, M: Into<String>>(operation: O, message: M) -> Self {
        Self::Unavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same command may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }

    /// Name of the store command that failed, if known
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::Unavailable { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::WrongType { operation, .. }
            | Self::Backend { operation, .. } => Some(operation),
            Self::Config { .. } => None,
        }
    }
}
