//! Session error types
//!
//! Expected outcomes such as a missing or expired session are ordinary
//! variants here, not panics or logged failures.

use crate::types::SessionStatus;
use ephemera_core::EphemeraError;
use ephemera_store::StoreError;
use thiserror::Error;

/// Session operation result type
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    /// No live session under this id, whether it was closed or expired
    #[error("Session not found: {session_id}")]
    NotFound { session_id: String },

    /// The session's TTL had already elapsed when the operation ran
    #[error("Session expired: {session_id}")]
    Expired { session_id: String },

    /// The session record could not be written
    #[error("Failed to create session: {message}")]
    CreateFailed {
        message: String,
        #[source]
        source: Option<StoreError>,
    },

    /// The archive write failed; the session was still deleted
    #[error("Archival failed for session {session_id}: {message}")]
    ArchivalFailed { session_id: String, message: String },

    /// Every recovery attempt hit a transient failure
    #[error("Recovery of {operation} for session {session_id} failed after {attempts} attempts: {message}")]
    RecoveryFailed {
        session_id: String,
        operation: String,
        attempts: usize,
        message: String,
    },

    /// Transient store failure
    #[error("Session store unavailable during {operation}: {source}")]
    StoreUnavailable {
        operation: String,
        #[source]
        source: StoreError,
    },

    /// Permanent store failure
    #[error("Session store failure during {operation}: {source}")]
    Backend {
        operation: String,
        #[source]
        source: StoreError,
    },

    /// The session is live but holds no value under this key
    #[error("No data under key {key} in session {session_id}")]
    DataNotFound { session_id: String, key: String },

    #[error("Session {session_id} cannot move from {from} to {to}")]
    InvalidTransition {
        session_id: String,
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] EphemeraError),
}

impl SessionError {
    pub fn not_found<S: Into<String>>(session_id: S) -> Self {
        Self::NotFound {
            session_id: session_id.into(),
        }
    }

    pub fn expired<S: Into<String>>(session_id: S) -> Self {
        Self::Expired {
            session_id: session_id.into(),
        }
    }

    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap a store failure, keeping the transient/permanent split
    pub fn store<O: Into<String>>(operation: O, source: StoreError) -> Self {
        if source.is_transient() {
            Self::StoreUnavailable {
                operation: operation.into(),
                source,
            }
        } else {
            Self::Backend {
                operation: operation.into(),
                source,
            }
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// Session the error refers to, when there is one
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::NotFound { session_id }
            | Self::Expired { session_id }
            | Self::ArchivalFailed { session_id, .. }
            | Self::RecoveryFailed { session_id, .. }
            | Self::DataNotFound { session_id, .. }
            | Self::InvalidTransition { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    /// Short stable name for log fields
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Expired { .. } => "expired",
            Self::CreateFailed { .. } => "create_failed",
            Self::ArchivalFailed { .. } => "archival_failed",
            Self::RecoveryFailed { .. } => "recovery_failed",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::Backend { .. } => "backend",
            Self::DataNotFound { .. } => "data_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Validation { .. } => "validation",
            Self::Serialization(_) => "serialization",
            Self::Core(_) => "core",
        }
    }
}
