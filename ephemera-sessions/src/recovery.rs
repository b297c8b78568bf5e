//! Recovery across transient store outages
//!
//! Wraps the read-side calls of a [`SessionManager`] in bounded retries with
//! exponential backoff. `create` retries its own store writes; `close` is
//! not retried as a whole.

use crate::error::{SessionError, SessionResult};
use crate::manager::SessionManager;
use crate::types::Session;
use ephemera_core::{retry_with_policy, EphemeraConfig, RetryConfig, RetryFailure};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RecoveryCoordinator {
    manager: SessionManager,
    retry: RetryConfig,
    grace_period_secs: u64,
}

impl RecoveryCoordinator {
    pub fn new(manager: SessionManager, retry: RetryConfig, grace_period_secs: u64) -> Self {
        Self {
            manager,
            retry,
            grace_period_secs,
        }
    }

    /// Coordinator using the configured retry policy and grace period
    pub fn from_config(manager: SessionManager, config: &EphemeraConfig) -> Self {
        Self::new(
            manager,
            config.retry.clone(),
            config.recovery.grace_period_secs,
        )
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// [`SessionManager::get`] with retries
    ///
    /// When the read only succeeded after retrying, the session is extended
    /// by the grace period so the caller is not immediately racing expiry
    /// again. A failed grace extension is logged, not returned.
    pub async fn get(&self, session_id: &str) -> SessionResult<Session> {
        let manager = &self.manager;
        let success = retry_with_policy(
            move || manager.get(session_id),
            &self.retry,
            "recovery.get",
            SessionError::is_transient,
        )
        .await
        .map_err(|failure| recovery_failed(session_id, "get", failure))?;

        if success.attempts <= 1 || self.grace_period_secs == 0 {
            return Ok(success.value);
        }

        match self.manager.extend(session_id, self.grace_period_secs).await {
            Ok(extended) => {
                info!(
                    session_id,
                    attempts = success.attempts,
                    grace_period_secs = self.grace_period_secs,
                    "Recovered session read, granted grace period"
                );
                Ok(extended)
            }
            Err(e) => {
                warn!(
                    session_id,
                    attempts = success.attempts,
                    error = %e,
                    "Recovered session read but grace extension failed"
                );
                Ok(success.value)
            }
        }
    }

    /// [`SessionManager::extend`] with retries
    pub async fn extend(&self, session_id: &str, additional_secs: u64) -> SessionResult<Session> {
        let manager = &self.manager;
        retry_with_policy(
            move || manager.extend(session_id, additional_secs),
            &self.retry,
            "recovery.extend",
            SessionError::is_transient,
        )
        .await
        .map(|success| success.value)
        .map_err(|failure| recovery_failed(session_id, "extend", failure))
    }
}

/// Exhausted transient failures become `RecoveryFailed`; anything else is
/// passed through as the manager reported it
fn recovery_failed(
    session_id: &str,
    operation: &str,
    failure: RetryFailure<SessionError>,
) -> SessionError {
    if !failure.exhausted {
        return failure.error;
    }

    warn!(
        session_id,
        operation,
        attempts = failure.attempts,
        error = %failure.error,
        "Recovery attempts exhausted"
    );
    SessionError::RecoveryFailed {
        session_id: session_id.to_string(),
        operation: operation.to_string(),
        attempts: failure.attempts,
        message: failure.error.to_string(),
    }
}
