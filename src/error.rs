//! Muninn error types

use std::time::Duration;

/// Failures reported by the language backend collaborator.
///
/// The backend is a black box to the core; these variants cover the
/// failure modes the pipeline must survive. They are wrapped into
/// [`MuninnError::Backend`] when surfaced to a caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("network error: {0}")]
    Network(String),

    #[error("generation budget exceeded")]
    BudgetExceeded,
}

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    // Submission errors
    #[error("request queue at capacity")]
    CapacityExceeded,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Per-request processing errors
    #[error("backend failure: {0}")]
    Backend(#[from] BackendError),

    /// No pooled handle became available within the configured wait.
    #[error("resource pool exhausted after waiting {waited:?}")]
    ResourceExhaustion { waited: Duration },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,

    // Lifecycle errors
    #[error("no language backend configured")]
    NoBackend,

    #[error("system is shutting down")]
    Shutdown,

    /// A reload cycle was abandoned and the previous pipeline kept
    /// authoritative. Internal only: logged by the reload controller,
    /// never returned to callers.
    #[error("reload aborted: {0}")]
    ReloadAborted(String),
}

impl MuninnError {
    /// Whether this error is transient (retrying the same call later may
    /// succeed) as opposed to a permanent configuration or input problem.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MuninnError::CapacityExceeded
                | MuninnError::Backend(
                    BackendError::RateLimited { .. } | BackendError::Network(_)
                )
                | MuninnError::ResourceExhaustion { .. }
                | MuninnError::Timeout(_)
        )
    }

    /// The backend's `retry_after` hint, if this is a rate-limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MuninnError::Backend(BackendError::RateLimited { retry_after }) => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
