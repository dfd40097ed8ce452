//! Tests for error classification and display.

use std::time::Duration;

use muninn::{BackendError, MuninnError};

// =========================================================================
// Transience classification
// =========================================================================

#[test]
fn transient_errors_are_retryable() {
    assert!(MuninnError::CapacityExceeded.is_transient());
    assert!(
        MuninnError::ResourceExhaustion {
            waited: Duration::from_secs(5)
        }
        .is_transient()
    );
    assert!(MuninnError::Timeout(Duration::from_secs(30)).is_transient());
    assert!(
        MuninnError::Backend(BackendError::RateLimited { retry_after: None }).is_transient()
    );
    assert!(MuninnError::Backend(BackendError::Network("reset".into())).is_transient());
}

#[test]
fn permanent_errors_are_not_retryable() {
    assert!(!MuninnError::InvalidInput("empty payload".into()).is_transient());
    assert!(!MuninnError::Backend(BackendError::BudgetExceeded).is_transient());
    assert!(!MuninnError::Cancelled.is_transient());
    assert!(!MuninnError::NoBackend.is_transient());
    assert!(!MuninnError::Shutdown.is_transient());
}

// =========================================================================
// Retry hints
// =========================================================================

#[test]
fn retry_after_surfaces_backend_hint() {
    let err = MuninnError::Backend(BackendError::RateLimited {
        retry_after: Some(Duration::from_secs(7)),
    });
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));

    assert_eq!(MuninnError::CapacityExceeded.retry_after(), None);
    assert_eq!(
        MuninnError::Backend(BackendError::Network("reset".into())).retry_after(),
        None
    );
}

// =========================================================================
// Conversion and display
// =========================================================================

#[test]
fn backend_errors_convert_into_muninn_errors() {
    let err: MuninnError = BackendError::BudgetExceeded.into();
    assert!(matches!(
        err,
        MuninnError::Backend(BackendError::BudgetExceeded)
    ));
}

#[test]
fn display_messages_are_descriptive() {
    assert_eq!(
        MuninnError::CapacityExceeded.to_string(),
        "request queue at capacity"
    );
    assert_eq!(
        MuninnError::InvalidInput("empty payload".into()).to_string(),
        "invalid input: empty payload"
    );
    assert_eq!(MuninnError::Shutdown.to_string(), "system is shutting down");
    assert!(
        MuninnError::Backend(BackendError::Network("reset".into()))
            .to_string()
            .contains("network error: reset")
    );
}
