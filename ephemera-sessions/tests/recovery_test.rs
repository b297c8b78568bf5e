//! Store outages and bounded recovery

mod common;

use chrono::Duration;
use common::{fast_retry, Harness};
use ephemera_core::EphemeraConfig;
use ephemera_sessions::{AccessLevel, CreateSessionRequest, RecoveryCoordinator, SessionError};

fn request(ttl_secs: u64) -> CreateSessionRequest {
    CreateSessionRequest::new("customers_pii", AccessLevel::Read).with_ttl(ttl_secs)
}

#[tokio::test]
async fn test_manager_surfaces_transient_failures() {
    let h = Harness::new();
    let session = h.manager.create(request(60)).await.unwrap();

    h.store.fail_next_gets(1);
    let err = h.manager.get(&session.id).await.unwrap_err();
    assert!(err.is_transient());
    assert!(matches!(err, SessionError::StoreUnavailable { .. }));

    // The outage is over
    assert!(h.manager.get(&session.id).await.is_ok());
}

#[tokio::test]
async fn test_recovered_read_gets_grace_period() {
    let h = Harness::new();
    let session = h.manager.create(request(60)).await.unwrap();
    let recovery = RecoveryCoordinator::new(h.manager.clone(), fast_retry(3), 30);

    h.advance_secs(10);
    h.store.fail_next_gets(2);
    let calls_before = h.store.get_calls();

    let recovered = recovery.get(&session.id).await.unwrap();
    assert_eq!(recovered.id, session.id);
    assert_eq!(recovered.expires_at, session.expires_at + Duration::seconds(30));
    // Three attempts for the read plus one for the extension
    assert_eq!(h.store.get_calls() - calls_before, 4);
}

#[tokio::test]
async fn test_clean_read_gets_no_grace_period() {
    let h = Harness::new();
    let session = h.manager.create(request(60)).await.unwrap();
    let recovery = RecoveryCoordinator::new(h.manager.clone(), fast_retry(3), 30);

    let read = recovery.get(&session.id).await.unwrap();
    assert_eq!(read.expires_at, session.expires_at);
}

#[tokio::test]
async fn test_exhausted_recovery_reports_attempts() {
    let h = Harness::new();
    let session = h.manager.create(request(60)).await.unwrap();
    let recovery = RecoveryCoordinator::new(h.manager.clone(), fast_retry(3), 30);

    h.store.fail_next_gets(3);
    match recovery.get(&session.id).await {
        Err(SessionError::RecoveryFailed {
            session_id,
            operation,
            attempts,
            ..
        }) => {
            assert_eq!(session_id, session.id);
            assert_eq!(operation, "get");
            assert_eq!(attempts, 3);
        }
        other => panic!("Expected RecoveryFailed, got {:?}", other),
    }

    // The session itself is untouched
    let read = h.manager.get(&session.id).await.unwrap();
    assert_eq!(read.expires_at, session.expires_at);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let h = Harness::new();
    let recovery = RecoveryCoordinator::new(h.manager.clone(), fast_retry(5), 30);

    let calls_before = h.store.get_calls();
    let result = recovery.get("7f0e4c1a-0000-4000-8000-000000000000").await;
    assert!(matches!(result, Err(SessionError::NotFound { .. })));
    assert_eq!(h.store.get_calls() - calls_before, 1);
}

#[tokio::test]
async fn test_extend_recovers_from_outage() {
    let h = Harness::new();
    let session = h.manager.create(request(60)).await.unwrap();
    let recovery = RecoveryCoordinator::new(h.manager.clone(), fast_retry(3), 0);

    h.store.fail_next_gets(1);
    let extended = recovery.extend(&session.id, 15).await.unwrap();
    assert_eq!(extended.expires_at, session.expires_at + Duration::seconds(15));
    assert_eq!(recovery.manager().get(&session.id).await.unwrap().id, session.id);
}

#[tokio::test]
async fn test_create_retries_transient_writes() {
    let h = Harness::new();

    h.store.fail_next_writes(2);
    let session = h.manager.create(request(60)).await.unwrap();
    assert!(h.manager.get(&session.id).await.is_ok());
}

#[tokio::test]
async fn test_create_fails_after_exhausting_retries() {
    let h = Harness::new();

    h.store.fail_next_writes(3);
    let err = h.manager.create(request(60)).await.unwrap_err();
    assert!(matches!(err, SessionError::CreateFailed { .. }), "{:?}", err);
    assert!(h.store.inner().is_empty().await);
}

#[tokio::test]
async fn test_coordinator_from_config() {
    let h = Harness::new();
    let session = h.manager.create(request(60)).await.unwrap();

    let mut config = EphemeraConfig::default();
    config.retry = fast_retry(2);
    config.recovery.grace_period_secs = 5;
    let recovery = RecoveryCoordinator::from_config(h.manager.clone(), &config);

    h.store.fail_next_gets(1);
    let recovered = recovery.get(&session.id).await.unwrap();
    assert_eq!(recovered.expires_at, session.expires_at + Duration::seconds(5));

    h.store.fail_next_gets(2);
    assert!(matches!(
        recovery.get(&session.id).await,
        Err(SessionError::RecoveryFailed { attempts: 2, .. })
    ));
}
