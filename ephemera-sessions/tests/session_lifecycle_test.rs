//! Session lifecycle scenarios against a simulated clock

mod common;

use chrono::Duration;
use common::Harness;
use ephemera_core::{ReadRefreshPolicy, SessionSettings};
use ephemera_sessions::{
    AccessLevel, CreateSessionRequest, Metadata, MetadataValue, SessionError, SessionStatus,
    SessionUpdate,
};
use ephemera_store::{SessionStore, Ttl};
use serde_json::json;
use std::collections::HashSet;
use tokio_test::{assert_err, assert_ok};

fn request(ttl_secs: u64) -> CreateSessionRequest {
    CreateSessionRequest::new("customers_pii", AccessLevel::Read).with_ttl(ttl_secs)
}

#[tokio::test]
async fn test_created_ids_are_unique() {
    let h = Harness::new();

    let mut ids = HashSet::new();
    for _ in 0..50 {
        let session = h.manager.create(request(60)).await.unwrap();
        assert!(ids.insert(session.id));
    }
    assert_eq!(ids.len(), 50);
}

#[tokio::test]
async fn test_expiry_matches_requested_ttl() {
    let h = Harness::new();

    for ttl in [1, 60, 3600] {
        let session = h.manager.create(request(ttl)).await.unwrap();
        assert_eq!(session.expires_at - session.created_at, Duration::seconds(ttl as i64));
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.created_at, session.last_accessed_at);

        let stored_ttl = h
            .store
            .ttl_remaining(&format!("session:{}", session.id))
            .await
            .unwrap();
        assert_eq!(stored_ttl, Some(Ttl::Remaining(ttl)));
    }
}

#[tokio::test]
async fn test_default_ttl_and_ttl_validation() {
    let h = Harness::new();

    let session = h
        .manager
        .create(CreateSessionRequest::new("orders", AccessLevel::Write))
        .await
        .unwrap();
    assert_eq!(session.ttl_secs, 3600);

    assert!(matches!(
        h.manager.create(request(0)).await,
        Err(SessionError::Validation { .. })
    ));
    assert!(matches!(
        h.manager.create(request(86_401)).await,
        Err(SessionError::Validation { .. })
    ));
    assert!(matches!(
        h.manager
            .create(CreateSessionRequest::new(" ", AccessLevel::Read))
            .await,
        Err(SessionError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_get_after_ttl_is_not_found() {
    let h = Harness::new();
    let session = h.manager.create(request(30)).await.unwrap();

    h.advance_secs(29);
    assert_ok!(h.manager.get(&session.id).await);

    h.advance_secs(1);
    assert!(matches!(
        h.manager.get(&session.id).await,
        Err(SessionError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_get_preserves_remaining_ttl() {
    let h = Harness::new();
    let session = h.manager.create(request(100)).await.unwrap();

    h.advance_secs(40);
    let read = h.manager.get(&session.id).await.unwrap();
    assert_eq!(read.last_accessed_at, h.now());
    assert_eq!(read.expires_at, session.expires_at);

    let ttl = h
        .store
        .ttl_remaining(&format!("session:{}", session.id))
        .await
        .unwrap();
    assert_eq!(ttl, Some(Ttl::Remaining(60)));

    // Frequent reads never push expiry out
    for _ in 0..5 {
        h.advance_secs(10);
        h.manager.get(&session.id).await.unwrap();
    }
    h.advance_secs(10);
    assert!(h.manager.get(&session.id).await.is_err());
}

#[tokio::test]
async fn test_untouched_and_sliding_read_policies() {
    let untouched = Harness::with_settings(SessionSettings {
        read_refresh: ReadRefreshPolicy::Untouched,
        ..SessionSettings::default()
    });
    let session = untouched.manager.create(request(100)).await.unwrap();
    untouched.advance_secs(10);
    let read = untouched.manager.get(&session.id).await.unwrap();
    assert_eq!(read.last_accessed_at, session.created_at);

    let sliding = Harness::with_settings(SessionSettings {
        read_refresh: ReadRefreshPolicy::Sliding,
        ..SessionSettings::default()
    });
    let session = sliding.manager.create(request(100)).await.unwrap();
    sliding.advance_secs(90);
    let read = sliding.manager.get(&session.id).await.unwrap();
    assert_eq!(read.expires_at, session.expires_at + Duration::seconds(90));

    sliding.advance_secs(90);
    assert_ok!(sliding.manager.get(&session.id).await);
}

#[tokio::test]
async fn test_store_persistent_record_gets_fallback_ttl() {
    let h = Harness::new();
    let session = h.manager.create(request(100)).await.unwrap();

    // Simulate a record that lost its expiry
    let key = format!("session:{}", session.id);
    let bytes = h.store.get(&key).await.unwrap().unwrap();
    h.store.set(&key, &bytes, None).await.unwrap();

    h.manager.get(&session.id).await.unwrap();
    assert_eq!(
        h.store.ttl_remaining(&key).await.unwrap(),
        Some(Ttl::Remaining(300))
    );
}

#[tokio::test]
async fn test_churn_scenario() {
    let h = Harness::new();

    let session = h
        .manager
        .create(
            CreateSessionRequest::new("customers_pii", AccessLevel::Read)
                .with_ttl(60)
                .with_owner("u1"),
        )
        .await
        .unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.expires_at, h.now() + Duration::seconds(60));

    h.manager
        .write_json(&session.id, "result", &json!({"churn_rate": 0.153}), None)
        .await
        .unwrap();

    let result: serde_json::Value = h.manager.read_json(&session.id, "result").await.unwrap();
    assert_eq!(result, json!({"churn_rate": 0.153}));

    h.advance_secs(61);
    assert!(matches!(
        h.manager.read(&session.id, "result").await,
        Err(SessionError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_data_entries_inherit_or_override_ttl() {
    let h = Harness::new();
    let session = h.manager.create(request(60)).await.unwrap();
    h.advance_secs(20);

    h.manager
        .update(
            &session.id,
            SessionUpdate::Data {
                key: "inherited".to_string(),
                value: b"a".to_vec(),
                ttl_override: None,
            },
        )
        .await
        .unwrap();
    h.manager
        .write_data(&session.id, "short", b"b", Some(5))
        .await
        .unwrap();

    let prefix = format!("session:{}:data:", session.id);
    assert_eq!(
        h.store
            .ttl_remaining(&format!("{}inherited", prefix))
            .await
            .unwrap(),
        Some(Ttl::Remaining(40))
    );
    assert_eq!(
        h.store.ttl_remaining(&format!("{}short", prefix)).await.unwrap(),
        Some(Ttl::Remaining(5))
    );

    h.advance_secs(5);
    assert!(matches!(
        h.manager.read(&session.id, "short").await,
        Err(SessionError::DataNotFound { .. })
    ));
    assert_eq!(h.manager.read(&session.id, "inherited").await.unwrap(), b"a");
}

#[tokio::test]
async fn test_writes_to_missing_session_are_not_found() {
    let h = Harness::new();

    let missing = "2d5c0a4e-0000-4000-8000-000000000000";
    assert!(matches!(
        h.manager.write_data(missing, "k", b"v", None).await,
        Err(SessionError::NotFound { .. })
    ));
    assert!(matches!(
        h.manager
            .update(missing, SessionUpdate::Status(SessionStatus::Closed))
            .await,
        Err(SessionError::NotFound { .. })
    ));

    // Nothing was created on the way
    assert!(h.store.inner().is_empty().await);
}

#[tokio::test]
async fn test_concurrent_updates_to_distinct_keys() {
    let h = Harness::new();
    let session = h.manager.create(request(600)).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let manager = h.manager.clone();
        let id = session.id.clone();
        tasks.push(tokio::spawn(async move {
            manager
                .write_json(&id, &format!("key-{}", i), &i, None)
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    for i in 0..16 {
        let value: i32 = h
            .manager
            .read_json(&session.id, &format!("key-{}", i))
            .await
            .unwrap();
        assert_eq!(value, i);
    }
}

#[tokio::test]
async fn test_metadata_merge_and_remove() {
    let h = Harness::new();
    let session = h
        .manager
        .create(request(600).with_metadata("purpose", "churn").with_metadata("rows", 10))
        .await
        .unwrap();

    let mut patch = Metadata::new();
    patch.insert("rows".to_string(), MetadataValue::Integer(20));
    patch.insert("approved".to_string(), true.into());
    h.manager
        .update(&session.id, SessionUpdate::MergeMetadata(patch))
        .await
        .unwrap();
    h.manager
        .update(
            &session.id,
            SessionUpdate::RemoveMetadata(vec!["purpose".to_string()]),
        )
        .await
        .unwrap();

    let read = h.manager.get(&session.id).await.unwrap();
    assert_eq!(read.metadata.get("rows"), Some(&MetadataValue::Integer(20)));
    assert_eq!(read.metadata.get("approved"), Some(&MetadataValue::Bool(true)));
    assert!(!read.metadata.contains_key("purpose"));
    assert_eq!(read.expires_at, session.expires_at);
}

#[tokio::test]
async fn test_status_transitions() {
    let h = Harness::new();
    let session = h.manager.create(request(600)).await.unwrap();

    assert!(matches!(
        h.manager
            .update(&session.id, SessionUpdate::Status(SessionStatus::Expired))
            .await,
        Err(SessionError::InvalidTransition { .. })
    ));

    assert_ok!(
        h.manager
            .update(&session.id, SessionUpdate::Status(SessionStatus::Closed))
            .await
    );

    // Closed is terminal: no reads, writes, metadata changes or extensions
    assert!(matches!(
        h.manager.get(&session.id).await,
        Err(SessionError::NotFound { .. })
    ));
    assert!(matches!(
        h.manager.write_data(&session.id, "k", b"v", None).await,
        Err(SessionError::NotFound { .. })
    ));
    assert!(matches!(
        h.manager
            .update(&session.id, SessionUpdate::RemoveMetadata(vec!["x".to_string()]))
            .await,
        Err(SessionError::NotFound { .. })
    ));
    assert!(matches!(
        h.manager.extend(&session.id, 1000).await,
        Err(SessionError::Expired { .. })
    ));
    assert!(h.manager.list(None).await.unwrap().is_empty());

    let reopened = h
        .manager
        .update(&session.id, SessionUpdate::Status(SessionStatus::Active))
        .await;
    match reopened {
        Err(SessionError::InvalidTransition { from, to, .. }) => {
            assert_eq!(from, SessionStatus::Closed);
            assert_eq!(to, SessionStatus::Active);
        }
        other => panic!("Expected InvalidTransition, got {:?}", other),
    }
}

#[tokio::test]
async fn test_extend_adds_exactly_the_requested_seconds() {
    let h = Harness::new();
    let session = h.manager.create(request(60)).await.unwrap();
    let key = format!("session:{}", session.id);

    h.advance_secs(20);
    let extended = h.manager.extend(&session.id, 30).await.unwrap();
    assert_eq!(
        h.store.ttl_remaining(&key).await.unwrap(),
        Some(Ttl::Remaining(70))
    );
    assert_eq!(extended.expires_at, session.expires_at + Duration::seconds(30));

    h.advance_secs(69);
    assert_ok!(h.manager.get(&session.id).await);
}

#[tokio::test]
async fn test_extend_is_capped_at_max_ttl() {
    let h = Harness::new();
    let session = h.manager.create(request(60)).await.unwrap();
    let key = format!("session:{}", session.id);

    assert!(matches!(
        h.manager.extend(&session.id, 10_000_000).await,
        Err(SessionError::Validation { .. })
    ));
    // 60 remaining + 86_341 would pass the 86_400 maximum
    assert!(matches!(
        h.manager.extend(&session.id, 86_341).await,
        Err(SessionError::Validation { .. })
    ));
    assert_eq!(
        h.store.ttl_remaining(&key).await.unwrap(),
        Some(Ttl::Remaining(60))
    );

    let extended = h.manager.extend(&session.id, 86_340).await.unwrap();
    assert_eq!(extended.expires_at - h.now(), Duration::seconds(86_400));
}

#[tokio::test]
async fn test_extend_with_huge_value_is_rejected_without_panicking() {
    let h = Harness::with_settings(SessionSettings {
        max_ttl_secs: u64::MAX,
        ..SessionSettings::default()
    });
    let session = h.manager.create(request(60)).await.unwrap();

    let manager = h.manager.clone();
    let id = session.id.clone();
    let outcome = tokio::spawn(async move { manager.extend(&id, 1u64 << 62).await })
        .await
        .expect("extend must not panic");
    assert!(matches!(outcome, Err(SessionError::Validation { .. })));

    assert_eq!(
        h.manager.get(&session.id).await.unwrap().expires_at,
        session.expires_at
    );
}

#[tokio::test]
async fn test_extend_after_expiry_does_not_resurrect() {
    let h = Harness::new();
    let session = h.manager.create(request(10)).await.unwrap();

    h.advance_secs(10);
    assert!(matches!(
        h.manager.extend(&session.id, 60).await,
        Err(SessionError::Expired { .. })
    ));
    assert!(matches!(
        h.manager.get(&session.id).await,
        Err(SessionError::NotFound { .. })
    ));
    assert_eq!(
        h.store
            .ttl_remaining(&format!("session:{}", session.id))
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_malformed_ids_are_rejected() {
    let h = Harness::new();

    for id in ["", "a:b", "index:u1", "../x"] {
        let err = assert_err!(h.manager.get(id).await);
        assert!(matches!(err, SessionError::Validation { .. }), "{:?}", err);
    }
    assert!(matches!(
        h.manager.extend("abc", 0).await,
        Err(SessionError::Validation { .. })
    ));
}
