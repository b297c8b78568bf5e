//! Shared fixtures for session scenario tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ephemera_core::{
    init_logging, Clock, LoggingConfig, ManualClock, RetryConfig, SessionSettings, SharedClock,
};
use ephemera_sessions::{
    ArchivalSink, ArchivedSession, DataEntry, Session, SessionError, SessionManager,
    SessionResult,
};
use ephemera_store::{MemoryStore, ScanPage, SessionStore, StoreError, StoreResult, Ttl};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

static LOGGING: Once = Once::new();

pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let config = LoggingConfig {
            level: "warn".to_string(),
            filter_directives: Vec::new(),
            ..LoggingConfig::default()
        };
        let _ = init_logging(&config);
    });
}

/// Retries without real waiting
pub fn fast_retry(max_attempts: usize) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_ms: 1,
        max_delay_ms: 2,
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Memory store that fails a configurable number of upcoming commands
/// with a transient error
#[derive(Debug)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing_gets: AtomicUsize,
    failing_writes: AtomicUsize,
    get_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            inner: MemoryStore::with_clock(clock),
            failing_gets: AtomicUsize::new(0),
            failing_writes: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` `get` calls
    pub fn fail_next_gets(&self, n: usize) {
        self.failing_gets.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` `set`/`replace` calls
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn trip(counter: &AtomicUsize, operation: &str) -> StoreResult<()> {
        let tripped = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            Err(StoreError::unavailable(operation, "injected outage"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn set(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> StoreResult<()> {
        Self::trip(&self.failing_writes, "set")?;
        self.inner.set(key, value, ttl_secs).await
    }

    async fn replace(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> StoreResult<bool> {
        Self::trip(&self.failing_writes, "replace")?;
        self.inner.replace(key, value, ttl_secs).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Self::trip(&self.failing_gets, "get")?;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key).await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool> {
        self.inner.expire(key, ttl_secs).await
    }

    async fn ttl_remaining(&self, key: &str) -> StoreResult<Option<Ttl>> {
        self.inner.ttl_remaining(key).await
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.inner.set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.inner.set_remove(key, member).await
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        self.inner.set_members(key).await
    }

    async fn scan_page(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        count: usize,
    ) -> StoreResult<ScanPage> {
        self.inner.scan_page(prefix, cursor, count).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

/// Archive sink that always fails
pub struct BrokenSink;

#[async_trait]
impl ArchivalSink for BrokenSink {
    async fn store(&self, session: &Session, _entries: &[DataEntry]) -> SessionResult<()> {
        Err(SessionError::ArchivalFailed {
            session_id: session.id.clone(),
            message: "archive backend offline".to_string(),
        })
    }

    async fn load(&self, _session_id: &str) -> SessionResult<Option<ArchivedSession>> {
        Ok(None)
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<FlakyStore>,
    pub manager: SessionManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(SessionSettings::default())
    }

    pub fn with_settings(settings: SessionSettings) -> Self {
        init_test_logging();

        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(FlakyStore::new(clock.clone()));
        let manager = SessionManager::new(store.clone(), clock.clone(), settings)
            .with_retry(fast_retry(3))
            .with_scan_page_size(4);

        Self {
            clock,
            store,
            manager,
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        self.clock.advance_secs(secs);
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
