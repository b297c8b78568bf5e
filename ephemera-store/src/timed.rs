//! Command-level timeout decorator

use crate::error::{StoreError, StoreResult};
use crate::traits::{ScanPage, SessionStore, Ttl};
use async_trait::async_trait;
use ephemera_core::with_timeout;
use std::future::Future;
use tracing::warn;

/// Wraps a store so that no single command can block longer than `timeout_ms`
///
/// A command that overruns surfaces as [`StoreError::Timeout`], which is
/// transient and therefore eligible for retry by callers.
#[derive(Debug, Clone)]
pub struct TimedStore<S> {
    inner: S,
    timeout_ms: u64,
}

impl<S: SessionStore> TimedStore<S> {
    pub fn new(inner: S, timeout_ms: u64) -> Self {
        Self { inner, timeout_ms }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    async fn bounded<T, F>(&self, operation: &'static str, command: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match with_timeout(command, self.timeout_ms, operation).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout_ms = self.timeout_ms, "Store command timed out");
                Err(StoreError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms: self.timeout_ms,
                })
            }
        }
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for TimedStore<S> {
    async fn set(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> StoreResult<()> {
        self.bounded("set", self.inner.set(key, value, ttl_secs)).await
    }

    async fn replace(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> StoreResult<bool> {
        self.bounded("replace", self.inner.replace(key, value, ttl_secs))
            .await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.bounded("get", self.inner.get(key)).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.bounded("delete", self.inner.delete(key)).await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool> {
        self.bounded("expire", self.inner.expire(key, ttl_secs)).await
    }

    async fn ttl_remaining(&self, key: &str) -> StoreResult<Option<Ttl>> {
        self.bounded("ttl_remaining", self.inner.ttl_remaining(key))
            .await
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.bounded("set_add", self.inner.set_add(key, member)).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.bounded("set_remove", self.inner.set_remove(key, member))
            .await
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        self.bounded("set_members", self.inner.set_members(key)).await
    }

    async fn scan_page(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        count: usize,
    ) -> StoreResult<ScanPage> {
        self.bounded("scan_page", self.inner.scan_page(prefix, cursor, count))
            .await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.bounded("ping", self.inner.ping()).await
    }
}
