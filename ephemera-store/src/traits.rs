//! The store adapter contract

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;

/// Remaining lifetime of a live key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Seconds until expiry, rounded up; a live key never reports 0
    Remaining(u64),
    /// The key has no expiry
    Persistent,
}

impl Ttl {
    /// Remaining seconds, or `None` for persistent keys
    pub fn seconds(&self) -> Option<u64> {
        match self {
            Ttl::Remaining(secs) => Some(*secs),
            Ttl::Persistent => None,
        }
    }
}

/// One page of a prefix scan
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    /// Keys in ascending order
    pub keys: Vec<String>,
    /// Resume point for the next page; `None` once the scan is complete
    pub next_cursor: Option<String>,
}

/// TTL-capable key-value store
///
/// Every operation is atomic on a single key. Nothing spans keys; callers
/// compose multi-key sequences themselves and must tolerate partial
/// completion.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Write `value`; `ttl_secs = None` stores it without expiry
    async fn set(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> StoreResult<()>;

    /// Write `value` only if `key` currently exists. Returns whether it was written.
    async fn replace(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> StoreResult<bool>;

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Remove a key of any kind. Returns whether a live key was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Set a new TTL on an existing key. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool>;

    /// Remaining TTL, or `None` if the key is absent or already expired
    async fn ttl_remaining(&self, key: &str) -> StoreResult<Option<Ttl>>;

    /// Add a member to the set at `key`. Returns whether it was newly added.
    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Remove a member from the set at `key`. Returns whether it was present.
    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Members of the set at `key`, empty if the set does not exist
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Up to `count` live keys starting with `prefix` and sorting after `cursor`
    ///
    /// O(total keys) in the worst case; administrative use only.
    async fn scan_page(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        count: usize,
    ) -> StoreResult<ScanPage>;

    /// Cheap round trip to check the backend is reachable
    async fn ping(&self) -> StoreResult<()>;
}

/// Shared store handle
pub type SharedStore = Arc<dyn SessionStore>;

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn set(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> StoreResult<()> {
        (**self).set(key, value, ttl_secs).await
    }

    async fn replace(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> StoreResult<bool> {
        (**self).replace(key, value, ttl_secs).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        (**self).delete(key).await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool> {
        (**self).expire(key, ttl_secs).await
    }

    async fn ttl_remaining(&self, key: &str) -> StoreResult<Option<Ttl>> {
        (**self).ttl_remaining(key).await
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        (**self).set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        (**self).set_remove(key, member).await
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        (**self).set_members(key).await
    }

    async fn scan_page(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        count: usize,
    ) -> StoreResult<ScanPage> {
        (**self).scan_page(prefix, cursor, count).await
    }

    async fn ping(&self) -> StoreResult<()> {
        (**self).ping().await
    }
}

enum ScanState {
    Next(Option<String>),
    Done,
}

/// Lazily scan every live key under `prefix`, one page at a time
pub fn scan_keys<'a>(
    store: &'a dyn SessionStore,
    prefix: &'a str,
    page_size: usize,
) -> BoxStream<'a, StoreResult<String>> {
    scan_keys_from(store, prefix, page_size, None)
}

/// Like [`scan_keys`], resuming after `start_after` (the last key a previous
/// scan yielded)
pub fn scan_keys_from<'a>(
    store: &'a dyn SessionStore,
    prefix: &'a str,
    page_size: usize,
    start_after: Option<String>,
) -> BoxStream<'a, StoreResult<String>> {
    let page_size = page_size.max(1);

    stream::try_unfold(ScanState::Next(start_after), move |state| async move {
        match state {
            ScanState::Done => Ok(None),
            ScanState::Next(cursor) => {
                let page = store.scan_page(prefix, cursor.as_deref(), page_size).await?;
                let next = match page.next_cursor {
                    Some(cursor) => ScanState::Next(Some(cursor)),
                    None => ScanState::Done,
                };
                Ok(Some((page.keys, next)))
            }
        }
    })
    .map_ok(|keys| stream::iter(keys.into_iter().map(Ok::<String, StoreError>)))
    .try_flatten()
    .boxed()
}
