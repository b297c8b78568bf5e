//! In-process TTL store
//!
//! Expiry is evaluated against an injected [`Clock`], so a manual clock can
//! drive key eviction in tests. Expired keys are invisible immediately and
//! physically removed by writes, [`MemoryStore::purge_expired`], or the
//! optional sweeper task.

use crate::error::{StoreError, StoreResult};
use crate::traits::{ScanPage, SessionStore, Ttl};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ephemera_core::{system_clock, SharedClock};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, info};

#[derive(Debug, Clone)]
enum StoredValue {
    Bytes(Vec<u8>),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: StoredValue,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

type Entries = BTreeMap<String, Entry>;

/// TTLs are clamped to roughly a century
const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// In-memory [`SessionStore`]
#[derive(Debug)]
pub struct MemoryStore {
    entries: Arc<RwLock<Entries>>,
    clock: SharedClock,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            clock,
        }
    }

    fn expiry(&self, ttl_secs: Option<u64>) -> Option<DateTime<Utc>> {
        ttl_secs.map(|secs| self.clock.now() + Duration::seconds(secs.min(MAX_TTL_SECS) as i64))
    }

    /// Physically remove every expired key. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries.values().filter(|entry| entry.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Start a background task purging expired keys every `period`
    ///
    /// The task stops on its own once the store is dropped.
    pub fn spawn_sweeper(&self, period: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let entries: Weak<RwLock<Entries>> = Arc::downgrade(&self.entries);
        let clock = self.clock.clone();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(entries) = entries.upgrade() else {
                    debug!("Memory store dropped, stopping sweeper");
                    break;
                };

                let now = clock.now();
                let mut entries = entries.write().await;
                let before = entries.len();
                entries.retain(|_, entry| entry.is_live(now));

                let removed = before - entries.len();
                if removed > 0 {
                    info!(removed, "Memory store sweep removed expired keys");
                }
            }
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn set(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> StoreResult<()> {
        let entry = Entry {
            value: StoredValue::Bytes(value.to_vec()),
            expires_at: self.expiry(ttl_secs),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn replace(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> StoreResult<bool> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl_secs);
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                if matches!(entry.value, StoredValue::Set(_)) {
                    return Err(StoreError::WrongType {
                        key: key.to_string(),
                        operation: "replace".to_string(),
                    });
                }
                entry.value = StoredValue::Bytes(value.to_vec());
                entry.expires_at = expires_at;
                Ok(true)
            }
            Some(_) => {
                entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        let entries = self.entries.read().await;

        match entries.get(key) {
            Some(entry) if entry.is_live(now) => match &entry.value {
                StoredValue::Bytes(bytes) => Ok(Some(bytes.clone())),
                StoredValue::Set(_) => Err(StoreError::WrongType {
                    key: key.to_string(),
                    operation: "get".to_string(),
                }),
            },
            _ => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = self.clock.now();
        let removed = self.entries.write().await.remove(key);
        Ok(removed.map_or(false, |entry| entry.is_live(now)))
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool> {
        let now = self.clock.now();
        let expires_at = self.expiry(Some(ttl_secs));
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = expires_at;
                Ok(true)
            }
            Some(_) => {
                entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn ttl_remaining(&self, key: &str) -> StoreResult<Option<Ttl>> {
        let now = self.clock.now();
        let entries = self.entries.read().await;

        let Some(entry) = entries.get(key).filter(|entry| entry.is_live(now)) else {
            return Ok(None);
        };

        Ok(Some(match entry.expires_at {
            None => Ttl::Persistent,
            Some(expires_at) => {
                let millis = (expires_at - now).num_milliseconds().max(1) as u64;
                Ttl::Remaining(millis.div_ceil(1000))
            }
        }))
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;

        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: StoredValue::Set(BTreeSet::new()),
            expires_at: None,
        });

        match &mut entry.value {
            StoredValue::Set(members) => Ok(members.insert(member.to_string())),
            StoredValue::Bytes(_) => Err(StoreError::WrongType {
                key: key.to_string(),
                operation: "set_add".to_string(),
            }),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;

        let Some(entry) = entries.get_mut(key).filter(|entry| entry.is_live(now)) else {
            return Ok(false);
        };

        let (removed, now_empty) = match &mut entry.value {
            StoredValue::Set(members) => (members.remove(member), members.is_empty()),
            StoredValue::Bytes(_) => {
                return Err(StoreError::WrongType {
                    key: key.to_string(),
                    operation: "set_remove".to_string(),
                })
            }
        };

        // Empty sets do not linger as keys
        if now_empty {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let now = self.clock.now();
        let entries = self.entries.read().await;

        match entries.get(key).filter(|entry| entry.is_live(now)) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: StoredValue::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType {
                key: key.to_string(),
                operation: "set_members".to_string(),
            }),
        }
    }

    async fn scan_page(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        count: usize,
    ) -> StoreResult<ScanPage> {
        let now = self.clock.now();
        let count = count.max(1);
        let entries = self.entries.read().await;

        let lower = match cursor {
            Some(cursor) if cursor >= prefix => Bound::Excluded(cursor.to_string()),
            _ => Bound::Included(prefix.to_string()),
        };

        let keys: Vec<String> = entries
            .range((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .take(count)
            .collect();

        let next_cursor = if keys.len() == count {
            keys.last().cloned()
        } else {
            None
        };

        Ok(ScanPage { keys, next_cursor })
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
