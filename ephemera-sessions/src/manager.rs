//! Session Manager - lifecycle of TTL-backed sessions
//!
//! Sessions live in the store as one record key plus any number of data keys.
//! The store's TTL is the only authority on expiry: the manager never keeps
//! its own table of live sessions, and every rewrite of an existing record
//! goes through `replace` so a session that expired mid-operation is never
//! brought back.
//!
//! Multi-key sequences (create, close) are not transactional. Create writes
//! the record before indexing it; close archives, then deletes the record,
//! then its data, then the index entry. Any prefix of those steps leaves
//! state the other operations tolerate.

use crate::archive::{DirectoryArchivalSink, SharedArchivalSink, StoreArchivalSink};
use crate::error::{SessionError, SessionResult};
use crate::index::MembershipIndex;
use crate::namespace::{
    validate_data_key, validate_owner_id, validate_session_id, SessionDataNamespace,
};
use crate::types::{
    expiry_after, CreateSessionRequest, DataEntry, Session, SessionStatus, SessionSummary,
    SessionUpdate,
};
use chrono::{DateTime, Utc};
use ephemera_core::{
    process_concurrently, retry_with_policy, ArchiveBackend, EphemeraConfig, ReadRefreshPolicy,
    RetryConfig, SessionSettings, SharedClock,
};
use ephemera_store::{scan_keys, SessionStore, SharedStore, StoreError, Ttl};
use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const DEFAULT_SCAN_PAGE_SIZE: usize = 100;
const DEFAULT_CLEANUP_CONCURRENCY: usize = 8;

/// TTL to apply when rewriting a record
#[derive(Debug, Clone, Copy)]
enum RecordTtl {
    /// What the store reported
    Remaining(u64),
    /// The store reported no expiry; the configured fallback applies
    Fallback(u64),
}

impl RecordTtl {
    fn secs(&self) -> u64 {
        match self {
            RecordTtl::Remaining(secs) | RecordTtl::Fallback(secs) => *secs,
        }
    }
}

/// Session lifecycle over a shared TTL store
///
/// Cheap to clone; clones share the store, archive sink and clock.
#[derive(Clone)]
pub struct SessionManager {
    store: SharedStore,
    namespace: SessionDataNamespace,
    index: MembershipIndex,
    archive: SharedArchivalSink,
    clock: SharedClock,
    settings: SessionSettings,
    retry: RetryConfig,
    scan_page_size: usize,
    archive_on_cleanup: bool,
    cleanup_concurrency: usize,
}

impl SessionManager {
    /// Create a manager archiving into the same store
    pub fn new(store: SharedStore, clock: SharedClock, settings: SessionSettings) -> Self {
        let namespace = SessionDataNamespace::new();
        let archive: SharedArchivalSink =
            Arc::new(StoreArchivalSink::with_clock(store.clone(), clock.clone()));

        Self {
            index: MembershipIndex::new(store.clone(), namespace),
            store,
            namespace,
            archive,
            clock,
            settings,
            retry: RetryConfig::default(),
            scan_page_size: DEFAULT_SCAN_PAGE_SIZE,
            archive_on_cleanup: true,
            cleanup_concurrency: DEFAULT_CLEANUP_CONCURRENCY,
        }
    }

    /// Create a manager from the full configuration
    pub fn from_config(
        config: &EphemeraConfig,
        store: SharedStore,
        clock: SharedClock,
    ) -> SessionResult<Self> {
        let archive: SharedArchivalSink = match config.archive.backend {
            ArchiveBackend::Store => {
                Arc::new(StoreArchivalSink::with_clock(store.clone(), clock.clone()))
            }
            ArchiveBackend::Directory => Arc::new(DirectoryArchivalSink::with_clock(
                &config.archive.directory,
                clock.clone(),
            )?),
        };

        Ok(Self::new(store, clock, config.session.clone())
            .with_archive_sink(archive)
            .with_retry(config.retry.clone())
            .with_scan_page_size(config.store.scan_page_size)
            .with_cleanup(config.archive.enabled, config.cleanup.max_concurrent))
    }

    pub fn with_archive_sink(mut self, archive: SharedArchivalSink) -> Self {
        self.archive = archive;
        self
    }

    /// Retry policy for record writes and deletes
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_scan_page_size(mut self, scan_page_size: usize) -> Self {
        self.scan_page_size = scan_page_size.max(1);
        self
    }

    /// Whether cleanup archives the sessions it reaps, and how many it closes at once
    pub fn with_cleanup(mut self, archive: bool, max_concurrent: usize) -> Self {
        self.archive_on_cleanup = archive;
        self.cleanup_concurrency = max_concurrent.max(1);
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn archive_sink(&self) -> &SharedArchivalSink {
        &self.archive
    }

    /// Round trip to the backing store
    pub async fn health_check(&self) -> SessionResult<()> {
        self.store
            .ping()
            .await
            .map_err(|e| SessionError::store("ping", e))
    }

    /// Create a session and register it under its owner
    ///
    /// The record write is retried on transient store failures; if it still
    /// fails the result is [`SessionError::CreateFailed`]. An indexing
    /// failure is only logged.
    pub async fn create(&self, request: CreateSessionRequest) -> SessionResult<Session> {
        let ttl_secs = request.ttl_secs.unwrap_or(self.settings.default_ttl_secs);
        self.validate_ttl("ttl_secs", ttl_secs)?;
        if request.data_source_ref.trim().is_empty() {
            return Err(SessionError::validation(
                "data_source_ref",
                "must not be blank",
            ));
        }
        if let Some(owner_id) = &request.owner_id {
            validate_owner_id(owner_id)?;
        }

        let session = Session::new(
            Uuid::new_v4().to_string(),
            request,
            ttl_secs,
            self.clock.now(),
        )?;
        let bytes = serde_json::to_vec(&session)?;
        let key = self.namespace.meta_key(&session.id);

        let store = self.store.as_ref();
        let (key, bytes) = (key.as_str(), bytes.as_slice());
        retry_with_policy(
            move || store.set(key, bytes, Some(ttl_secs)),
            &self.retry,
            "session.create",
            StoreError::is_transient,
        )
        .await
        .map_err(|failure| {
            error!(
                session_id = %session.id,
                operation = "create",
                attempts = failure.attempts,
                error = %failure.error,
                "Failed to write session record"
            );
            SessionError::CreateFailed {
                message: format!(
                    "record write for {} failed after {} attempts",
                    session.id, failure.attempts
                ),
                source: Some(failure.error),
            }
        })?;

        if let Some(owner_id) = &session.owner_id {
            let index = &self.index;
            let session_id = session.id.as_str();
            if let Err(failure) = retry_with_policy(
                move || index.add(owner_id, session_id),
                &self.retry,
                "session.index_add",
                SessionError::is_transient,
            )
            .await
            {
                warn!(
                    session_id = %session.id,
                    owner_id = %owner_id,
                    error = %failure.error,
                    "Failed to index session; owner listing will miss it"
                );
            }
        }

        info!(
            session_id = %session.id,
            data_source = %session.data_source_ref,
            ttl_secs,
            "Created session"
        );
        Ok(session)
    }

    /// Fetch a live session
    ///
    /// A miss is [`SessionError::NotFound`] whether the session was closed or
    /// expired. What a hit does to the stored record depends on the
    /// configured [`ReadRefreshPolicy`].
    pub async fn get(&self, session_id: &str) -> SessionResult<Session> {
        validate_session_id(session_id)?;
        let now = self.clock.now();
        let mut session = self.load_live(session_id, now).await?;

        let ttl = match self.settings.read_refresh {
            ReadRefreshPolicy::Untouched => return Ok(session),
            ReadRefreshPolicy::PreserveRemaining => {
                let ttl = self
                    .record_ttl(session_id)
                    .await?
                    .ok_or_else(|| SessionError::not_found(session_id))?;
                if let RecordTtl::Fallback(secs) = ttl {
                    session.expires_at = expiry_after(now, secs)?;
                }
                ttl.secs()
            }
            ReadRefreshPolicy::Sliding => {
                session.expires_at = expiry_after(now, session.ttl_secs)?;
                session.ttl_secs
            }
        };

        session.last_accessed_at = now;
        if !self.rewrite(&session, ttl).await? {
            return Err(SessionError::not_found(session_id));
        }

        debug!(session_id, operation = "get", "Read session");
        Ok(session)
    }

    /// Value stored under `key` in a live session
    pub async fn read(&self, session_id: &str, key: &str) -> SessionResult<Vec<u8>> {
        validate_session_id(session_id)?;
        validate_data_key(key)?;
        self.load_live(session_id, self.clock.now()).await?;

        let data_key = self.namespace.data_key(session_id, key);
        self.store
            .get(&data_key)
            .await
            .map_err(|e| SessionError::store("read", e))?
            .ok_or_else(|| SessionError::DataNotFound {
                session_id: session_id.to_string(),
                key: key.to_string(),
            })
    }

    /// [`read`](Self::read) decoded as JSON
    pub async fn read_json<T: DeserializeOwned>(
        &self,
        session_id: &str,
        key: &str,
    ) -> SessionResult<T> {
        let bytes = self.read(session_id, key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Apply an update to the session record or one of its data entries
    ///
    /// Record updates rewrite the whole record and touch `last_accessed_at`.
    /// Concurrent updates are last-write-wins; data entries are separate keys
    /// and never conflict with each other or with the record.
    pub async fn update(&self, session_id: &str, update: SessionUpdate) -> SessionResult<()> {
        match update {
            SessionUpdate::Data {
                key,
                value,
                ttl_override,
            } => {
                self.write_data(session_id, &key, &value, ttl_override)
                    .await
            }
            SessionUpdate::Status(next) => {
                self.update_record(session_id, "update_status", true, |session| {
                    if !session.status.can_transition_to(next) {
                        return Err(SessionError::InvalidTransition {
                            session_id: session.id.clone(),
                            from: session.status,
                            to: next,
                        });
                    }
                    session.status = next;
                    Ok(())
                })
                .await
            }
            SessionUpdate::MergeMetadata(metadata) => {
                self.update_record(session_id, "merge_metadata", false, |session| {
                    session.metadata.extend(metadata);
                    Ok(())
                })
                .await
            }
            SessionUpdate::RemoveMetadata(keys) => {
                self.update_record(session_id, "remove_metadata", false, |session| {
                    for key in &keys {
                        session.metadata.remove(key);
                    }
                    Ok(())
                })
                .await
            }
        }
    }

    /// Write a data entry under a live session
    ///
    /// The entry inherits the record's remaining TTL unless `ttl_override`
    /// is given. Closed sessions and sessions past `expires_at` are
    /// [`SessionError::NotFound`] even while the store still holds them.
    pub async fn write_data(
        &self,
        session_id: &str,
        key: &str,
        value: &[u8],
        ttl_override: Option<u64>,
    ) -> SessionResult<()> {
        validate_session_id(session_id)?;
        validate_data_key(key)?;
        if let Some(ttl) = ttl_override {
            self.validate_ttl("ttl_override", ttl)?;
        }

        self.load_live(session_id, self.clock.now()).await?;
        let record_ttl = self
            .record_ttl(session_id)
            .await?
            .ok_or_else(|| SessionError::not_found(session_id))?;
        let ttl_secs = ttl_override.unwrap_or(record_ttl.secs());

        let data_key = self.namespace.data_key(session_id, key);
        self.store
            .set(&data_key, value, Some(ttl_secs))
            .await
            .map_err(|e| SessionError::store("write_data", e))?;

        debug!(session_id, key, ttl_secs, "Wrote session data");
        Ok(())
    }

    /// [`write_data`](Self::write_data) with a JSON-encoded value
    pub async fn write_json<T: Serialize + ?Sized>(
        &self,
        session_id: &str,
        key: &str,
        value: &T,
        ttl_override: Option<u64>,
    ) -> SessionResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.write_data(session_id, key, &bytes, ttl_override).await
    }

    /// Add `additional_secs` to the session's remaining TTL
    ///
    /// Data entries keep their own TTLs. A session that is already gone or
    /// closed yields [`SessionError::Expired`] and stays gone. The resulting
    /// TTL may not exceed `max_ttl_secs`.
    pub async fn extend(&self, session_id: &str, additional_secs: u64) -> SessionResult<Session> {
        validate_session_id(session_id)?;
        self.validate_ttl("additional_secs", additional_secs)?;

        let now = self.clock.now();
        let remaining = self
            .record_ttl(session_id)
            .await?
            .ok_or_else(|| SessionError::expired(session_id))?;
        let mut session = match self.load(session_id).await? {
            Some(session) if session.is_live_at(now) => session,
            _ => return Err(SessionError::expired(session_id)),
        };

        let ttl_secs = remaining.secs().saturating_add(additional_secs);
        self.validate_ttl("ttl_secs", ttl_secs)?;
        session.expires_at = expiry_after(now, ttl_secs)?;
        session.last_accessed_at = now;

        if !self.rewrite(&session, ttl_secs).await? {
            return Err(SessionError::expired(session_id));
        }

        info!(session_id, additional_secs, ttl_secs, "Extended session");
        Ok(session)
    }

    /// Close a session, archiving it first when `archive` is set
    ///
    /// An archival failure does not stop the deletion; the session is removed
    /// and the call then returns [`SessionError::ArchivalFailed`].
    pub async fn close(&self, session_id: &str, archive: bool) -> SessionResult<()> {
        validate_session_id(session_id)?;
        let now = self.clock.now();

        let mut session = self
            .load(session_id)
            .await?
            .ok_or_else(|| SessionError::not_found(session_id))?;
        let data_keys = self.data_keys(session_id).await?;

        session.status = SessionStatus::Closed;
        session.last_accessed_at = now;

        let mut archival_error = None;
        if archive {
            let entries = self.collect_entries(session_id, &data_keys).await?;
            if let Err(e) = self.archive.store(&session, &entries).await {
                error!(
                    session_id,
                    operation = "close",
                    error = %e,
                    "Archival failed, deleting session anyway"
                );
                archival_error = Some(match e {
                    SessionError::ArchivalFailed { .. } => e,
                    other => SessionError::ArchivalFailed {
                        session_id: session_id.to_string(),
                        message: other.to_string(),
                    },
                });
            }
        }

        // Record first: once it is gone the data keys are unreachable
        let meta_key = self.namespace.meta_key(session_id);
        self.delete_key(&meta_key, "session.delete_record").await?;

        for key in &data_keys {
            if let Err(e) = self.delete_key(key, "session.delete_data").await {
                warn!(
                    session_id,
                    error = %e,
                    "Failed to delete data entry; it will expire on its own"
                );
            }
        }

        if let Some(owner_id) = &session.owner_id {
            let index = &self.index;
            if let Err(failure) = retry_with_policy(
                move || index.remove(owner_id, session_id),
                &self.retry,
                "session.index_remove",
                SessionError::is_transient,
            )
            .await
            {
                warn!(
                    session_id,
                    owner_id = %owner_id,
                    error = %failure.error,
                    "Failed to remove index entry; listings will prune it"
                );
            }
        }

        info!(
            session_id,
            archived = archive && archival_error.is_none(),
            data_entries = data_keys.len(),
            "Closed session"
        );

        match archival_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Live sessions, optionally only those owned by `owner_id`, oldest first
    ///
    /// Without an owner this scans the whole key space. With one it walks the
    /// owner's index, checks every id against the store, and prunes index
    /// entries whose session no longer exists.
    pub async fn list(&self, owner_id: Option<&str>) -> SessionResult<Vec<Session>> {
        let now = self.clock.now();

        let mut sessions = match owner_id {
            Some(owner_id) => self.list_owned(owner_id, now).await?,
            None => self
                .scan_records()
                .await?
                .into_iter()
                .filter(|session| session.is_live_at(now))
                .collect(),
        };

        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(sessions)
    }

    /// [`list`](Self::list) in summary form
    pub async fn list_summaries(
        &self,
        owner_id: Option<&str>,
    ) -> SessionResult<Vec<SessionSummary>> {
        Ok(self
            .list(owner_id)
            .await?
            .iter()
            .map(SessionSummary::from)
            .collect())
    }

    /// Close every session whose record the store still holds although it is
    /// past `expires_at` or marked closed. Returns how many were reaped.
    ///
    /// Sessions whose archival failed still count: they are deleted.
    pub async fn cleanup(&self) -> SessionResult<usize> {
        let now = self.clock.now();
        let stale: Vec<String> = self
            .scan_records()
            .await?
            .into_iter()
            .filter(|session| !session.is_live_at(now))
            .map(|session| session.id)
            .collect();

        if stale.is_empty() {
            debug!("Cleanup found no stale sessions");
            return Ok(0);
        }

        let candidates = stale.len();
        let archive = self.archive_on_cleanup;
        let manager = self.clone();
        let results = process_concurrently(stale, self.cleanup_concurrency, move |session_id| {
            let manager = manager.clone();
            async move {
                let outcome = manager.close(&session_id, archive).await;
                (session_id, outcome)
            }
        })
        .await;

        let mut reaped = 0;
        for result in results {
            match result {
                Ok((_, Ok(()))) | Ok((_, Err(SessionError::ArchivalFailed { .. }))) => {
                    reaped += 1
                }
                // Evicted by the store in the meantime
                Ok((_, Err(SessionError::NotFound { .. }))) => {}
                Ok((session_id, Err(e))) => warn!(
                    session_id = %session_id,
                    error = %e,
                    "Cleanup failed to close session"
                ),
                Err(e) => warn!(error = %e, "Cleanup task failed"),
            }
        }

        info!(reaped, candidates, "Cleanup pass complete");
        Ok(reaped)
    }

    fn validate_ttl(&self, field: &str, ttl_secs: u64) -> SessionResult<()> {
        if ttl_secs == 0 {
            return Err(SessionError::validation(field, "must be greater than 0"));
        }
        if ttl_secs > self.settings.max_ttl_secs {
            return Err(SessionError::validation(
                field,
                format!(
                    "{} exceeds the maximum of {} seconds",
                    ttl_secs, self.settings.max_ttl_secs
                ),
            ));
        }
        Ok(())
    }

    async fn load(&self, session_id: &str) -> SessionResult<Option<Session>> {
        let key = self.namespace.meta_key(session_id);
        let bytes = self
            .store
            .get(&key)
            .await
            .map_err(|e| SessionError::store("get", e))?;

        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load a record, treating a closed one or one past `expires_at` as missing
    async fn load_live(&self, session_id: &str, now: DateTime<Utc>) -> SessionResult<Session> {
        match self.load(session_id).await? {
            Some(session) if session.is_live_at(now) => Ok(session),
            _ => Err(SessionError::not_found(session_id)),
        }
    }

    async fn record_ttl(&self, session_id: &str) -> SessionResult<Option<RecordTtl>> {
        let key = self.namespace.meta_key(session_id);
        let ttl = self
            .store
            .ttl_remaining(&key)
            .await
            .map_err(|e| SessionError::store("ttl_remaining", e))?;

        Ok(ttl.map(|ttl| match ttl {
            Ttl::Remaining(secs) => RecordTtl::Remaining(secs),
            Ttl::Persistent => {
                warn!(
                    session_id,
                    fallback_ttl_secs = self.settings.fallback_ttl_secs,
                    "Session record has no expiry, applying fallback TTL"
                );
                RecordTtl::Fallback(self.settings.fallback_ttl_secs)
            }
        }))
    }

    /// Overwrite an existing record. Returns false if it no longer exists.
    async fn rewrite(&self, session: &Session, ttl_secs: u64) -> SessionResult<bool> {
        let bytes = serde_json::to_vec(session)?;
        let key = self.namespace.meta_key(&session.id);
        self.store
            .replace(&key, &bytes, Some(ttl_secs))
            .await
            .map_err(|e| SessionError::store("replace", e))
    }

    async fn update_record<F>(
        &self,
        session_id: &str,
        operation: &str,
        allow_closed: bool,
        apply: F,
    ) -> SessionResult<()>
    where
        F: FnOnce(&mut Session) -> SessionResult<()>,
    {
        validate_session_id(session_id)?;
        let now = self.clock.now();
        // Status changes still see closed records so they fail as transitions
        let mut session = match self.load(session_id).await? {
            Some(session) if allow_closed && !session.is_expired_at(now) => session,
            Some(session) if session.is_live_at(now) => session,
            _ => return Err(SessionError::not_found(session_id)),
        };
        let ttl = self
            .record_ttl(session_id)
            .await?
            .ok_or_else(|| SessionError::not_found(session_id))?;

        apply(&mut session)?;
        session.last_accessed_at = now;
        if let RecordTtl::Fallback(secs) = ttl {
            session.expires_at = expiry_after(now, secs)?;
        }

        if !self.rewrite(&session, ttl.secs()).await? {
            return Err(SessionError::not_found(session_id));
        }

        debug!(session_id, operation, "Updated session record");
        Ok(())
    }

    /// Delete a key, retrying transient failures; deletes are idempotent
    async fn delete_key(&self, key: &str, operation: &str) -> SessionResult<()> {
        let store = self.store.as_ref();
        retry_with_policy(
            move || store.delete(key),
            &self.retry,
            operation,
            StoreError::is_transient,
        )
        .await
        .map(|_| ())
        .map_err(|failure| SessionError::store(operation, failure.error))
    }

    async fn data_keys(&self, session_id: &str) -> SessionResult<Vec<String>> {
        let prefix = self.namespace.data_prefix(session_id);
        scan_keys(self.store.as_ref(), &prefix, self.scan_page_size)
            .try_collect()
            .await
            .map_err(|e| SessionError::store("scan_data", e))
    }

    async fn collect_entries(
        &self,
        session_id: &str,
        data_keys: &[String],
    ) -> SessionResult<Vec<DataEntry>> {
        let mut entries = Vec::with_capacity(data_keys.len());
        for data_key in data_keys {
            let Some(key) = self.namespace.parse_data_key(session_id, data_key) else {
                continue;
            };
            let value = self
                .store
                .get(data_key)
                .await
                .map_err(|e| SessionError::store("read_data", e))?;
            // Entries can expire between the scan and the read
            if let Some(value) = value {
                entries.push(DataEntry::new(key, value));
            }
        }
        Ok(entries)
    }

    async fn list_owned(&self, owner_id: &str, now: DateTime<Utc>) -> SessionResult<Vec<Session>> {
        validate_owner_id(owner_id)?;

        let mut sessions = Vec::new();
        for session_id in self.index.members(owner_id).await? {
            if validate_session_id(&session_id).is_err() {
                continue;
            }

            match self.load(&session_id).await {
                Ok(Some(session)) => {
                    if session.owner_id.as_deref() == Some(owner_id) && session.is_live_at(now) {
                        sessions.push(session);
                    }
                }
                Ok(None) => match self.index.remove(owner_id, &session_id).await {
                    Ok(_) => debug!(owner_id, session_id = %session_id, "Pruned stale index entry"),
                    Err(e) => warn!(
                        owner_id,
                        session_id = %session_id,
                        error = %e,
                        "Failed to prune stale index entry"
                    ),
                },
                Err(SessionError::Serialization(e)) => warn!(
                    session_id = %session_id,
                    error = %e,
                    "Skipping unreadable session record"
                ),
                Err(e) => return Err(e),
            }
        }

        Ok(sessions)
    }

    /// Every session record in the store, including ones past `expires_at`
    async fn scan_records(&self) -> SessionResult<Vec<Session>> {
        let prefix = self.namespace.root_prefix();
        let mut keys = scan_keys(self.store.as_ref(), &prefix, self.scan_page_size);

        let mut sessions = Vec::new();
        while let Some(key) = keys
            .try_next()
            .await
            .map_err(|e| SessionError::store("scan", e))?
        {
            let Some(session_id) = self.namespace.parse_meta_key(&key) else {
                continue;
            };

            match self.load(session_id).await {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(SessionError::Serialization(e)) => {
                    warn!(session_id, error = %e, "Skipping unreadable session record")
                }
                Err(e) => return Err(e),
            }
        }

        Ok(sessions)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("settings", &self.settings)
            .field("retry", &self.retry)
            .field("scan_page_size", &self.scan_page_size)
            .field("archive_on_cleanup", &self.archive_on_cleanup)
            .field("cleanup_concurrency", &self.cleanup_concurrency)
            .finish_non_exhaustive()
    }
}
