//! Archival sinks
//!
//! An archive is a durable, TTL-less copy of a session's final record and
//! data, written at close time. Archiving the same id twice overwrites.

use crate::error::{SessionError, SessionResult};
use crate::namespace::{validate_session_id, SessionDataNamespace};
use crate::types::{ArchivedSession, DataEntry, Session};
use async_trait::async_trait;
use ephemera_core::{system_clock, SharedClock};
use ephemera_store::{SessionStore, SharedStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Destination for closed sessions
#[async_trait]
pub trait ArchivalSink: Send + Sync {
    /// Persist `session` and its data entries, replacing any earlier copy
    async fn store(&self, session: &Session, entries: &[DataEntry]) -> SessionResult<()>;

    /// Previously archived copy, if any
    async fn load(&self, session_id: &str) -> SessionResult<Option<ArchivedSession>>;
}

pub type SharedArchivalSink = Arc<dyn ArchivalSink>;

/// Archives into the session store itself under `session:archive:{id}`
pub struct StoreArchivalSink {
    store: SharedStore,
    namespace: SessionDataNamespace,
    clock: SharedClock,
}

impl StoreArchivalSink {
    pub fn new(store: SharedStore) -> Self {
        Self::with_clock(store, system_clock())
    }

    pub fn with_clock(store: SharedStore, clock: SharedClock) -> Self {
        Self {
            store,
            namespace: SessionDataNamespace::new(),
            clock,
        }
    }
}

#[async_trait]
impl ArchivalSink for StoreArchivalSink {
    async fn store(&self, session: &Session, entries: &[DataEntry]) -> SessionResult<()> {
        let archived = ArchivedSession {
            session: session.clone(),
            data: entries.to_vec(),
            archived_at: self.clock.now(),
        };
        let bytes =
            serde_json::to_vec(&archived).map_err(|e| archival_failed(&session.id, e))?;

        let key = self.namespace.archive_key(&session.id);
        self.store
            .set(&key, &bytes, None)
            .await
            .map_err(|e| archival_failed(&session.id, e))?;

        debug!(
            session_id = %session.id,
            entries = entries.len(),
            "Archived session to store"
        );
        Ok(())
    }

    async fn load(&self, session_id: &str) -> SessionResult<Option<ArchivedSession>> {
        validate_session_id(session_id)?;

        let key = self.namespace.archive_key(session_id);
        let bytes = self
            .store
            .get(&key)
            .await
            .map_err(|e| SessionError::store("archive_load", e))?;

        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// Archives as `<dir>/<id>.json` files
pub struct DirectoryArchivalSink {
    directory: PathBuf,
    clock: SharedClock,
}

impl DirectoryArchivalSink {
    /// Create the sink, creating `directory` if needed
    pub fn new<P: AsRef<Path>>(directory: P) -> SessionResult<Self> {
        Self::with_clock(directory, system_clock())
    }

    pub fn with_clock<P: AsRef<Path>>(directory: P, clock: SharedClock) -> SessionResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory).map_err(ephemera_core::EphemeraError::from)?;

        info!("Session archive directory: {}", directory.display());
        Ok(Self { directory, clock })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn archive_path(&self, session_id: &str) -> PathBuf {
        self.directory.join(format!("{}.json", session_id))
    }
}

#[async_trait]
impl ArchivalSink for DirectoryArchivalSink {
    async fn store(&self, session: &Session, entries: &[DataEntry]) -> SessionResult<()> {
        let archived = ArchivedSession {
            session: session.clone(),
            data: entries.to_vec(),
            archived_at: self.clock.now(),
        };
        let json =
            serde_json::to_string_pretty(&archived).map_err(|e| archival_failed(&session.id, e))?;

        // Write then rename so a reader never sees a partial file
        let target = self.archive_path(&session.id);
        let staging = self
            .directory
            .join(format!("{}.{}.json.tmp", session.id, Uuid::new_v4().simple()));

        tokio::fs::write(&staging, json)
            .await
            .map_err(|e| archival_failed(&session.id, e))?;
        if let Err(e) = tokio::fs::rename(&staging, &target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(archival_failed(&session.id, e));
        }

        debug!(
            session_id = %session.id,
            entries = entries.len(),
            "Archived session to {}",
            target.display()
        );
        Ok(())
    }

    async fn load(&self, session_id: &str) -> SessionResult<Option<ArchivedSession>> {
        validate_session_id(session_id)?;

        let path = self.archive_path(session_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ephemera_core::EphemeraError::from(e).into()),
        }
    }
}

fn archival_failed<E: std::fmt::Display>(session_id: &str, e: E) -> SessionError {
    SessionError::ArchivalFailed {
        session_id: session_id.to_string(),
        message: e.to_string(),
    }
}
