//! Owner membership index
//!
//! One store set per owner holding the ids of the sessions it created. The
//! index is maintained best-effort beside the session records and may hold
//! ids whose sessions are gone; readers verify every id against the store.

use crate::error::{SessionError, SessionResult};
use crate::namespace::SessionDataNamespace;
use ephemera_store::{SessionStore, SharedStore};
use tracing::debug;

#[derive(Clone)]
pub struct MembershipIndex {
    store: SharedStore,
    namespace: SessionDataNamespace,
}

impl MembershipIndex {
    pub fn new(store: SharedStore, namespace: SessionDataNamespace) -> Self {
        Self { store, namespace }
    }

    pub async fn add(&self, owner_id: &str, session_id: &str) -> SessionResult<()> {
        let key = self.namespace.index_key(owner_id);
        self.store
            .set_add(&key, session_id)
            .await
            .map_err(|e| SessionError::store("index_add", e))?;

        debug!(owner_id, session_id, "Indexed session");
        Ok(())
    }

    /// Returns whether the id was present
    pub async fn remove(&self, owner_id: &str, session_id: &str) -> SessionResult<bool> {
        let key = self.namespace.index_key(owner_id);
        self.store
            .set_remove(&key, session_id)
            .await
            .map_err(|e| SessionError::store("index_remove", e))
    }

    /// Ids recorded for `owner_id`, possibly stale
    pub async fn members(&self, owner_id: &str) -> SessionResult<Vec<String>> {
        let key = self.namespace.index_key(owner_id);
        self.store
            .set_members(&key)
            .await
            .map_err(|e| SessionError::store("index_members", e))
    }
}

impl std::fmt::Debug for MembershipIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipIndex")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
