//! Store key layout
//!
//! ```text
//! session:{id}                 session record
//! session:{id}:data:{key}      session-scoped data entry
//! session:index:{owner_id}     set of session ids per owner
//! session:archive:{id}         archived copy, no TTL
//! ```
//!
//! Session ids may not contain `:`, so a data key can never collide with
//! another session's keys and a record key is recognisable by shape alone.

use crate::error::{SessionError, SessionResult};

const ROOT: &str = "session";
const DATA_SEGMENT: &str = "data";
const INDEX_SEGMENT: &str = "index";
const ARCHIVE_SEGMENT: &str = "archive";

/// Maps session ids and logical keys onto store keys
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionDataNamespace;

impl SessionDataNamespace {
    pub fn new() -> Self {
        Self
    }

    pub fn meta_key(&self, session_id: &str) -> String {
        format!("{}:{}", ROOT, session_id)
    }

    pub fn data_key(&self, session_id: &str, key: &str) -> String {
        format!("{}{}", self.data_prefix(session_id), key)
    }

    /// Common prefix of every data key under `session_id`
    pub fn data_prefix(&self, session_id: &str) -> String {
        format!("{}:{}:{}:", ROOT, session_id, DATA_SEGMENT)
    }

    pub fn index_key(&self, owner_id: &str) -> String {
        format!("{}:{}:{}", ROOT, INDEX_SEGMENT, owner_id)
    }

    pub fn archive_key(&self, session_id: &str) -> String {
        format!("{}:{}:{}", ROOT, ARCHIVE_SEGMENT, session_id)
    }

    /// Prefix shared by every key this namespace produces
    pub fn root_prefix(&self) -> String {
        format!("{}:", ROOT)
    }

    /// Session id of a record key, or `None` for data, index and archive keys
    pub fn parse_meta_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        let id = key.strip_prefix(ROOT)?.strip_prefix(':')?;
        if id.is_empty() || id.contains(':') {
            None
        } else {
            Some(id)
        }
    }

    /// Logical key of a data key belonging to `session_id`
    pub fn parse_data_key<'a>(&self, session_id: &str, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&self.data_prefix(session_id))
    }
}

/// Reject ids that would escape their slot in the key layout
pub fn validate_session_id(session_id: &str) -> SessionResult<()> {
    if session_id.is_empty() {
        return Err(SessionError::validation("session_id", "must not be empty"));
    }
    if session_id.contains(':') {
        return Err(SessionError::validation(
            "session_id",
            "must not contain ':'",
        ));
    }
    if session_id
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == '\\')
    {
        return Err(SessionError::validation(
            "session_id",
            "must not contain whitespace or path separators",
        ));
    }
    Ok(())
}

pub fn validate_data_key(key: &str) -> SessionResult<()> {
    if key.is_empty() {
        return Err(SessionError::validation("key", "must not be empty"));
    }
    Ok(())
}

pub fn validate_owner_id(owner_id: &str) -> SessionResult<()> {
    if owner_id.trim().is_empty() {
        return Err(SessionError::validation("owner_id", "must not be blank"));
    }
    Ok(())
}
