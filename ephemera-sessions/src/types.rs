//! Session types and structures

use crate::error::{SessionError, SessionResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a session
///
/// `active` is the only non-terminal state. `expired` is reached by the
/// store's TTL alone, `closed` by an explicit close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Expired,
    Closed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }

    /// Whether a caller may move a session from `self` to `next`
    ///
    /// Re-asserting `active` on an active session is accepted as a no-op.
    /// `expired` is never set by a caller.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Active, SessionStatus::Active)
                | (SessionStatus::Active, SessionStatus::Closed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Expired => "expired",
            SessionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access level granted by the caller's authorization layer; carried, not enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Write,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(AccessLevel::Read),
            "write" => Ok(AccessLevel::Write),
            other => Err(SessionError::validation(
                "access_level",
                format!("expected read or write, got {}", other),
            )),
        }
    }
}

/// Structured metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Integer(value as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl<T: Into<MetadataValue>> From<Vec<T>> for MetadataValue {
    fn from(values: Vec<T>) -> Self {
        MetadataValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, MetadataValue>> for MetadataValue {
    fn from(map: BTreeMap<String, MetadataValue>) -> Self {
        MetadataValue::Map(map)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// The session record stored under its metadata key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub data_source_ref: String,
    pub access_level: AccessLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// TTL requested at creation
    pub ttl_secs: u64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Session {
    pub(crate) fn new(
        id: String,
        request: CreateSessionRequest,
        ttl_secs: u64,
        now: DateTime<Utc>,
    ) -> SessionResult<Self> {
        Ok(Self {
            expires_at: expiry_after(now, ttl_secs)?,
            id,
            data_source_ref: request.data_source_ref,
            access_level: request.access_level,
            owner_id: request.owner_id,
            status: SessionStatus::Active,
            created_at: now,
            last_accessed_at: now,
            ttl_secs,
            metadata: request.metadata,
        })
    }

    /// Whether `expires_at` has passed at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Active and not past `expires_at`
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && !self.is_expired_at(now)
    }

    /// Whole seconds left before `expires_at`, never negative
    pub fn remaining_secs_at(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from(self)
    }
}

/// `now + ttl_secs`, rejecting TTLs outside the representable range
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl_secs: u64) -> SessionResult<DateTime<Utc>> {
    i64::try_from(ttl_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            SessionError::validation("ttl_secs", format!("{} seconds is out of range", ttl_secs))
        })
}

/// Listing view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub data_source_ref: String,
    pub access_level: AccessLevel,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            created_at: session.created_at,
            expires_at: session.expires_at,
            status: session.status,
            data_source_ref: session.data_source_ref.clone(),
            access_level: session.access_level,
        }
    }
}

/// Parameters for [`SessionManager::create`](crate::SessionManager::create)
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub data_source_ref: String,
    pub access_level: AccessLevel,
    /// Falls back to the configured default TTL
    pub ttl_secs: Option<u64>,
    pub owner_id: Option<String>,
    pub metadata: Metadata,
}

impl CreateSessionRequest {
    pub fn new<S: Into<String>>(data_source_ref: S, access_level: AccessLevel) -> Self {
        Self {
            data_source_ref: data_source_ref.into(),
            access_level,
            ttl_secs: None,
            owner_id: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }

    pub fn with_owner<S: Into<String>>(mut self, owner_id: S) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_metadata<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<MetadataValue>,
    {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A change applied by [`SessionManager::update`](crate::SessionManager::update)
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// Rewrite the record's status, subject to the transition rules
    Status(SessionStatus),
    /// Insert or overwrite metadata entries
    MergeMetadata(Metadata),
    RemoveMetadata(Vec<String>),
    /// Write a data entry; its TTL follows the session unless overridden
    Data {
        key: String,
        value: Vec<u8>,
        ttl_override: Option<u64>,
    },
}

/// One data entry captured at close time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    pub key: String,
    #[serde(with = "blob")]
    pub value: Vec<u8>,
}

impl DataEntry {
    pub fn new<K: Into<String>>(key: K, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Decode the value as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> SessionResult<T> {
        Ok(serde_json::from_slice(&self.value)?)
    }
}

/// Durable copy of a closed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedSession {
    pub session: Session,
    pub data: Vec<DataEntry>,
    pub archived_at: DateTime<Utc>,
}

impl ArchivedSession {
    pub fn entry(&self, key: &str) -> Option<&DataEntry> {
        self.data.iter().find(|entry| entry.key == key)
    }
}

/// Opaque bytes as base64 text inside JSON documents
mod blob {
    use super::{Engine, BASE64};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
