//! Ephemera Sessions - short-lived, isolated sessions over a TTL store
//!
//! - [`SessionManager`]: create, read, update, extend, close, list, cleanup
//! - [`SessionDataNamespace`]: the store key layout
//! - [`MembershipIndex`]: owner to session-id sets
//! - [`ArchivalSink`]: durable copies of closed sessions
//! - [`RecoveryCoordinator`]: bounded retries across transient outages
//! - [`CleanupScheduler`]: periodic reaping of skewed sessions

pub mod archive;
pub mod error;
pub mod index;
pub mod manager;
pub mod namespace;
pub mod recovery;
pub mod scheduler;
pub mod types;

pub use archive::{ArchivalSink, DirectoryArchivalSink, SharedArchivalSink, StoreArchivalSink};
pub use error::{SessionError, SessionResult};
pub use index::MembershipIndex;
pub use manager::SessionManager;
pub use namespace::SessionDataNamespace;
pub use recovery::RecoveryCoordinator;
pub use scheduler::CleanupScheduler;
pub use types::{
    AccessLevel, ArchivedSession, CreateSessionRequest, DataEntry, Metadata, MetadataValue,
    Session, SessionStatus, SessionSummary, SessionUpdate,
};
