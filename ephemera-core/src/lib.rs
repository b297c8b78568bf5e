//! Ephemera Core - Shared infrastructure for the ephemera session subsystem
//!
//! Error types, configuration, logging, the injectable clock, and the async
//! retry/timeout helpers used by the store and session layers.

pub mod async_utils;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use async_utils::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use logging::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio;
pub use tracing;
