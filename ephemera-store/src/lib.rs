//! Ephemera Store - TTL key-value store adapters
//!
//! A thin, single-key-atomic contract over an external TTL store plus the
//! backends ephemera ships with:
//!
//! - [`MemoryStore`]: in-process store driven by an injectable clock
//! - [`SqliteStore`]: durable store on SQLite (feature `sqlite`)
//! - [`TimedStore`]: decorator applying a command-level timeout to any backend

pub mod error;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod timed;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use timed::TimedStore;
pub use traits::{scan_keys, scan_keys_from, ScanPage, SessionStore, SharedStore, Ttl};

use ephemera_core::{SharedClock, StoreConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Build the store described by `config`, wrapped with the command timeout
pub async fn open(config: &StoreConfig, clock: SharedClock) -> StoreResult<SharedStore> {
    let timeout_ms = config.command_timeout_ms;

    if config.url == "memory" {
        let store = Arc::new(MemoryStore::with_clock(clock));
        if config.sweep_interval_secs > 0 {
            store.spawn_sweeper(Duration::from_secs(config.sweep_interval_secs));
        }
        info!(backend = "memory", timeout_ms, "Opened session store");
        return Ok(Arc::new(TimedStore::new(store, timeout_ms)));
    }

    if config.url.starts_with("sqlite:") {
        #[cfg(feature = "sqlite")]
        {
            let store = Arc::new(
                SqliteStore::connect(&config.url, config.pool_size, timeout_ms, clock).await?,
            );
            if config.sweep_interval_secs > 0 {
                store.spawn_sweeper(Duration::from_secs(config.sweep_interval_secs));
            }
            info!(backend = "sqlite", timeout_ms, "Opened session store");
            return Ok(Arc::new(TimedStore::new(store, timeout_ms)));
        }
        #[cfg(not(feature = "sqlite"))]
        return Err(StoreError::Config {
            message: "SQLite support is disabled; rebuild with the `sqlite` feature".to_string(),
        });
    }

    Err(StoreError::Config {
        message: format!("Unsupported store url: {}", config.url),
    })
}
