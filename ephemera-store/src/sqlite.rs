//! SQLite-backed TTL store
//!
//! Expiry timestamps are stored as unix milliseconds from the injected clock.
//! Expired rows are filtered out of every read and removed by
//! [`SqliteStore::purge_expired`] or the sweeper task.

use crate::error::{StoreError, StoreResult};
use crate::traits::{ScanPage, SessionStore, Ttl};
use async_trait::async_trait;
use ephemera_core::{system_clock, SharedClock};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// TTLs are clamped to roughly a century
const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// [`SessionStore`] on a SQLite connection pool
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    clock: SharedClock,
}

impl SqliteStore {
    /// Wrap an existing pool. Call [`SqliteStore::create_tables`] before use.
    pub fn new(pool: SqlitePool, clock: SharedClock) -> Self {
        Self { pool, clock }
    }

    /// Connect to `database_url` and create the schema
    ///
    /// `acquire_timeout_ms` bounds how long a command waits for a pooled
    /// connection.
    pub async fn connect(
        database_url: &str,
        pool_size: u32,
        acquire_timeout_ms: u64,
        clock: SharedClock,
    ) -> StoreResult<Self> {
        info!("Connecting to SQLite store: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Config {
                message: format!("Invalid SQLite url {}: {}", database_url, e),
            })?
            .create_if_missing(true);

        // Every in-memory connection is its own database, so keep exactly one alive
        let in_memory = database_url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_millis(acquire_timeout_ms));
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(pool_size.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self::new(pool, clock);
        store.create_tables().await?;
        Ok(store)
    }

    /// Connect using the system clock
    pub async fn connect_default(database_url: &str) -> StoreResult<Self> {
        Self::connect(database_url, 4, 2000, system_clock()).await
    }

    /// Create the key-value and set-member tables if they do not exist
    pub async fn create_tables(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                expires_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_tables", e))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_kv_entries_expires_at ON kv_entries (expires_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_tables", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_set_members (
                set_key TEXT NOT NULL,
                member TEXT NOT NULL,
                PRIMARY KEY (set_key, member)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_tables", e))?;

        debug!("SQLite store tables ready");
        Ok(())
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn expiry_millis(&self, ttl_secs: Option<u64>) -> Option<i64> {
        ttl_secs.map(|secs| self.now_millis() + (secs.min(MAX_TTL_SECS) as i64) * 1000)
    }

    /// Delete expired rows. Returns how many were removed.
    pub async fn purge_expired(&self) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= ?")
                .bind(self.now_millis())
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("purge_expired", e))?;
        Ok(result.rows_affected())
    }

    /// Start a background task purging expired rows every `period`
    pub fn spawn_sweeper(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                if store.pool.is_closed() {
                    debug!("SQLite pool closed, stopping sweeper");
                    break;
                }

                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "SQLite store sweep removed expired keys"),
                    Err(e) => warn!(error = %e, "SQLite store sweep failed"),
                }
            }
        })
    }

    /// Close the underlying pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn set(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(self.expiry_millis(ttl_secs))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("set", e))?;

        Ok(())
    }

    async fn replace(&self, key: &str, value: &[u8], ttl_secs: Option<u64>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE kv_entries SET value = ?, expires_at = ?
            WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(value)
        .bind(self.expiry_millis(ttl_secs))
        .bind(key)
        .bind(self.now_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("replace", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let row = sqlx::query(
            "SELECT value FROM kv_entries WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(self.now_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        row.map(|row| row.try_get::<Vec<u8>, _>("value"))
            .transpose()
            .map_err(|e| map_sqlx_error("get", e))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = self.now_millis();

        let live = sqlx::query(
            "DELETE FROM kv_entries WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete", e))?
        .rows_affected();

        // Drop any expired leftover under the same key
        sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        let members = sqlx::query("DELETE FROM kv_set_members WHERE set_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?
            .rows_affected();

        Ok(live > 0 || members > 0)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE kv_entries SET expires_at = ?
            WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(self.expiry_millis(Some(ttl_secs)))
        .bind(key)
        .bind(self.now_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("expire", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn ttl_remaining(&self, key: &str) -> StoreResult<Option<Ttl>> {
        let now = self.now_millis();
        let row = sqlx::query(
            "SELECT expires_at FROM kv_entries WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("ttl_remaining", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: Option<i64> = row
            .try_get("expires_at")
            .map_err(|e| map_sqlx_error("ttl_remaining", e))?;

        Ok(Some(match expires_at {
            None => Ttl::Persistent,
            Some(expires_at) => {
                let millis = (expires_at - now).max(1) as u64;
                Ttl::Remaining(millis.div_ceil(1000))
            }
        }))
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO kv_set_members (set_key, member) VALUES (?, ?)")
                .bind(key)
                .bind(member)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("set_add", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM kv_set_members WHERE set_key = ? AND member = ?")
            .bind(key)
            .bind(member)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_remove", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let rows =
            sqlx::query("SELECT member FROM kv_set_members WHERE set_key = ? ORDER BY member")
                .bind(key)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("set_members", e))?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("member"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("set_members", e))
    }

    async fn scan_page(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        count: usize,
    ) -> StoreResult<ScanPage> {
        let count = count.max(1);

        let rows = sqlx::query(
            r#"
            SELECT key FROM (
                SELECT key FROM kv_entries WHERE expires_at IS NULL OR expires_at > ?
                UNION
                SELECT set_key AS key FROM kv_set_members
            )
            WHERE substr(key, 1, length(?)) = ? AND key > ?
            ORDER BY key
            LIMIT ?
            "#,
        )
        .bind(self.now_millis())
        .bind(prefix)
        .bind(prefix)
        .bind(cursor.unwrap_or(""))
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("scan_page", e))?;

        let keys = rows
            .iter()
            .map(|row| row.try_get::<String, _>("key"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("scan_page", e))?;

        let next_cursor = if keys.len() == count {
            keys.last().cloned()
        } else {
            None
        };

        Ok(ScanPage { keys, next_cursor })
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }
}

/// Classify a sqlx failure as transient or permanent
fn map_sqlx_error(operation: &str, e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_) => StoreError::Unavailable {
            operation: operation.to_string(),
            message: e.to_string(),
        },
        other => StoreError::Backend {
            operation: operation.to_string(),
            message: other.to_string(),
            source: Some(Box::new(other)),
        },
    }
}
