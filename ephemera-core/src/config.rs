//! Configuration management
//!
//! Layered loading: built-in defaults, then an optional TOML file, then
//! `EPHEMERA__SECTION__FIELD` environment variables.

use crate::async_utils::RetryConfig;
use crate::error::{EphemeraError, EphemeraResult, ErrorContext};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "EPHEMERA";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EphemeraConfig {
    pub store: StoreConfig,
    pub session: SessionSettings,
    pub retry: RetryConfig,
    pub recovery: RecoveryConfig,
    pub archive: ArchiveConfig,
    pub cleanup: CleanupConfig,
    pub logging: LoggingConfig,
}

/// Backing key-value store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `memory` or `sqlite:<path>` / `sqlite::memory:`
    pub url: String,
    /// Maximum pooled connections
    pub pool_size: u32,
    /// Per-command timeout in milliseconds
    pub command_timeout_ms: u64,
    /// Interval for purging expired keys in backends that need it (0 disables)
    pub sweep_interval_secs: u64,
    /// Page size used when scanning key prefixes
    pub scan_page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "memory".to_string(),
            pool_size: 16,
            command_timeout_ms: 2000,
            sweep_interval_secs: 60,
            scan_page_size: 100,
        }
    }
}

/// What a successful `get` does to the session record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadRefreshPolicy {
    /// Touch `last_accessed_at` and keep the remaining TTL
    PreserveRemaining,
    /// Leave the stored record alone
    Untouched,
    /// Touch `last_accessed_at` and reset the TTL to the session's original TTL
    Sliding,
}

/// Session lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// TTL used when the caller does not pass one
    pub default_ttl_secs: u64,
    /// Upper bound on a requested TTL
    pub max_ttl_secs: u64,
    /// TTL applied when the store reports no usable remaining TTL on a rewrite
    pub fallback_ttl_secs: u64,
    pub read_refresh: ReadRefreshPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_ttl_secs: 3600,
            max_ttl_secs: 86_400,
            fallback_ttl_secs: 300,
            read_refresh: ReadRefreshPolicy::PreserveRemaining,
        }
    }
}

/// Recovery coordinator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Seconds added to a session after a recovered read
    pub grace_period_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveBackend {
    /// TTL-less keys in the session store itself
    Store,
    /// JSON files in a local directory
    Directory,
}

/// Archival settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Archive on cleanup-driven closes
    pub enabled: bool,
    pub backend: ArchiveBackend,
    /// Target directory for the directory backend
    pub directory: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        let directory = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ephemera")
            .join("archive");
        Self {
            enabled: true,
            backend: ArchiveBackend::Store,
            directory,
        }
    }
}

/// Periodic cleanup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub interval_secs: u64,
    /// Sessions closed in parallel per pass
    pub max_concurrent: usize,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            max_concurrent: 8,
        }
    }
}

impl EphemeraConfig {
    /// Load configuration from defaults, an optional TOML file, and the environment
    pub fn load(path: Option<&Path>) -> EphemeraResult<Self> {
        let defaults = config::Config::try_from(&EphemeraConfig::default())
            .map_err(|e| config_failure("Failed to seed default configuration", "defaults", e))?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: EphemeraConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| config_failure("Failed to load configuration", "build", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file only
    pub fn from_file<P: AsRef<Path>>(path: P) -> EphemeraResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EphemeraError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: EphemeraConfig = toml::from_str(&content).map_err(|e| EphemeraError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> EphemeraResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| EphemeraError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| EphemeraError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> EphemeraResult<()> {
        if self.store.command_timeout_ms == 0 {
            return Err(invalid("store.command_timeout_ms must be greater than 0"));
        }
        if self.store.pool_size == 0 {
            return Err(invalid("store.pool_size must be greater than 0"));
        }
        if self.store.scan_page_size == 0 {
            return Err(invalid("store.scan_page_size must be greater than 0"));
        }
        if self.session.default_ttl_secs == 0 || self.session.max_ttl_secs == 0 {
            return Err(invalid("session TTLs must be greater than 0"));
        }
        if self.session.default_ttl_secs > self.session.max_ttl_secs {
            return Err(invalid(
                "session.default_ttl_secs must not exceed session.max_ttl_secs",
            ));
        }
        if self.session.fallback_ttl_secs == 0 {
            return Err(invalid("session.fallback_ttl_secs must be greater than 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be greater than 0"));
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(invalid(
                "retry.max_delay_ms must be at least retry.initial_delay_ms",
            ));
        }
        if self.cleanup.interval_secs == 0 {
            return Err(invalid("cleanup.interval_secs must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> EphemeraError {
    EphemeraError::Config {
        message: message.to_string(),
        source: None,
        context: ErrorContext::new("config")
            .with_operation("validate")
            .with_suggestion("Adjust the value in the config file or environment"),
    }
}

fn config_failure(message: &str, operation: &str, e: config::ConfigError) -> EphemeraError {
    EphemeraError::Config {
        message: format!("{}: {}", message, e),
        source: Some(Box::new(e)),
        context: ErrorContext::new("config")
            .with_operation(operation)
            .with_suggestion("Check the config file and EPHEMERA__* environment variables"),
    }
}
