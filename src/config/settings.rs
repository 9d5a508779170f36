//! Settings structs and loading logic.
//!
//! All settings have sensible defaults and can be overridden via
//! environment variables or configuration files.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::sync::NetworkConfig;
use crate::types::filter::LogFilterSpec;

/// Root configuration structure (§6 "Configuration (consumed)").
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// EVM network connection and sync parameters.
    pub network: NetworkSettings,
    /// The log filters this instance tracks (§6 `logFilters[]`).
    pub log_filters: Vec<LogFilterSpec>,
    /// Database configuration.
    pub database: DatabaseSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// Files are loaded in this order (later overrides earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (if exists)
    /// 3. Environment variables with `SYNC_` prefix
    ///
    /// # Arguments
    /// * `environment` - Environment name (e.g., "development", "production")
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration is invalid or cannot be loaded.
    pub fn load(environment: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("network.http_url", "http://localhost:8545")?
            .set_default("network.ws_url", "ws://localhost:8546")?
            .set_default("network.chain_id", 1)?
            .set_default("network.polling_interval_ms", 1000)?
            .set_default("network.finality_block_count", 64)?
            .set_default("log_filters", Vec::<String>::new())?
            .set_default("database.url", "postgres://localhost/evm_realtime_sync")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout_ms", 5000)?
            .set_default("database.idle_timeout_ms", 600_000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("logging.file_path", Option::<String>::None)?
            // Load default configuration file
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            // Load environment-specific file
            .add_source(File::with_name(&format!("{config_dir}/{environment}")).required(false))
            // Override with environment variables (SYNC_ prefix)
            .add_source(
                Environment::with_prefix("SYNC")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load settings from a specific file path.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Validate settings and return any validation errors.
    ///
    /// # Errors
    /// Returns a list of validation error messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.network.http_url.is_empty() {
            errors.push("network.http_url cannot be empty".into());
        }
        if self.network.chain_id == 0 {
            errors.push("network.chain_id must be non-zero".into());
        }
        if self.network.polling_interval_ms == 0 {
            errors.push("network.polling_interval_ms must be non-zero".into());
        }

        if self.database.url.is_empty() {
            errors.push("database.url cannot be empty".into());
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be non-zero".into());
        }
        if self.database.min_connections > self.database.max_connections {
            errors.push("database.min_connections cannot exceed max_connections".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// EVM network connection and sync parameters (§6, §A.4).
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSettings {
    /// HTTP JSON-RPC endpoint URL.
    pub http_url: String,
    /// WebSocket RPC endpoint URL (reserved; this core polls over HTTP, see
    /// `SPEC_FULL.md` §A.6).
    pub ws_url: String,
    /// Chain ID, passed through to `EventStore::insert_realtime_block`.
    pub chain_id: u64,
    /// Polling interval in milliseconds for `eth_getBlockByNumber("latest")`.
    pub polling_interval_ms: u64,
    /// `finalityBlockCount` (§2, §4.4.1): assumed reorg depth bound.
    pub finality_block_count: u64,
}

impl NetworkSettings {
    /// Get the polling interval as a `Duration`.
    #[must_use]
    pub const fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Build the [`NetworkConfig`] the sync service consumes from these
    /// settings.
    #[must_use]
    pub const fn to_network_config(&self) -> NetworkConfig {
        NetworkConfig {
            chain_id: self.chain_id,
            finality_block_count: self.finality_block_count,
            poll_interval: self.polling_interval(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum connections in the pool.
    pub max_connections: u32,
    /// Minimum connections to maintain.
    pub min_connections: u32,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Idle connection timeout in milliseconds.
    pub idle_timeout_ms: u64,
}

impl DatabaseSettings {
    /// Get the connection timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get the idle timeout as a `Duration`.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error). Overridden by
    /// `PONDER_LOG_LEVEL` if set (§6), falling back to `RUST_LOG`, then this
    /// value.
    pub level: String,
    /// Log format (json, pretty).
    pub format: String,
    /// Optional file path for log output.
    pub file_path: Option<String>,
}

impl LoggingSettings {
    /// Resolve the effective log level: `PONDER_LOG_LEVEL`, then
    /// `RUST_LOG`, then this setting's `level`.
    #[must_use]
    pub fn effective_level(&self) -> String {
        std::env::var("PONDER_LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| self.level.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
