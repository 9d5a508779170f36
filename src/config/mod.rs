//! Configuration loading and validation (§6 "Configuration (consumed)").
//!
//! Configuration is loaded from multiple sources in order of precedence:
//! 1. Environment variables (highest)
//! 2. Environment-specific file (e.g., `development.toml`)
//! 3. Default file (`default.toml`)
//!
//! # Example
//!
//! ```ignore
//! use evm_realtime_sync::config::Settings;
//!
//! let settings = Settings::load("development")?;
//! println!("RPC URL: {}", settings.network.http_url);
//! ```

mod settings;

pub use settings::{DatabaseSettings, LoggingSettings, NetworkSettings, Settings};
