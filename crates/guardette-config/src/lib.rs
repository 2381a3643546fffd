//! Configuration for the Guardette gateway.
//!
//! Guardette reads its settings from a flat key/value store, normally the
//! process environment optionally primed from a `.env` file. This crate
//! provides:
//!
//! - [`ConfigStore`] - the key/value lookup contract, with [`EnvStore`],
//!   [`MapStore`] and [`LayeredStore`] implementations
//! - [`GatewayConfig`] - the typed, validated view over a store
//! - [`ConfigLoader`] - builder that assembles a store and validates it
//! - [`PolicyWatcher`] - debounced change notifications for the policy file
//!
//! # Example
//!
//! ```
//! use guardette_config::{keys, ConfigLoader, MapStore, SecretManagerKind};
//! use std::time::Duration;
//!
//! let store = MapStore::new()
//!     .with(keys::CLIENT_SECRET, "s3cret")
//!     .with(keys::PROXY_CLIENT_TIMEOUT_SECS, "5");
//!
//! let config = ConfigLoader::new().with_store(store).load().unwrap();
//!
//! assert_eq!(config.secret_manager, SecretManagerKind::Default);
//! assert_eq!(config.proxy_client_timeout, Duration::from_secs(5));
//! assert_eq!(config.get(keys::CLIENT_SECRET).as_deref(), Some("s3cret"));
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod store;
mod watcher;

pub use config::{GatewayConfig, SecretManagerKind, DEFAULT_REDACT_TOKEN};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use store::{ConfigStore, EnvStore, LayeredStore, MapStore};
pub use watcher::PolicyWatcher;

/// Well-known configuration keys.
pub mod keys {
    /// Shared secret expected in the inbound `Authorization` header.
    pub const CLIENT_SECRET: &str = "CLIENT_SECRET";
    /// Secrets backend selector (`default` or `aws_secret_manager`).
    pub const SECRET_MANAGER: &str = "SECRET_MANAGER";
    /// Salt mixed into pseudonymised emails.
    pub const PSEUDONYMIZE_SALT: &str = "PSEUDONYMIZE_SALT";
    /// Comma-separated email domains left untouched by pseudonymisation.
    pub const PSEUDONYMIZE_EMAIL_DOMAINS_ALLOWLIST: &str = "PSEUDONYMIZE_EMAIL_DOMAINS_ALLOWLIST";
    /// Upstream call timeout in seconds.
    pub const PROXY_CLIENT_TIMEOUT_SECS: &str = "PROXY_CLIENT_TIMEOUT_SECS";
    /// Secret cache time-to-live in seconds.
    pub const SECRET_MANAGER_CACHE_TTL_SECS: &str = "SECRET_MANAGER_CACHE_TTL_SECS";
    /// Location of the policy document.
    pub const POLICY_PATH: &str = "GUARDETTE_POLICY_PATH";
    /// Socket address the HTTP binding listens on.
    pub const LISTEN_ADDR: &str = "GUARDETTE_LISTEN_ADDR";
    /// Whether the policy file is watched for changes.
    pub const WATCH_POLICY: &str = "GUARDETTE_WATCH_POLICY";
    /// Log filter directive.
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    /// Log output format (`json` or `pretty`).
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}
