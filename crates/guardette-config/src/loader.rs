//! Configuration loader.
//!
//! This module provides the [`ConfigLoader`] which assembles a key/value
//! store from the process environment, an optional `.env` file and explicit
//! overrides, then validates it into a [`GatewayConfig`].

use std::path::Path;
use std::sync::Arc;

use crate::{ConfigResult, ConfigStore, EnvStore, GatewayConfig, LayeredStore, MapStore};

/// Configuration loader with a layered approach.
///
/// Lookups consult, in order:
/// 1. Explicit overrides (command-line flags)
/// 2. The base store (process environment by default, then `.env`)
///
/// # Example
///
/// ```no_run
/// use guardette_config::{keys, ConfigLoader};
///
/// # fn main() -> Result<(), guardette_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_dotenv(".env")?
///     .with_override(keys::WATCH_POLICY, "true")
///     .load()?;
/// assert!(config.watch_policy);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    base: Arc<dyn ConfigStore>,
    overrides: MapStore,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader over the process environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Arc::new(EnvStore::new()),
            overrides: MapStore::new(),
        }
    }

    /// Replace the base store.
    #[must_use]
    pub fn with_store(mut self, store: impl ConfigStore + 'static) -> Self {
        self.base = Arc::new(store);
        self
    }

    /// Use the process environment primed from a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing or malformed.
    pub fn with_dotenv<P: AsRef<Path>>(mut self, path: P) -> ConfigResult<Self> {
        self.base = Arc::new(EnvStore::with_dotenv(path)?);
        Ok(self)
    }

    /// Use a `.env` file if it exists, otherwise the plain environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but is malformed.
    pub fn with_optional_dotenv<P: AsRef<Path>>(self, path: P) -> ConfigResult<Self> {
        if path.as_ref().exists() {
            self.with_dotenv(path)
        } else {
            Ok(self)
        }
    }

    /// Set a value that takes precedence over the base store.
    #[must_use]
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key, value);
        self
    }

    /// Finalize and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any typed value fails to parse.
    pub fn load(self) -> ConfigResult<GatewayConfig> {
        let store: Arc<dyn ConfigStore> = if self.overrides.is_empty() {
            self.base
        } else {
            Arc::new(LayeredStore::new(self.overrides, self.base))
        };
        GatewayConfig::from_store(store)
    }
}
