//! Key/value configuration stores.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::{ConfigError, ConfigResult};

/// A flat, synchronous key/value lookup.
///
/// Lookups never fail: an absent key yields `None` and the caller decides
/// whether that is fatal.
pub trait ConfigStore: Send + Sync + fmt::Debug {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;
}

impl<S: ConfigStore + ?Sized> ConfigStore for Arc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

/// Reads from the process environment.
///
/// Values from an optional `.env` file are consulted only when the process
/// environment does not define the key, mirroring `dotenvy`'s no-override
/// behavior without mutating the environment.
#[derive(Debug, Default, Clone)]
pub struct EnvStore {
    dotenv: HashMap<String, String>,
}

impl EnvStore {
    /// Creates a store over the process environment only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store primed from a `.env` file.
    pub fn with_dotenv(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let env_file_error = |e: dotenvy::Error| ConfigError::EnvFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let mut dotenv = HashMap::new();
        for item in dotenvy::from_path_iter(path).map_err(env_file_error)? {
            let (key, value) = item.map_err(env_file_error)?;
            dotenv.insert(key, value);
        }

        Ok(Self { dotenv })
    }
}

impl ConfigStore for EnvStore {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| self.dotenv.get(key).cloned())
    }
}

/// An in-memory store.
///
/// # Example
///
/// ```
/// use guardette_config::{ConfigStore, MapStore};
///
/// let store = MapStore::new().with("AUTH_BEARER_TOKEN_SECRET", "abc");
/// assert_eq!(store.get("AUTH_BEARER_TOKEN_SECRET").as_deref(), Some("abc"));
/// assert_eq!(store.get("UNSET"), None);
/// ```
#[derive(Default, Clone)]
pub struct MapStore {
    values: HashMap<String, String>,
}

impl MapStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds or replaces a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns true if no values are stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// Values are frequently secrets; only keys are printed.
impl fmt::Debug for MapStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("MapStore").field("keys", &keys).finish()
    }
}

impl ConfigStore for MapStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Overrides layered on top of a base store.
#[derive(Debug)]
pub struct LayeredStore {
    overrides: MapStore,
    base: Arc<dyn ConfigStore>,
}

impl LayeredStore {
    /// Creates a store that consults `overrides` before `base`.
    pub fn new(overrides: MapStore, base: Arc<dyn ConfigStore>) -> Self {
        Self { overrides, base }
    }
}

impl ConfigStore for LayeredStore {
    fn get(&self, key: &str) -> Option<String> {
        self.overrides.get(key).or_else(|| self.base.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_map_store_lookup() {
        let store: MapStore = [("A", "1"), ("B", "2")].into_iter().collect();
        assert_eq!(store.get("A").as_deref(), Some("1"));
        assert_eq!(store.get("C"), None);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_map_store_debug_hides_values() {
        let store = MapStore::new().with("CLIENT_SECRET", "hunter2");
        let debug = format!("{store:?}");
        assert!(debug.contains("CLIENT_SECRET"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_layered_store_prefers_overrides() {
        let base: Arc<dyn ConfigStore> = Arc::new(MapStore::new().with("K", "base").with("B", "b"));
        let store = LayeredStore::new(MapStore::new().with("K", "override"), base);

        assert_eq!(store.get("K").as_deref(), Some("override"));
        assert_eq!(store.get("B").as_deref(), Some("b"));
        assert_eq!(store.get("Z"), None);
    }

    #[test]
    fn test_env_store_reads_dotenv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "GUARDETTE_TEST_ONLY_IN_DOTENV=from-file").unwrap();

        let store = EnvStore::with_dotenv(file.path()).unwrap();
        assert_eq!(
            store.get("GUARDETTE_TEST_ONLY_IN_DOTENV").as_deref(),
            Some("from-file")
        );
    }

    #[test]
    fn test_env_store_missing_dotenv() {
        let result = EnvStore::with_dotenv("/nonexistent/.env");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_env_store_reads_process_env() {
        // PATH is set in every test environment.
        assert!(EnvStore::new().get("PATH").is_some());
    }
}
