//! Typed gateway configuration.

use std::collections::BTreeSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::{keys, ConfigError, ConfigResult, ConfigStore};

/// Sentinel written over redacted values.
pub const DEFAULT_REDACT_TOKEN: &str = "[REDACTED]";

/// Which backend resolves secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretManagerKind {
    /// Secrets are read straight from configuration.
    #[default]
    Default,
    /// Secrets are fetched from AWS Secrets Manager and cached.
    AwsSecretManager,
}

impl SecretManagerKind {
    /// Returns the configuration spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AwsSecretManager => "aws_secret_manager",
        }
    }
}

impl FromStr for SecretManagerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "aws_secret_manager" => Ok(Self::AwsSecretManager),
            other => Err(ConfigError::invalid_value(
                keys::SECRET_MANAGER,
                format!("expected 'default' or 'aws_secret_manager', got '{other}'"),
            )),
        }
    }
}

impl fmt::Display for SecretManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated gateway settings.
///
/// The typed fields are parsed once at load. Keys without a typed field
/// (client secret, per-auth-handler settings, backend secret ids) stay in
/// the underlying store and are read through [`GatewayConfig::get`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    store: Arc<dyn ConfigStore>,

    /// Secrets backend.
    pub secret_manager: SecretManagerKind,

    /// Lower-cased email domains that pseudonymisation leaves untouched.
    pub pseudonymize_email_domains_allowlist: BTreeSet<String>,

    /// Upstream call timeout.
    pub proxy_client_timeout: Duration,

    /// Time-to-live applied to every cached secret.
    pub secret_cache_ttl: Duration,

    /// Sentinel written by redacting actions.
    pub redact_token: String,

    /// Location of the policy document.
    pub policy_path: PathBuf,

    /// Address the HTTP binding listens on.
    pub listen_addr: SocketAddr,

    /// Whether the policy file is watched and reloaded on change.
    pub watch_policy: bool,

    /// Log filter directive.
    pub log_level: String,

    /// Whether logs are emitted as JSON (otherwise human-readable).
    pub log_json: bool,
}

impl GatewayConfig {
    /// Default upstream call timeout.
    pub const DEFAULT_PROXY_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default secret cache time-to-live.
    pub const DEFAULT_SECRET_CACHE_TTL: Duration = Duration::from_secs(300);

    /// Default policy document location.
    pub const DEFAULT_POLICY_PATH: &'static str = ".guardette/policy.yml";

    /// Default listen address.
    pub const DEFAULT_LISTEN_ADDR: &'static str = "0.0.0.0:8080";

    /// Parses and validates the typed view over `store`.
    pub fn from_store(store: Arc<dyn ConfigStore>) -> ConfigResult<Self> {
        let secret_manager: SecretManagerKind = store
            .get(keys::SECRET_MANAGER)
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();

        let pseudonymize_email_domains_allowlist = store
            .get(keys::PSEUDONYMIZE_EMAIL_DOMAINS_ALLOWLIST)
            .map(|v| parse_list(&v))
            .unwrap_or_default();

        let proxy_client_timeout = parse_secs(&*store, keys::PROXY_CLIENT_TIMEOUT_SECS)?
            .unwrap_or(Self::DEFAULT_PROXY_CLIENT_TIMEOUT);
        let secret_cache_ttl = parse_secs(&*store, keys::SECRET_MANAGER_CACHE_TTL_SECS)?
            .unwrap_or(Self::DEFAULT_SECRET_CACHE_TTL);

        let policy_path = store
            .get(keys::POLICY_PATH)
            .unwrap_or_else(|| Self::DEFAULT_POLICY_PATH.to_string())
            .into();

        let listen_addr = store
            .get(keys::LISTEN_ADDR)
            .unwrap_or_else(|| Self::DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr.parse::<SocketAddr>().map_err(|e| {
            ConfigError::invalid_value(keys::LISTEN_ADDR, format!("{listen_addr}: {e}"))
        })?;

        let watch_policy = match store.get(keys::WATCH_POLICY) {
            Some(v) => parse_bool(&v)
                .ok_or_else(|| ConfigError::invalid_value(keys::WATCH_POLICY, "expected boolean"))?,
            None => false,
        };

        let log_level = store
            .get(keys::LOG_LEVEL)
            .unwrap_or_else(|| "info".to_string());
        let log_json = match store.get(keys::LOG_FORMAT).as_deref() {
            None | Some("json") => true,
            Some("pretty") => false,
            Some(_) => {
                return Err(ConfigError::invalid_value(
                    keys::LOG_FORMAT,
                    "expected 'json' or 'pretty'",
                ))
            }
        };

        Ok(Self {
            store,
            secret_manager,
            pseudonymize_email_domains_allowlist,
            proxy_client_timeout,
            secret_cache_ttl,
            redact_token: DEFAULT_REDACT_TOKEN.to_string(),
            policy_path,
            listen_addr,
            watch_policy,
            log_level,
            log_json,
        })
    }

    /// Reads a raw value from the underlying store.
    pub fn get(&self, key: &str) -> Option<String> {
        self.store.get(key)
    }

    /// Reads a raw value, failing when it is absent.
    pub fn require(&self, key: &str) -> ConfigResult<String> {
        self.get(key).ok_or_else(|| ConfigError::missing(key))
    }

    /// Returns true if `domain` is in the pseudonymisation allowlist.
    pub fn is_allowlisted_domain(&self, domain: &str) -> bool {
        self.pseudonymize_email_domains_allowlist
            .contains(&domain.to_lowercase())
    }
}

fn parse_list(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

fn parse_secs(store: &dyn ConfigStore, key: &str) -> ConfigResult<Option<Duration>> {
    store
        .get(key)
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::invalid_value(key, format!("expected whole seconds, got '{v}'")))
        })
        .transpose()
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapStore;

    fn config_from(store: MapStore) -> ConfigResult<GatewayConfig> {
        GatewayConfig::from_store(Arc::new(store))
    }

    #[test]
    fn test_defaults() {
        let config = config_from(MapStore::new()).unwrap();
        assert_eq!(config.secret_manager, SecretManagerKind::Default);
        assert_eq!(config.proxy_client_timeout, Duration::from_secs(30));
        assert_eq!(config.secret_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.redact_token, "[REDACTED]");
        assert_eq!(config.policy_path, PathBuf::from(".guardette/policy.yml"));
        assert_eq!(config.listen_addr.port(), 8080);
        assert!(!config.watch_policy);
        assert!(config.log_json);
        assert!(config.pseudonymize_email_domains_allowlist.is_empty());
    }

    #[test]
    fn test_secret_manager_values() {
        let config =
            config_from(MapStore::new().with(keys::SECRET_MANAGER, "aws_secret_manager")).unwrap();
        assert_eq!(config.secret_manager, SecretManagerKind::AwsSecretManager);

        let err = config_from(MapStore::new().with(keys::SECRET_MANAGER, "vault")).unwrap_err();
        assert_eq!(err.key(), Some(keys::SECRET_MANAGER));
    }

    #[test]
    fn test_allowlist_is_lowercased_and_trimmed() {
        let config = config_from(MapStore::new().with(
            keys::PSEUDONYMIZE_EMAIL_DOMAINS_ALLOWLIST,
            "Example.com, corp.example.org,,",
        ))
        .unwrap();

        assert_eq!(config.pseudonymize_email_domains_allowlist.len(), 2);
        assert!(config.is_allowlisted_domain("example.com"));
        assert!(config.is_allowlisted_domain("CORP.example.org"));
        assert!(!config.is_allowlisted_domain("other.com"));
    }

    #[test]
    fn test_invalid_numbers_are_fatal() {
        let err =
            config_from(MapStore::new().with(keys::PROXY_CLIENT_TIMEOUT_SECS, "soon")).unwrap_err();
        assert_eq!(err.key(), Some(keys::PROXY_CLIENT_TIMEOUT_SECS));

        let err = config_from(MapStore::new().with(keys::SECRET_MANAGER_CACHE_TTL_SECS, "-1"))
            .unwrap_err();
        assert_eq!(err.key(), Some(keys::SECRET_MANAGER_CACHE_TTL_SECS));
    }

    #[test]
    fn test_invalid_bool_and_format() {
        assert!(config_from(MapStore::new().with(keys::WATCH_POLICY, "maybe")).is_err());
        assert!(config_from(MapStore::new().with(keys::LOG_FORMAT, "xml")).is_err());

        let config = config_from(
            MapStore::new()
                .with(keys::WATCH_POLICY, "yes")
                .with(keys::LOG_FORMAT, "pretty"),
        )
        .unwrap();
        assert!(config.watch_policy);
        assert!(!config.log_json);
    }

    #[test]
    fn test_raw_lookups() {
        let config = config_from(MapStore::new().with("AUTH_GCP_SERVICE_ACCOUNT_SCOPES", "a,b")).unwrap();
        assert_eq!(
            config.get("AUTH_GCP_SERVICE_ACCOUNT_SCOPES").as_deref(),
            Some("a,b")
        );
        assert!(matches!(
            config.require("CLIENT_SECRET"),
            Err(ConfigError::Missing { .. })
        ));
    }
}
