//! Upstream credential injection.
//!
//! A source declares `auth: kind` or `auth: kind:subkind`. At request time
//! the [`AuthHandlerRegistry`] derives the lookup prefix `AUTH_KIND` or
//! `AUTH_KIND_SUBKIND`, resolves every declared secret and config field under
//! `{PREFIX}_{FIELD}`, and hands them to the registered [`AuthHandler`],
//! which sets headers on the outgoing request.
//!
//! ```text
//! auth: bearer_token:hn   ->  secret AUTH_BEARER_TOKEN_HN_SECRET
//! auth: basic_auth        ->  secrets AUTH_BASIC_AUTH_USERNAME, AUTH_BASIC_AUTH_PASSWORD
//! ```

mod basic;
mod bearer;
mod gcp;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use futures_util::future::try_join_all;
use guardette_config::GatewayConfig;
use regex::Regex;

use crate::error::{GatewayError, GatewayResult, PolicyError, PolicyResult};
use crate::proxy::ProxyRequest;
use crate::secrets::SecretsResolver;
use crate::BoxFuture;

pub use basic::BasicAuth;
pub use bearer::BearerToken;
pub use gcp::{GcpServiceAccount, GOOGLE_TOKEN_URI};

/// A parsed `kind[:subkind]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSpec {
    /// Handler kind.
    pub kind: String,
    /// Optional credential namespace.
    pub subkind: Option<String>,
}

fn auth_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\w+|\w+:\w+)$").expect("valid regex"))
}

impl AuthSpec {
    /// Parses `kind` or `kind:subkind`.
    pub fn parse(spec: &str) -> PolicyResult<Self> {
        if !auth_pattern().is_match(spec) {
            return Err(PolicyError::InvalidAuth {
                auth: spec.to_string(),
            });
        }
        Ok(match spec.split_once(':') {
            Some((kind, subkind)) => Self {
                kind: kind.to_string(),
                subkind: Some(subkind.to_string()),
            },
            None => Self {
                kind: spec.to_string(),
                subkind: None,
            },
        })
    }

    /// The upper-cased lookup prefix.
    pub fn lookup_prefix(&self) -> String {
        lookup_prefix(&self.kind, self.subkind.as_deref())
    }
}

impl FromStr for AuthSpec {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AuthSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subkind {
            Some(subkind) => write!(f, "{}:{subkind}", self.kind),
            None => f.write_str(&self.kind),
        }
    }
}

/// `AUTH_{KIND}` or `AUTH_{KIND}_{SUBKIND}`, upper-cased.
pub fn lookup_prefix(kind: &str, subkind: Option<&str>) -> String {
    match subkind {
        Some(subkind) => format!("auth_{kind}_{subkind}"),
        None => format!("auth_{kind}"),
    }
    .to_uppercase()
}

/// `{PREFIX}_{FIELD}`, upper-cased.
pub fn derive_lookup_key(prefix: &str, field: &str) -> String {
    format!("{prefix}_{field}").to_uppercase()
}

/// Inputs handed to an [`AuthHandler`].
#[derive(Debug)]
pub struct AuthContext<'r> {
    /// The outgoing request; handlers may only touch its headers.
    pub request: &'r mut ProxyRequest,
    /// Resolved secrets keyed by declared field name.
    pub secret_params: HashMap<String, String>,
    /// Resolved config values keyed by declared field name.
    pub config_params: HashMap<String, Option<String>>,
}

impl AuthContext<'_> {
    /// A resolved secret field.
    pub fn secret(&self, field: &str) -> GatewayResult<&str> {
        self.secret_params
            .get(field)
            .map(String::as_str)
            .ok_or_else(|| GatewayError::internal(format!("auth secret field '{field}' was not resolved")))
    }

    /// A resolved config field; `None` when absent.
    pub fn config(&self, field: &str) -> Option<&str> {
        self.config_params.get(field).and_then(|v| v.as_deref())
    }
}

/// A credential-injection strategy.
pub trait AuthHandler: Send + Sync + fmt::Debug {
    /// Sets credentials on `ctx.request`.
    fn apply<'a>(&'a self, ctx: AuthContext<'a>) -> BoxFuture<'a, GatewayResult<()>>;
}

#[derive(Debug)]
struct AuthHandlerRecord {
    secret_keys: Vec<String>,
    config_keys: Vec<String>,
    handler: Arc<dyn AuthHandler>,
}

/// Catalog of auth handler kinds.
#[derive(Debug, Default)]
pub struct AuthHandlerRegistry {
    handlers: HashMap<String, AuthHandlerRecord>,
}

impl AuthHandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `basic_auth`, `bearer_token` and
    /// `gcp_service_account`.
    pub fn with_defaults() -> GatewayResult<Self> {
        let mut registry = Self::new();
        registry.register(BasicAuth::KIND, &["username", "password"], &[], BasicAuth)?;
        registry.register(BearerToken::KIND, &["secret"], &[], BearerToken)?;
        registry.register(
            GcpServiceAccount::KIND,
            &["secret"],
            &["scopes"],
            GcpServiceAccount::new()?,
        )?;
        Ok(registry)
    }

    /// Binds `kind` to its secret and config fields plus the handler.
    ///
    /// # Errors
    ///
    /// Fails with [`PolicyError::DuplicateRegistration`] if `kind` is taken.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        secret_keys: &[&str],
        config_keys: &[&str],
        handler: impl AuthHandler + 'static,
    ) -> PolicyResult<()> {
        let kind = kind.into();
        if self.handlers.contains_key(&kind) {
            return Err(PolicyError::DuplicateRegistration {
                registry: "Auth handler",
                kind,
            });
        }
        self.handlers.insert(
            kind,
            AuthHandlerRecord {
                secret_keys: secret_keys.iter().map(|k| (*k).to_string()).collect(),
                config_keys: config_keys.iter().map(|k| (*k).to_string()).collect(),
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    /// Check whether a kind is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Resolves credentials for `spec` and applies them to `request`.
    ///
    /// Secret lookups run concurrently.
    pub async fn dispatch(
        &self,
        spec: &AuthSpec,
        request: &mut ProxyRequest,
        secrets: &dyn SecretsResolver,
        config: &GatewayConfig,
    ) -> GatewayResult<()> {
        let record = self.handlers.get(&spec.kind).ok_or_else(|| {
            GatewayError::configuration(format!("No auth handler registered for kind '{}'", spec.kind))
        })?;
        let prefix = spec.lookup_prefix();

        let values = try_join_all(record.secret_keys.iter().map(|field| {
            let key = derive_lookup_key(&prefix, field);
            async move { secrets.get(&key).await }
        }))
        .await?;
        let secret_params = record.secret_keys.iter().cloned().zip(values).collect();

        let config_params = record
            .config_keys
            .iter()
            .map(|field| (field.clone(), config.get(&derive_lookup_key(&prefix, field))))
            .collect();

        tracing::debug!(auth = %spec, "applying upstream credentials");
        record
            .handler
            .apply(AuthContext {
                request,
                secret_params,
                config_params,
            })
            .await
    }
}
