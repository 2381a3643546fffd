//! Secret resolution.
//!
//! [`SecretsResolver`] is the capability the pipeline consumes. Two
//! implementations exist:
//!
//! - [`ConfigSecretsResolver`] reads secrets straight from configuration
//! - [`CachingSecretsResolver`] wraps a [`SecretStore`] backend with a TTL
//!   cache; [`AwsSecretStore`] is the production backend
//!
//! [`from_config`] picks one according to `SECRET_MANAGER`.

#[cfg(feature = "aws")]
mod aws;
mod cached;
mod config;

use std::fmt;
use std::sync::Arc;

use guardette_config::{GatewayConfig, SecretManagerKind};

use crate::error::GatewayResult;
use crate::BoxFuture;

#[cfg(feature = "aws")]
pub use aws::AwsSecretStore;
pub use cached::{CacheStats, CachingSecretsResolver};
pub use config::ConfigSecretsResolver;

/// Resolves named secrets.
pub trait SecretsResolver: Send + Sync + fmt::Debug {
    /// Fetch the secret stored under `key`.
    ///
    /// # Errors
    ///
    /// A key absent from configuration is a configuration error; a failing
    /// backend is a secrets-retrieval error.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, GatewayResult<String>>;
}

/// A remote secret backend.
pub trait SecretStore: Send + Sync + fmt::Debug {
    /// Fetch the current value for `key`, bypassing any cache.
    fn fetch<'a>(&'a self, key: &'a str) -> BoxFuture<'a, GatewayResult<String>>;
}

/// Builds the resolver selected by configuration.
pub async fn from_config(config: &Arc<GatewayConfig>) -> GatewayResult<Arc<dyn SecretsResolver>> {
    match config.secret_manager {
        SecretManagerKind::Default => Ok(Arc::new(ConfigSecretsResolver::new(Arc::clone(config)))),
        SecretManagerKind::AwsSecretManager => aws_resolver(config).await,
    }
}

#[cfg(feature = "aws")]
async fn aws_resolver(config: &Arc<GatewayConfig>) -> GatewayResult<Arc<dyn SecretsResolver>> {
    let store = AwsSecretStore::from_env(Arc::clone(config)).await;
    Ok(Arc::new(CachingSecretsResolver::new(store, config.secret_cache_ttl)))
}

#[cfg(not(feature = "aws"))]
async fn aws_resolver(_config: &Arc<GatewayConfig>) -> GatewayResult<Arc<dyn SecretsResolver>> {
    Err(crate::error::GatewayError::configuration(
        "SECRET_MANAGER=aws_secret_manager requires the `aws` feature",
    ))
}
