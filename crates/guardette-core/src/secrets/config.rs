use std::sync::Arc;

use guardette_config::GatewayConfig;

use super::SecretsResolver;
use crate::error::{GatewayError, GatewayResult};
use crate::BoxFuture;

/// Reads secrets directly from configuration.
#[derive(Debug, Clone)]
pub struct ConfigSecretsResolver {
    config: Arc<GatewayConfig>,
}

impl ConfigSecretsResolver {
    /// Create a resolver over `config`.
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        Self { config }
    }
}

impl SecretsResolver for ConfigSecretsResolver {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, GatewayResult<String>> {
        let value = self
            .config
            .get(key)
            .ok_or_else(|| GatewayError::configuration(format!("Missing secret for key: '{key}'.")));
        Box::pin(async move { value })
    }
}
