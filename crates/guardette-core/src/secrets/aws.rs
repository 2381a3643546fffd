//! AWS Secrets Manager backend.

use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;
use guardette_config::GatewayConfig;

use super::SecretStore;
use crate::error::{GatewayError, GatewayResult};
use crate::BoxFuture;

/// Fetches secrets from AWS Secrets Manager.
///
/// The configuration value stored under the requested key is the secret id
/// to fetch, e.g. `CLIENT_SECRET=prod/guardette/client-secret`.
#[derive(Debug, Clone)]
pub struct AwsSecretStore {
    client: Client,
    config: Arc<GatewayConfig>,
}

impl AwsSecretStore {
    /// Create a store using the ambient AWS credentials and region.
    pub async fn from_env(config: Arc<GatewayConfig>) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::with_client(Client::new(&sdk_config), config)
    }

    /// Create a store over an existing client.
    pub fn with_client(client: Client, config: Arc<GatewayConfig>) -> Self {
        Self { client, config }
    }
}

impl SecretStore for AwsSecretStore {
    fn fetch<'a>(&'a self, key: &'a str) -> BoxFuture<'a, GatewayResult<String>> {
        Box::pin(async move {
            let secret_id = self.config.get(key).ok_or_else(|| {
                GatewayError::configuration(format!("Missing configuration for key: '{key}'."))
            })?;

            tracing::debug!(key, "fetching secret from AWS");
            let output = self
                .client
                .get_secret_value()
                .secret_id(secret_id)
                .send()
                .await
                .map_err(|e| {
                    GatewayError::secrets_retrieval(
                        format!("Error fetching secret from AWS for {key}"),
                        DisplayErrorContext(&e).to_string(),
                    )
                })?;

            output
                .secret_string()
                .map(str::to_string)
                .ok_or_else(|| GatewayError::SecretsRetrieval {
                    message: format!("Secret for {key} has no string value"),
                    source: None,
                })
        })
    }
}
