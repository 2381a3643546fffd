//! Google service-account credentials via the signed-JWT bearer grant.

use http::header::{HeaderValue, AUTHORIZATION};
use jsonwebtoken::{encode, get_current_timestamp, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AuthContext, AuthHandler};
use crate::error::{GatewayError, GatewayResult};
use crate::headers::GCP_IMPERSONATE_SUB_HEADER;
use crate::BoxFuture;

/// Google's OAuth 2.0 token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
    scope: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges a service-account key for an access token.
///
/// The `X-Guardette-Gcp-Impersonate-Sub` header, when present, overrides
/// the impersonated principal and is removed from the outgoing request.
#[derive(Debug, Clone)]
pub struct GcpServiceAccount {
    client: Client,
    token_uri: String,
}

impl GcpServiceAccount {
    /// Registered kind.
    pub const KIND: &'static str = "gcp_service_account";

    /// Create a handler targeting [`GOOGLE_TOKEN_URI`].
    pub fn new() -> GatewayResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| GatewayError::upstream("failed to create token client", e))?;
        Ok(Self::with_client(client, GOOGLE_TOKEN_URI))
    }

    /// Create a handler with its own client and token endpoint.
    pub fn with_client(client: Client, token_uri: impl Into<String>) -> Self {
        Self {
            client,
            token_uri: token_uri.into(),
        }
    }

    fn sign_assertion(&self, key: &ServiceAccountKey, sub: &str, scopes: &str) -> GatewayResult<String> {
        let iat = get_current_timestamp();
        let claims = Claims {
            iss: &key.client_email,
            sub,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
            scope: scopes.split(',').map(str::trim).collect::<Vec<_>>().join(" "),
        };

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|_| GatewayError::auth_handler("gcp_service_account: invalid private key"))?;
        encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|_| GatewayError::auth_handler("gcp_service_account: failed to sign assertion"))
    }

    async fn exchange(&self, assertion: &str) -> GatewayResult<String> {
        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion)])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "token exchange request failed");
                GatewayError::auth_handler("gcp_service_account: token exchange request failed")
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::auth_handler(format!(
                "gcp_service_account: encountered error http status trying to obtain access token ({})",
                status.as_u16()
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|_| {
            GatewayError::auth_handler("gcp_service_account: token response has no access_token")
        })?;
        Ok(token.access_token)
    }
}

impl AuthHandler for GcpServiceAccount {
    fn apply<'a>(&'a self, mut ctx: AuthContext<'a>) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            let key: ServiceAccountKey = serde_json::from_str(ctx.secret("secret")?).map_err(|_| {
                GatewayError::auth_handler("gcp_service_account: invalid service account credentials")
            })?;

            let scopes = ctx
                .config("scopes")
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| GatewayError::auth_handler("gcp_service_account: `scopes` is required."))?
                .to_string();

            let sub = ctx
                .request
                .headers
                .remove(&GCP_IMPERSONATE_SUB_HEADER)
                .and_then(|v| v.to_str().ok().map(str::to_string))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| key.client_email.clone());

            let assertion = self.sign_assertion(&key, &sub, &scopes)?;
            let access_token = self.exchange(&assertion).await?;

            let mut value = HeaderValue::from_str(&format!("Bearer {access_token}"))
                .map_err(|_| GatewayError::auth_handler("gcp_service_account: invalid access token"))?;
            value.set_sensitive(true);
            ctx.request.headers.insert(AUTHORIZATION, value);
            Ok(())
        })
    }
}
