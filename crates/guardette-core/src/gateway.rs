//! The gateway: caller authentication, matching, the proxy pipeline and
//! error envelopes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use guardette_config::{keys, GatewayConfig};
use guardette_router::SUPPORTED_METHODS;
use guardette_telemetry::record_request;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use http::StatusCode;
use parking_lot::RwLock;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tracing::Instrument;
use uuid::Uuid;

use crate::actions::ActionRegistry;
use crate::auth::AuthHandlerRegistry;
use crate::error::{GatewayError, GatewayResult};
use crate::headers::{PROXY_ERROR_HEADER, PROXY_ERROR_SOURCE, PROXY_HOST_HEADER};
use crate::matcher::Matcher;
use crate::policy::Policy;
use crate::proxy::{GatewayResponse, InboundRequest, ReqwestUpstream, UpstreamClient};
use crate::secrets::{self, SecretsResolver};
use crate::transformer::ProxyTransformer;

/// A running gateway.
///
/// `handle` may be called concurrently. A policy reload swaps the routing
/// table atomically; calls already in flight finish against the table they
/// started with.
#[derive(Debug)]
pub struct Gateway {
    state: RwLock<Arc<Matcher>>,
    actions: Arc<ActionRegistry>,
    auth: Arc<AuthHandlerRegistry>,
    config: Arc<GatewayConfig>,
    secrets: Arc<dyn SecretsResolver>,
    upstream: Arc<dyn UpstreamClient>,
}

enum PolicySource {
    Loaded(Policy),
    File(PathBuf),
}

/// Builder for [`Gateway`].
///
/// # Example
///
/// ```rust,ignore
/// let gateway = Gateway::builder(config)
///     .policy_file(".guardette/policy.yml")
///     .build()
///     .await?;
/// ```
pub struct GatewayBuilder {
    config: Arc<GatewayConfig>,
    policy: Option<PolicySource>,
    actions: Option<ActionRegistry>,
    auth: Option<AuthHandlerRegistry>,
    secrets: Option<Arc<dyn SecretsResolver>>,
    upstream: Option<Arc<dyn UpstreamClient>>,
}

impl GatewayBuilder {
    /// Use an already-loaded policy.
    ///
    /// It must have been parsed with the same action registry handed to
    /// [`actions`](Self::actions).
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = Some(PolicySource::Loaded(policy));
        self
    }

    /// Load the policy from a file during [`build`](Self::build).
    pub fn policy_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy = Some(PolicySource::File(path.into()));
        self
    }

    /// Replace the stock action registry.
    pub fn actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = Some(actions);
        self
    }

    /// Replace the stock auth handler registry.
    pub fn auth(mut self, auth: AuthHandlerRegistry) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Replace the resolver selected by `SECRET_MANAGER`.
    pub fn secrets(mut self, secrets: Arc<dyn SecretsResolver>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Replace the `reqwest` upstream client.
    pub fn upstream(mut self, upstream: Arc<dyn UpstreamClient>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Fails when no policy was given, the policy does not load, it names an
    /// auth kind with no registered handler, or a default component cannot
    /// be created.
    pub async fn build(self) -> GatewayResult<Gateway> {
        let actions = self.actions.unwrap_or_default();
        let auth = match self.auth {
            Some(auth) => auth,
            None => AuthHandlerRegistry::with_defaults()?,
        };

        let policy = match self.policy {
            Some(PolicySource::Loaded(policy)) => policy,
            Some(PolicySource::File(path)) => Policy::load(path, &actions)?,
            None => return Err(GatewayError::configuration("a policy is required")),
        };
        policy.check_auth_kinds(&auth)?;

        let secrets = match self.secrets {
            Some(secrets) => secrets,
            None => secrets::from_config(&self.config).await?,
        };
        let upstream: Arc<dyn UpstreamClient> = match self.upstream {
            Some(upstream) => upstream,
            None => Arc::new(ReqwestUpstream::new()?),
        };

        tracing::info!(
            version = policy.version(),
            sources = policy.sources().len(),
            "gateway ready"
        );

        Ok(Gateway {
            state: RwLock::new(Arc::new(Matcher::new(policy))),
            actions: Arc::new(actions),
            auth: Arc::new(auth),
            config: self.config,
            secrets,
            upstream,
        })
    }
}

impl Gateway {
    /// Start building a gateway.
    pub fn builder(config: Arc<GatewayConfig>) -> GatewayBuilder {
        GatewayBuilder {
            config,
            policy: None,
            actions: None,
            auth: None,
            secrets: None,
            upstream: None,
        }
    }

    /// Gateway configuration.
    pub fn config(&self) -> &Arc<GatewayConfig> {
        &self.config
    }

    /// The action registry policies are parsed with.
    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Snapshot of the current routing table.
    pub fn matcher(&self) -> Arc<Matcher> {
        self.state.read().clone()
    }

    /// Swaps in a new policy.
    ///
    /// On error the current policy stays in effect.
    pub fn reload_policy(&self, policy: Policy) -> GatewayResult<()> {
        policy.check_auth_kinds(&self.auth)?;
        let version = policy.version().to_string();
        let sources = policy.sources().len();

        *self.state.write() = Arc::new(Matcher::new(policy));
        tracing::info!(version = %version, sources, "policy reloaded");
        Ok(())
    }

    /// Reloads the policy from a file.
    pub fn reload_policy_file(&self, path: impl Into<PathBuf>) -> GatewayResult<()> {
        let policy = Policy::load(path.into(), &self.actions)?;
        self.reload_policy(policy)
    }

    /// `{"version": ..., "policy": ...}` for the meta endpoint.
    pub fn meta(&self) -> Value {
        json!({
            "version": crate::VERSION,
            "policy": self.matcher().policy().raw(),
        })
    }

    /// Processes one inbound call.
    ///
    /// Never fails: every error becomes a proxy-error envelope.
    pub async fn handle(&self, request: InboundRequest) -> GatewayResponse {
        let correlation_id = Uuid::now_v7().to_string();
        let target_host = request
            .headers
            .get(&PROXY_HOST_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let span = tracing::info_span!(
            "request",
            correlation_id = %correlation_id,
            method = %request.method,
            path = %request.uri.path(),
            target_host = %target_host,
        );

        async move {
            let start = Instant::now();
            let (response, outcome) = match self.process(&request).await {
                Ok(response) => {
                    tracing::info!(
                        status = response.status.as_u16(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "request completed"
                    );
                    (response, "proxied")
                }
                Err(err) => {
                    log_failure(&err);
                    (error_response(&err, &correlation_id), err.category())
                }
            };
            record_request(outcome, response.status.as_u16(), start.elapsed());
            response
        }
        .instrument(span)
        .await
    }

    async fn process(&self, request: &InboundRequest) -> GatewayResult<GatewayResponse> {
        self.authenticate(&request.headers).await?;

        let host = request
            .headers
            .get(&PROXY_HOST_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| GatewayError::configuration("X-Guardette-Host header is missing."))?;

        if !SUPPORTED_METHODS.contains(&request.method) {
            return Err(GatewayError::unsupported_method(request.method.as_str()));
        }

        let matcher = self.matcher();
        let matched = matcher
            .match_request(host, &request.method, request.uri.path())
            .ok_or_else(|| GatewayError::match_not_found("Match not found."))?;

        let transformer = ProxyTransformer::for_match(&self.auth, self.upstream.as_ref(), &matched);
        let mut ctx = transformer
            .transform_request(
                request,
                Arc::clone(&self.config),
                Arc::clone(&self.secrets),
                matched.path_params,
            )
            .await?;

        let upstream = transformer
            .forward(&ctx.request, self.config.proxy_client_timeout)
            .await?;
        let outcome = transformer.transform_response(&mut ctx, upstream).await?;

        Ok(outcome.into_response(&request.method))
    }

    async fn authenticate(&self, headers: &HeaderMap) -> GatewayResult<()> {
        let provided = headers
            .get(AUTHORIZATION)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GatewayError::caller_auth("Missing authorization header."))?;

        let expected = self.secrets.get(keys::CLIENT_SECRET).await?;
        if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
            Ok(())
        } else {
            Err(GatewayError::caller_auth("Invalid authorization header."))
        }
    }
}

fn log_failure(err: &GatewayError) {
    match err {
        GatewayError::CallerAuth { .. } | GatewayError::MatchNotFound { .. } => {
            tracing::warn!(error = %err, category = err.category(), "request rejected");
        }
        _ => {
            tracing::error!(
                error = %err,
                category = err.category(),
                cause = %err.cause_chain(),
                "request failed"
            );
        }
    }
}

/// The proxy-error envelope for `err`.
pub fn error_envelope(err: &GatewayError, correlation_id: &str) -> Value {
    let message = match err {
        GatewayError::CallerAuth { .. } => "Unauthorized",
        GatewayError::MatchNotFound { .. } => "Not Found",
        _ => "Internal Server Error",
    };
    json!({
        "error": {
            "message": message,
            "source": PROXY_ERROR_SOURCE,
            "details": err.details(),
            "correlation_id": correlation_id,
        }
    })
}

/// The proxy-error response for `err`, marked with `X-Guardette-Error`.
pub fn error_response(err: &GatewayError, correlation_id: &str) -> GatewayResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(&PROXY_ERROR_HEADER, HeaderValue::from_static(PROXY_ERROR_SOURCE));

    GatewayResponse {
        status: StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        headers,
        body: Bytes::from(error_envelope(err, correlation_id).to_string()),
    }
}
