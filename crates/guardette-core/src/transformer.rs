//! The per-call pipeline: build the upstream request, forward it, and shape
//! the response.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use guardette_config::GatewayConfig;
use guardette_router::{Params, SUPPORTED_METHODS};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, StatusCode};
use serde_json::Value;

use crate::actions::ActionContext;
use crate::auth::AuthHandlerRegistry;
use crate::error::{GatewayError, GatewayResult};
use crate::headers::{filter_request_headers, filter_response_headers};
use crate::matcher::MatchResult;
use crate::policy::{Rule, Source};
use crate::proxy::{upstream_uri, GatewayResponse, InboundRequest, ProxyRequest, ProxyResponse, UpstreamClient, UpstreamResponse};
use crate::secrets::SecretsResolver;

/// What the pipeline produced for the caller.
#[derive(Debug)]
pub enum Outcome {
    /// A JSON response after every response action ran.
    Transformed(ProxyResponse),
    /// A non-2xx upstream response whose body was not JSON, passed through
    /// untouched apart from header filtering.
    Verbatim(UpstreamResponse),
}

impl Outcome {
    /// Serializes the outcome for the caller.
    ///
    /// `HEAD` requests and `204`/`304` statuses carry no body.
    pub fn into_response(self, method: &Method) -> GatewayResponse {
        match self {
            Self::Transformed(response) => {
                let mut headers = response.headers;
                let body = if allows_body(method, response.status) {
                    Bytes::from(response.json.to_string())
                } else {
                    Bytes::new()
                };
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                GatewayResponse {
                    status: response.status,
                    headers,
                    body,
                }
            }
            Self::Verbatim(upstream) => GatewayResponse {
                status: upstream.status,
                body: if allows_body(method, upstream.status) {
                    upstream.body
                } else {
                    Bytes::new()
                },
                headers: upstream.headers,
            },
        }
    }
}

fn allows_body(method: &Method, status: StatusCode) -> bool {
    method != Method::HEAD && status != StatusCode::NO_CONTENT && status != StatusCode::NOT_MODIFIED
}

/// Runs one call through the matched rule.
#[derive(Debug)]
pub struct ProxyTransformer<'a> {
    auth: &'a AuthHandlerRegistry,
    upstream: &'a dyn UpstreamClient,
    source: &'a Source,
    rule: &'a Rule,
}

impl<'a> ProxyTransformer<'a> {
    /// Create a transformer for a matched source and rule.
    pub fn new(
        auth: &'a AuthHandlerRegistry,
        upstream: &'a dyn UpstreamClient,
        source: &'a Source,
        rule: &'a Rule,
    ) -> Self {
        Self {
            auth,
            upstream,
            source,
            rule,
        }
    }

    /// Create a transformer from a [`MatchResult`].
    pub fn for_match(
        auth: &'a AuthHandlerRegistry,
        upstream: &'a dyn UpstreamClient,
        matched: &MatchResult<'a>,
    ) -> Self {
        Self::new(auth, upstream, matched.source, matched.rule)
    }

    /// Builds the upstream request, applies source auth and runs every
    /// request action.
    pub async fn transform_request(
        &self,
        inbound: &InboundRequest,
        config: Arc<GatewayConfig>,
        secrets: Arc<dyn SecretsResolver>,
        path_params: Params,
    ) -> GatewayResult<ActionContext> {
        let request = build_request(&self.source.host, inbound)?;
        let mut ctx = ActionContext::new(config, secrets, request, path_params);

        if let Some(spec) = &self.source.auth {
            self.auth
                .dispatch(spec, &mut ctx.request, ctx.secrets.as_ref(), &ctx.config)
                .await?;
        }

        for action in &self.rule.actions {
            action.on_request(&mut ctx).await?;
        }
        Ok(ctx)
    }

    /// Sends the request upstream within `timeout`.
    pub async fn forward(&self, request: &ProxyRequest, timeout: Duration) -> GatewayResult<UpstreamResponse> {
        if !SUPPORTED_METHODS.contains(&request.method) {
            return Err(GatewayError::unsupported_method(request.method.as_str()));
        }

        tracing::debug!(upstream = %request.uri, "forwarding request");
        match tokio::time::timeout(timeout, self.upstream.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::timeout(timeout)),
        }
    }

    /// Parses the upstream response and runs every response action.
    pub async fn transform_response(
        &self,
        ctx: &mut ActionContext,
        upstream: UpstreamResponse,
    ) -> GatewayResult<Outcome> {
        let headers = filter_response_headers(&upstream.headers);

        let json = if upstream.body.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice(&upstream.body) {
                Ok(json) => json,
                Err(_) if !upstream.status.is_success() => {
                    tracing::debug!(status = upstream.status.as_u16(), "passing non-JSON upstream error through");
                    return Ok(Outcome::Verbatim(UpstreamResponse { headers, ..upstream }));
                }
                Err(e) => {
                    return Err(GatewayError::transformation(
                        "Error transforming response: upstream body is not valid JSON",
                        e,
                    ))
                }
            }
        };

        ctx.response = ProxyResponse {
            status: upstream.status,
            headers,
            json,
        };
        for action in &self.rule.actions {
            action.on_response(ctx).await?;
        }

        Ok(Outcome::Transformed(std::mem::take(&mut ctx.response)))
    }
}

fn build_request(host: &str, inbound: &InboundRequest) -> GatewayResult<ProxyRequest> {
    let json = if inbound.body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&inbound.body).map_err(|e| {
            GatewayError::transformation("Error transforming request: request body is not valid JSON", e)
        })?
    };

    Ok(ProxyRequest {
        method: inbound.method.clone(),
        uri: upstream_uri(host, &inbound.uri)?,
        headers: filter_request_headers(&inbound.headers),
        json,
    })
}
