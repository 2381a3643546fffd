//! Request and response envelopes plus the upstream HTTP client.

use std::fmt;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use http::uri::{PathAndQuery, Scheme};
use http::{Method, StatusCode, Uri};
use reqwest::Client;
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};
use crate::BoxFuture;

/// A call as received by the HTTP binding.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// HTTP method.
    pub method: Method,
    /// Request target (path and query).
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
    /// Raw request body.
    pub body: Bytes,
}

impl InboundRequest {
    /// Create a bodiless request.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Request path without the query.
    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

/// The outgoing upstream request, mutated by auth handlers and actions.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute upstream URL.
    pub uri: Uri,
    /// Headers sent upstream.
    pub headers: HeaderMap,
    /// Parsed JSON payload; `Null` when the call has no body.
    pub json: Value,
}

impl ProxyRequest {
    /// Create a bodiless request.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            json: Value::Null,
        }
    }
}

/// The upstream response after parsing, mutated by response actions.
///
/// During the request phase it is an empty placeholder.
#[derive(Debug, Clone, Default)]
pub struct ProxyResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Headers returned to the caller.
    pub headers: HeaderMap,
    /// Parsed JSON payload.
    pub json: Value,
}

/// Raw upstream response as received.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Create a response with the given status and body.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Create a JSON response.
    pub fn json(status: StatusCode, body: &Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            status,
            headers,
            body: Bytes::from(body.to_string()),
        }
    }
}

/// Final response handed back to the HTTP binding.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl GatewayResponse {
    /// Parse the body as JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Check whether the gateway itself produced this response.
    pub fn is_proxy_error(&self) -> bool {
        self.headers.contains_key(&crate::headers::PROXY_ERROR_HEADER)
    }
}

/// Builds the upstream URL: `https`, the declared host, the inbound path and
/// query.
pub fn upstream_uri(host: &str, inbound: &Uri) -> GatewayResult<Uri> {
    let path_and_query = inbound
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    Uri::builder()
        .scheme(Scheme::HTTPS)
        .authority(host)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| GatewayError::transformation(format!("Invalid upstream host: {host}"), e))
}

/// Sends a prepared request to the upstream API.
pub trait UpstreamClient: Send + Sync + fmt::Debug {
    /// Issue the call and read the full response.
    fn send<'a>(&'a self, request: &'a ProxyRequest) -> BoxFuture<'a, GatewayResult<UpstreamResponse>>;
}

/// Production upstream client backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestUpstream {
    client: Client,
}

impl ReqwestUpstream {
    /// Create a client with pooled connections.
    pub fn new() -> GatewayResult<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| GatewayError::upstream("failed to create HTTP client", e))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl UpstreamClient for ReqwestUpstream {
    fn send<'a>(&'a self, request: &'a ProxyRequest) -> BoxFuture<'a, GatewayResult<UpstreamResponse>> {
        Box::pin(async move {
            let url = request.uri.to_string();

            let mut builder = match request.method {
                Method::GET => self.client.get(&url),
                Method::POST => self.client.post(&url),
                Method::PUT => self.client.put(&url),
                Method::DELETE => self.client.delete(&url),
                Method::PATCH => self.client.patch(&url),
                Method::HEAD => self.client.head(&url),
                Method::OPTIONS => self.client.request(Method::OPTIONS, &url),
                _ => return Err(GatewayError::unsupported_method(request.method.as_str())),
            };

            builder = builder.headers(request.headers.clone());
            if !request.json.is_null() {
                builder = builder.json(&request.json);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| GatewayError::upstream(format!("upstream request failed: {url}"), e))?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| GatewayError::upstream("failed to read upstream body", e))?;

            Ok(UpstreamResponse {
                status,
                headers,
                body,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_uri_keeps_path_and_query() {
        let inbound: Uri = "/v0/item/1.json?print=pretty".parse().unwrap();
        let uri = upstream_uri("hacker-news.firebaseio.com", &inbound).unwrap();
        assert_eq!(
            uri.to_string(),
            "https://hacker-news.firebaseio.com/v0/item/1.json?print=pretty"
        );
    }

    #[test]
    fn test_upstream_uri_forces_https() {
        let inbound: Uri = "http://localhost:8080/item/1".parse().unwrap();
        let uri = upstream_uri("api.example.com", &inbound).unwrap();
        assert_eq!(uri.scheme_str(), Some("https"));
        assert_eq!(uri.host(), Some("api.example.com"));
        assert_eq!(uri.path(), "/item/1");
    }

    #[test]
    fn test_upstream_uri_rejects_bad_host() {
        let inbound: Uri = "/".parse().unwrap();
        let err = upstream_uri("not a host", &inbound).unwrap_err();
        assert_eq!(err.category(), "transformation");
    }

    #[test]
    fn test_placeholder_response() {
        let response = ProxyResponse::default();
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.json.is_null());
        assert!(response.headers.is_empty());
    }
}
