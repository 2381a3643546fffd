//! Shared fixtures for gateway integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use guardette_config::{GatewayConfig, MapStore};
use guardette_core::proxy::{ProxyRequest, UpstreamClient, UpstreamResponse};
use guardette_core::{BoxFuture, Gateway, GatewayResult, InboundRequest, Policy};
use guardette_core::actions::ActionRegistry;
use guardette_core::secrets::ConfigSecretsResolver;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use http::{Method, StatusCode};
use parking_lot::Mutex;

pub const CLIENT_SECRET: &str = "test-client-secret";

/// Canned upstream that records every request it receives.
#[derive(Debug)]
pub struct MockUpstream {
    response: Mutex<UpstreamResponse>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ProxyRequest>>,
}

impl MockUpstream {
    pub fn new(response: UpstreamResponse) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(response),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn json(status: u16, body: serde_json::Value) -> Arc<Self> {
        Self::new(UpstreamResponse::json(
            StatusCode::from_u16(status).unwrap(),
            &body,
        ))
    }

    pub fn delayed(response: UpstreamResponse, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(response),
            delay: Some(delay),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_response(&self, response: UpstreamResponse) {
        *self.response.lock() = response;
    }

    pub fn calls(&self) -> Vec<ProxyRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl UpstreamClient for MockUpstream {
    fn send<'a>(&'a self, request: &'a ProxyRequest) -> BoxFuture<'a, GatewayResult<UpstreamResponse>> {
        Box::pin(async move {
            self.calls.lock().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.response.lock().clone())
        })
    }
}

pub fn config_with(store: MapStore) -> GatewayConfig {
    GatewayConfig::from_store(Arc::new(store.with("CLIENT_SECRET", CLIENT_SECRET))).unwrap()
}

pub async fn gateway(policy_yaml: &str, config: GatewayConfig, upstream: Arc<MockUpstream>) -> Gateway {
    let config = Arc::new(config);
    let policy = Policy::from_yaml_str(policy_yaml, &ActionRegistry::with_defaults()).unwrap();
    Gateway::builder(Arc::clone(&config))
        .policy(policy)
        .secrets(Arc::new(ConfigSecretsResolver::new(Arc::clone(&config))))
        .upstream(upstream)
        .build()
        .await
        .unwrap()
}

pub fn request(method: Method, uri: &str, host: &str) -> InboundRequest {
    InboundRequest::new(method, uri.parse().unwrap())
        .with_header(AUTHORIZATION, HeaderValue::from_static(CLIENT_SECRET))
        .with_header(
            HeaderName::from_static("x-guardette-host"),
            HeaderValue::from_str(host).unwrap(),
        )
}
