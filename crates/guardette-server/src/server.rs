//! Gateway HTTP server.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use guardette_config::PolicyWatcher;
use guardette_core::gateway::error_response;
use guardette_core::{Gateway, GatewayError, GatewayResponse, InboundRequest};
use guardette_telemetry::render_metrics;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ServerError, ServerResult};

/// Path of the meta endpoint.
pub const META_PATH: &str = "/_guardette/meta";

/// Path of the metrics endpoint.
pub const METRICS_PATH: &str = "/_guardette/metrics";

const WATCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Serves a [`Gateway`] over HTTP/1.1.
#[derive(Debug, Clone)]
pub struct GatewayServer {
    gateway: Arc<Gateway>,
}

impl GatewayServer {
    /// Create a server for `gateway`.
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// The served gateway.
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Binds `addr` and serves until `shutdown` resolves.
    pub async fn run(self, addr: SocketAddr, shutdown: impl Future<Output = ()>) -> ServerResult<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!(addr = %addr, "guardette listening");
        self.serve(listener, shutdown).await
    }

    /// Serves connections from `listener` until `shutdown` resolves.
    ///
    /// In-flight connections are not awaited on shutdown.
    pub async fn serve(self, listener: TcpListener, shutdown: impl Future<Output = ()>) -> ServerResult<()> {
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
                () = &mut shutdown => {
                    info!("shutting down");
                    return Ok(());
                }
            };

            let gateway = Arc::clone(&self.gateway);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let gateway = Arc::clone(&gateway);
                    async move { Ok::<_, Infallible>(handle_request(&gateway, req).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(error = %e, peer = %peer, "connection error");
                }
            });
        }
    }
}

/// Routes one HTTP request: the meta and metrics endpoints, otherwise the
/// proxy pipeline.
pub async fn handle_request<B>(gateway: &Gateway, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    if req.method() == Method::GET {
        match req.uri().path() {
            META_PATH => return json_response(StatusCode::OK, &gateway.meta()),
            METRICS_PATH => return metrics_response(),
            _ => {}
        }
    }

    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            let err = GatewayError::transformation("Error transforming request: failed to read body", e);
            return into_http(error_response(&err, &Uuid::now_v7().to_string()));
        }
    };

    let inbound = InboundRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
    };
    into_http(gateway.handle(inbound).await)
}

fn into_http(response: GatewayResponse) -> Response<Full<Bytes>> {
    let mut http = Response::new(Full::new(response.body));
    *http.status_mut() = response.status;
    *http.headers_mut() = response.headers;
    http
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn metrics_response() -> Response<Full<Bytes>> {
    match render_metrics() {
        Some(text) => {
            let mut response = Response::new(Full::new(Bytes::from(text)));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        None => json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &serde_json::json!({"error": {"message": "metrics recorder not installed"}}),
        ),
    }
}

/// Reloads the gateway policy whenever `path` changes.
///
/// An invalid document is logged and the current policy stays in effect.
pub fn spawn_policy_watcher(gateway: Arc<Gateway>, path: PathBuf) -> ServerResult<JoinHandle<()>> {
    let mut watcher = PolicyWatcher::new(&path, WATCH_DEBOUNCE)?;
    info!(path = %path.display(), "watching policy for changes");

    Ok(tokio::spawn(async move {
        while let Some(changed) = watcher.next().await {
            match gateway.reload_policy_file(&changed) {
                Ok(()) => {}
                Err(e) => warn!(
                    error = %e,
                    path = %changed.display(),
                    "policy reload rejected, keeping the current policy"
                ),
            }
        }
    }))
}
