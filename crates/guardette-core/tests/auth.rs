//! Auth handler dispatch against configuration-backed secrets and a local
//! token endpoint.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use guardette_config::{GatewayConfig, MapStore};
use guardette_core::auth::{AuthHandlerRegistry, AuthSpec, GcpServiceAccount};
use guardette_core::proxy::ProxyRequest;
use guardette_core::secrets::ConfigSecretsResolver;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use http::Method;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

const SERVICE_ACCOUNT_KEY: &str = include_str!("fixtures/test_service_account.pem");
const CLIENT_EMAIL: &str = "gateway@test-project.iam.gserviceaccount.com";

fn config(store: MapStore) -> Arc<GatewayConfig> {
    Arc::new(GatewayConfig::from_store(Arc::new(store)).unwrap())
}

fn outgoing() -> ProxyRequest {
    ProxyRequest::new(Method::GET, "https://www.googleapis.com/drive/v3/files".parse().unwrap())
}

/// Serves one canned HTTP response per accepted connection and reports each
/// request body.
async fn token_endpoint(status: u16, body: Value) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let request_body = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break String::new();
                }
                buf.extend_from_slice(&chunk[..n]);

                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let content_length = text[..split]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    let body = &text[split + 4..];
                    if body.len() >= content_length {
                        break body.to_string();
                    }
                }
            };
            let _ = tx.send(request_body);

            let payload = body.to_string();
            let response = format!(
                "HTTP/1.1 {status} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{payload}",
                payload.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });

    (format!("http://{addr}/token"), rx)
}

fn gcp_registry(token_uri: &str) -> AuthHandlerRegistry {
    let mut registry = AuthHandlerRegistry::new();
    registry
        .register(
            GcpServiceAccount::KIND,
            &["secret"],
            &["scopes"],
            GcpServiceAccount::with_client(reqwest::Client::new(), token_uri),
        )
        .unwrap();
    registry
}

fn gcp_store() -> MapStore {
    let key = json!({
        "type": "service_account",
        "client_email": CLIENT_EMAIL,
        "private_key": SERVICE_ACCOUNT_KEY,
    });
    MapStore::new()
        .with("AUTH_GCP_SERVICE_ACCOUNT_DRIVE_SECRET", key.to_string())
        .with(
            "AUTH_GCP_SERVICE_ACCOUNT_DRIVE_SCOPES",
            "https://www.googleapis.com/auth/drive.readonly, https://www.googleapis.com/auth/admin.directory.user.readonly",
        )
}

fn form_field<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    body.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}

fn jwt_claims(assertion: &str) -> Value {
    let payload = assertion.split('.').nth(1).unwrap();
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
}

#[tokio::test]
async fn basic_auth_reads_prefixed_secrets() {
    let config = config(
        MapStore::new()
            .with("AUTH_BASIC_AUTH_USERNAME", "Aladdin")
            .with("AUTH_BASIC_AUTH_PASSWORD", "open sesame"),
    );
    let secrets = ConfigSecretsResolver::new(Arc::clone(&config));
    let registry = AuthHandlerRegistry::with_defaults().unwrap();

    let mut request = outgoing();
    registry
        .dispatch(&AuthSpec::parse("basic_auth").unwrap(), &mut request, &secrets, &config)
        .await
        .unwrap();

    assert_eq!(
        request.headers.get(AUTHORIZATION).unwrap(),
        "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
    );
}

#[tokio::test]
async fn bearer_token_uses_the_subkind_namespace() {
    let config = config(
        MapStore::new()
            .with("AUTH_BEARER_TOKEN_SECRET", "wrong")
            .with("AUTH_BEARER_TOKEN_HN_SECRET", "hn-token"),
    );
    let secrets = ConfigSecretsResolver::new(Arc::clone(&config));
    let registry = AuthHandlerRegistry::with_defaults().unwrap();

    let mut request = outgoing();
    registry
        .dispatch(&AuthSpec::parse("bearer_token:hn").unwrap(), &mut request, &secrets, &config)
        .await
        .unwrap();

    assert_eq!(request.headers.get(AUTHORIZATION).unwrap(), "Bearer hn-token");
}

#[tokio::test]
async fn missing_secret_is_a_configuration_error() {
    let config = config(MapStore::new());
    let secrets = ConfigSecretsResolver::new(Arc::clone(&config));
    let registry = AuthHandlerRegistry::with_defaults().unwrap();

    let mut request = outgoing();
    let err = registry
        .dispatch(&AuthSpec::parse("bearer_token").unwrap(), &mut request, &secrets, &config)
        .await
        .unwrap_err();

    assert_eq!(err.category(), "configuration");
    assert_eq!(err.details(), "Missing secret for key: 'AUTH_BEARER_TOKEN_SECRET'.");
    assert!(request.headers.get(AUTHORIZATION).is_none());
}

#[tokio::test]
async fn gcp_service_account_exchanges_a_signed_assertion() {
    let (token_uri, mut bodies) = token_endpoint(200, json!({"access_token": "ya29.test", "expires_in": 3599})).await;
    let config = config(gcp_store());
    let secrets = ConfigSecretsResolver::new(Arc::clone(&config));
    let registry = gcp_registry(&token_uri);

    let mut request = outgoing();
    request.headers.insert(
        HeaderName::from_static("x-guardette-gcp-impersonate-sub"),
        HeaderValue::from_static("admin@corp.io"),
    );
    registry
        .dispatch(
            &AuthSpec::parse("gcp_service_account:drive").unwrap(),
            &mut request,
            &secrets,
            &config,
        )
        .await
        .unwrap();

    assert_eq!(request.headers.get(AUTHORIZATION).unwrap(), "Bearer ya29.test");
    assert!(request.headers.get("x-guardette-gcp-impersonate-sub").is_none());

    let body = bodies.recv().await.unwrap();
    assert_eq!(
        form_field(&body, "grant_type"),
        Some("urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer")
    );

    let claims = jwt_claims(form_field(&body, "assertion").unwrap());
    assert_eq!(claims["iss"], CLIENT_EMAIL);
    assert_eq!(claims["sub"], "admin@corp.io");
    assert_eq!(claims["aud"], token_uri.as_str());
    assert_eq!(
        claims["scope"],
        "https://www.googleapis.com/auth/drive.readonly https://www.googleapis.com/auth/admin.directory.user.readonly"
    );
    assert_eq!(
        claims["exp"].as_u64().unwrap() - claims["iat"].as_u64().unwrap(),
        3600
    );
}

#[tokio::test]
async fn gcp_subject_defaults_to_the_service_account() {
    let (token_uri, mut bodies) = token_endpoint(200, json!({"access_token": "ya29.self"})).await;
    let config = config(gcp_store());
    let secrets = ConfigSecretsResolver::new(Arc::clone(&config));

    let mut request = outgoing();
    gcp_registry(&token_uri)
        .dispatch(
            &AuthSpec::parse("gcp_service_account:drive").unwrap(),
            &mut request,
            &secrets,
            &config,
        )
        .await
        .unwrap();

    let body = bodies.recv().await.unwrap();
    let claims = jwt_claims(form_field(&body, "assertion").unwrap());
    assert_eq!(claims["sub"], CLIENT_EMAIL);
}

#[tokio::test]
async fn gcp_token_endpoint_failure_reports_the_status() {
    let (token_uri, _bodies) = token_endpoint(403, json!({"error": "access_denied"})).await;
    let config = config(gcp_store());
    let secrets = ConfigSecretsResolver::new(Arc::clone(&config));

    let mut request = outgoing();
    let err = gcp_registry(&token_uri)
        .dispatch(
            &AuthSpec::parse("gcp_service_account:drive").unwrap(),
            &mut request,
            &secrets,
            &config,
        )
        .await
        .unwrap_err();

    assert_eq!(err.category(), "auth_handler");
    assert_eq!(
        err.to_string(),
        "gcp_service_account: encountered error http status trying to obtain access token (403)"
    );
    assert!(request.headers.get(AUTHORIZATION).is_none());
}

#[tokio::test]
async fn gcp_requires_scopes() {
    let key = json!({"client_email": CLIENT_EMAIL, "private_key": SERVICE_ACCOUNT_KEY});
    let config = config(MapStore::new().with("AUTH_GCP_SERVICE_ACCOUNT_SECRET", key.to_string()));
    let secrets = ConfigSecretsResolver::new(Arc::clone(&config));

    let mut request = outgoing();
    let err = gcp_registry("http://127.0.0.1:9/token")
        .dispatch(&AuthSpec::parse("gcp_service_account").unwrap(), &mut request, &secrets, &config)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "gcp_service_account: `scopes` is required.");
}

#[tokio::test]
async fn gcp_rejects_malformed_credentials() {
    let config = config(
        MapStore::new()
            .with("AUTH_GCP_SERVICE_ACCOUNT_SECRET", "not json")
            .with("AUTH_GCP_SERVICE_ACCOUNT_SCOPES", "scope"),
    );
    let secrets = ConfigSecretsResolver::new(Arc::clone(&config));

    let mut request = outgoing();
    let err = gcp_registry("http://127.0.0.1:9/token")
        .dispatch(&AuthSpec::parse("gcp_service_account").unwrap(), &mut request, &secrets, &config)
        .await
        .unwrap_err();

    assert_eq!(err.category(), "auth_handler");
}

#[test]
fn registry_lists_stock_kinds() {
    let registry = AuthHandlerRegistry::with_defaults().unwrap();
    assert!(registry.contains("basic_auth"));
    assert!(!registry.contains("oauth_magic"));
}
