//! Policy loading from disk and custom action registration.

mod common;

use std::io::Write;
use std::sync::Arc;

use common::{config_with, request, MockUpstream};
use guardette_config::MapStore;
use guardette_core::actions::{Action, ActionContext, ActionRegistry};
use guardette_core::secrets::ConfigSecretsResolver;
use guardette_core::{BoxFuture, Gateway, GatewayResult, Policy, PolicyError};
use http::Method;
use serde_json::{json, Value};

const YAML: &str = r#"
version: "1"
sources:
  - host: api.example.com
    auth: basic_auth
    rules:
      - route: GET /users/{id:int}
        actions:
          - kind: redact
            json_paths: ["$.email", "$..ssn"]
"#;

fn policy_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_yaml_and_json_by_extension() {
    let registry = ActionRegistry::with_defaults();

    for suffix in [".yml", ".yaml"] {
        let file = policy_file(suffix, YAML);
        let policy = Policy::load(file.path(), &registry).unwrap();
        assert_eq!(policy.sources()[0].host, "api.example.com");
    }

    let json = r#"{"version": "1", "sources": [{"host": "api.example.com", "rules": [{"route": "GET /ping"}]}]}"#;
    let file = policy_file(".json", json);
    let policy = Policy::load(file.path(), &registry).unwrap();
    assert_eq!(policy.sources()[0].rules[0].route.method(), http::Method::GET);
}

#[test]
fn rejects_unknown_extensions() {
    let file = policy_file(".toml", YAML);
    let err = Policy::load(file.path(), &ActionRegistry::with_defaults()).unwrap_err();
    assert!(matches!(err, PolicyError::UnsupportedFormat { .. }));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Policy::load(dir.path().join("absent.yml"), &ActionRegistry::with_defaults()).unwrap_err();
    assert!(matches!(err, PolicyError::Io { .. }));
}

#[test]
fn invalid_action_fields_fail_the_document() {
    let registry = ActionRegistry::with_defaults();

    let missing_paths = r#"{"version": "1", "sources": [{"host": "a", "rules": [
        {"route": "GET /x", "actions": [{"kind": "redact"}]}
    ]}]}"#;
    assert!(matches!(
        Policy::from_json_str(missing_paths, &registry),
        Err(PolicyError::InvalidAction { .. })
    ));

    let bad_path = r#"{"version": "1", "sources": [{"host": "a", "rules": [
        {"route": "GET /x", "actions": [{"kind": "nullify", "json_paths": ["$.a[?("]}]}
    ]}]}"#;
    assert!(matches!(
        Policy::from_json_str(bad_path, &registry),
        Err(PolicyError::InvalidJsonPath { .. })
    ));

    let bad_regex = r#"{"version": "1", "sources": [{"host": "a", "rules": [
        {"route": "GET /x", "actions": [{"kind": "redact_regex", "json_paths": ["$.a"], "regex_pattern": "("}]}
    ]}]}"#;
    assert!(matches!(
        Policy::from_json_str(bad_regex, &registry),
        Err(PolicyError::InvalidAction { .. })
    ));

    let no_kind = r#"{"version": "1", "sources": [{"host": "a", "rules": [
        {"route": "GET /x", "actions": [{"json_paths": ["$.a"]}]}
    ]}]}"#;
    assert!(matches!(
        Policy::from_json_str(no_kind, &registry),
        Err(PolicyError::MissingActionKind { .. })
    ));
}

#[derive(Debug)]
struct Stamp {
    field: String,
}

impl Action for Stamp {
    fn kind(&self) -> &'static str {
        "stamp"
    }

    fn on_request<'a>(&'a self, ctx: &'a mut ActionContext) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            if let Value::Object(map) = &mut ctx.request.json {
                map.insert(self.field.clone(), Value::Bool(true));
            }
            Ok(())
        })
    }
}

fn stamp_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::with_defaults();
    registry
        .register("stamp", |fields: Value| {
            let field = fields
                .get("field")
                .and_then(Value::as_str)
                .ok_or_else(|| PolicyError::invalid_action("stamp", "`field` is required"))?
                .to_string();
            Ok(Arc::new(Stamp { field }) as Arc<dyn Action>)
        })
        .unwrap();
    registry
}

#[test]
fn custom_actions_register_by_kind() {
    let mut registry = stamp_registry();

    let doc = r#"{"version": "1", "sources": [{"host": "a", "rules": [
        {"route": "POST /x", "actions": [{"kind": "stamp", "field": "audited"}]}
    ]}]}"#;
    let policy = Policy::from_json_str(doc, &registry).unwrap();
    assert_eq!(policy.sources()[0].rules[0].actions[0].kind(), "stamp");

    let err = registry
        .register("redact", |_fields: Value| -> Result<Arc<dyn Action>, PolicyError> {
            Err(PolicyError::schema("unused"))
        })
        .unwrap_err();
    assert_eq!(err.to_string(), "Action already exists: 'redact'");
}

#[tokio::test]
async fn request_hooks_run_before_forwarding() {
    let registry = stamp_registry();
    let doc = r#"{"version": "1", "sources": [{"host": "api.example.com", "rules": [
        {"route": "POST /orders", "actions": [{"kind": "stamp", "field": "audited"}]}
    ]}]}"#;
    let policy = Policy::from_json_str(doc, &registry).unwrap();

    let config = Arc::new(config_with(MapStore::new()));
    let upstream = MockUpstream::json(201, json!({"ok": true}));
    let gateway = Gateway::builder(Arc::clone(&config))
        .policy(policy)
        .actions(registry)
        .secrets(Arc::new(ConfigSecretsResolver::new(Arc::clone(&config))))
        .upstream(upstream.clone())
        .build()
        .await
        .unwrap();

    let response = gateway
        .handle(request(Method::POST, "/orders", "api.example.com").with_body(r#"{"item": 7}"#))
        .await;

    assert_eq!(response.status.as_u16(), 201);
    assert_eq!(upstream.calls()[0].json, json!({"item": 7, "audited": true}));
}
