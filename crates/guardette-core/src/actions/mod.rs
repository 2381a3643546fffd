//! Pluggable data-transformation actions.
//!
//! Each rule in a policy carries an ordered list of actions. Before the
//! upstream call every action's [`Action::on_request`] runs; after it every
//! action's [`Action::on_response`] runs. Actions mutate the JSON payloads
//! held by the shared [`ActionContext`].
//!
//! Kinds are resolved through an [`ActionRegistry`] that is populated before
//! the policy is parsed and passed explicitly to the loader.
//!
//! # Example
//!
//! ```rust,ignore
//! use guardette_core::actions::{Action, ActionContext, ActionRegistry};
//!
//! let mut registry = ActionRegistry::with_defaults();
//! registry.register("drop_everything", |_fields| Ok(Arc::new(DropEverything)))?;
//! ```

mod pseudonymize;
mod redact;
mod pattern;
mod remove;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use guardette_config::GatewayConfig;
use guardette_router::Params;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult, PolicyError, PolicyResult};
use crate::jsonpath::{self, JsonPath};
use crate::proxy::{ProxyRequest, ProxyResponse};
use crate::secrets::SecretsResolver;
use crate::BoxFuture;

pub use pseudonymize::{pseudonymize_email, PseudonymizeEmail};
pub use redact::{Nullify, Redact};
pub use pattern::{FilterRegex, RedactRegex};
pub use remove::Remove;

/// Per-call state handed to every action.
#[derive(Debug)]
pub struct ActionContext {
    /// Gateway configuration.
    pub config: Arc<GatewayConfig>,
    /// Secrets resolver.
    pub secrets: Arc<dyn SecretsResolver>,
    /// The outgoing upstream request.
    pub request: ProxyRequest,
    /// The upstream response; an empty placeholder during the request phase.
    pub response: ProxyResponse,
    /// Parameters bound by the matched route.
    pub path_params: Params,
}

impl ActionContext {
    /// Create a context for a fresh call.
    pub fn new(
        config: Arc<GatewayConfig>,
        secrets: Arc<dyn SecretsResolver>,
        request: ProxyRequest,
        path_params: Params,
    ) -> Self {
        Self {
            config,
            secrets,
            request,
            response: ProxyResponse::default(),
            path_params,
        }
    }

    /// Compiles a JSON path through the process-wide cache.
    pub fn json_path(&self, expression: &str) -> GatewayResult<Arc<JsonPath>> {
        jsonpath::compile(expression).map_err(|e| GatewayError::transformation(e.to_string(), e))
    }
}

/// A transformation bound to a rule.
///
/// Implementations are immutable configuration; per-call state lives in the
/// [`ActionContext`]. Either hook may be left as the default no-op.
pub trait Action: Send + Sync + fmt::Debug {
    /// The registered kind.
    fn kind(&self) -> &'static str;

    /// Runs before the upstream call.
    fn on_request<'a>(&'a self, _ctx: &'a mut ActionContext) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Runs after the upstream call.
    fn on_response<'a>(&'a self, _ctx: &'a mut ActionContext) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Builds an action from its policy fields (the mapping without `kind`).
pub type ActionFactory = Box<dyn Fn(Value) -> PolicyResult<Arc<dyn Action>> + Send + Sync>;

/// Catalog of action kinds.
pub struct ActionRegistry {
    factories: HashMap<String, ActionFactory>,
}

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding the stock kinds.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert_default(Redact::KIND, Redact::from_fields);
        registry.insert_default(Nullify::KIND, Nullify::from_fields);
        registry.insert_default(Remove::KIND, Remove::from_fields);
        registry.insert_default(RedactRegex::KIND, RedactRegex::from_fields);
        registry.insert_default(FilterRegex::KIND, FilterRegex::from_fields);
        registry.insert_default(PseudonymizeEmail::KIND, PseudonymizeEmail::from_fields);
        registry
    }

    fn insert_default<A, F>(&mut self, kind: &str, build: F)
    where
        A: Action + 'static,
        F: Fn(Value) -> PolicyResult<A> + Send + Sync + 'static,
    {
        self.factories.insert(
            kind.to_string(),
            Box::new(move |fields| Ok(Arc::new(build(fields)?) as Arc<dyn Action>)),
        );
    }

    /// Registers a kind.
    ///
    /// # Errors
    ///
    /// Fails with [`PolicyError::DuplicateRegistration`] if `kind` is taken.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> PolicyResult<()>
    where
        F: Fn(Value) -> PolicyResult<Arc<dyn Action>> + Send + Sync + 'static,
    {
        let kind = kind.into();
        if self.factories.contains_key(&kind) {
            return Err(PolicyError::DuplicateRegistration {
                registry: "Action",
                kind,
            });
        }
        self.factories.insert(kind, Box::new(factory));
        Ok(())
    }

    /// Check whether a kind is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Builds an action from a policy mapping carrying `kind`.
    pub fn build(&self, route: &str, spec: &Value) -> PolicyResult<Arc<dyn Action>> {
        let Value::Object(map) = spec else {
            return Err(PolicyError::schema(format!(
                "actions in route '{route}' must be mappings"
            )));
        };

        let mut fields = map.clone();
        let kind = match fields.remove("kind") {
            Some(Value::String(kind)) => kind,
            Some(_) => {
                return Err(PolicyError::schema(format!(
                    "action `kind` in route '{route}' must be a string"
                )))
            }
            None => {
                return Err(PolicyError::MissingActionKind {
                    route: route.to_string(),
                })
            }
        };

        let factory = self
            .factories
            .get(&kind)
            .ok_or(PolicyError::UnknownAction { kind })?;
        factory(Value::Object(fields))
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Deserializes the fields of a stock action.
pub(crate) fn parse_fields<T: DeserializeOwned>(kind: &str, fields: Value) -> PolicyResult<T> {
    serde_json::from_value(fields).map_err(|e| PolicyError::invalid_action(kind, e.to_string()))
}

/// Compiles the `json_paths` of a stock action.
pub(crate) fn compile_paths(kind: &str, paths: &[String]) -> PolicyResult<Vec<Arc<JsonPath>>> {
    if paths.is_empty() {
        return Err(PolicyError::invalid_action(kind, "`json_paths` must not be empty"));
    }
    paths
        .iter()
        .map(|p| {
            jsonpath::compile(p).map_err(|e| PolicyError::InvalidJsonPath {
                expression: e.expression,
                reason: e.reason,
            })
        })
        .collect()
}
