//! Policy model and loader.
//!
//! A policy declares every upstream the gateway may reach:
//!
//! ```yaml
//! version: "1"
//! sources:
//!   - host: hacker-news.firebaseio.com
//!     auth: bearer_token:hn
//!     rules:
//!       - route: GET /v0/item/{id}.json
//!         actions:
//!           - kind: redact
//!             json_paths: ["$.by"]
//! ```
//!
//! Loading validates eagerly: an unknown action kind, invalid action fields,
//! duplicate hosts, a malformed `auth` value or an invalid route fails the
//! whole document. Loading never touches the network or the secret backend.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use guardette_router::RouteSpec;
use serde::Deserialize;
use serde_json::Value;

use crate::actions::{Action, ActionRegistry};
use crate::auth::{AuthHandlerRegistry, AuthSpec};
use crate::error::{PolicyError, PolicyResult};

#[derive(Debug, Deserialize)]
struct PolicyDocument {
    version: String,
    sources: Vec<SourceDocument>,
}

#[derive(Debug, Deserialize)]
struct SourceDocument {
    host: String,
    #[serde(default)]
    auth: Option<String>,
    rules: Vec<RuleDocument>,
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    route: String,
    #[serde(default)]
    actions: Option<Vec<Value>>,
}

/// A validated policy.
#[derive(Clone)]
pub struct Policy {
    version: String,
    sources: Vec<Source>,
    raw: Value,
}

/// One upstream host.
#[derive(Debug, Clone)]
pub struct Source {
    /// Upstream DNS name.
    pub host: String,
    /// Credential strategy, if any.
    pub auth: Option<AuthSpec>,
    /// Routable endpoints in declaration order.
    pub rules: Vec<Rule>,
}

/// One routable endpoint.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Compiled `METHOD /path` declaration.
    pub route: RouteSpec,
    /// Actions in declaration order.
    pub actions: Vec<Arc<dyn Action>>,
}

impl Policy {
    /// Loads a `.yml`, `.yaml` or `.json` document.
    pub fn load(path: impl AsRef<Path>, actions: &ActionRegistry) -> PolicyResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let is_json = match extension.as_deref() {
            Some("yml" | "yaml") => false,
            Some("json") => true,
            _ => return Err(PolicyError::UnsupportedFormat { path: display }),
        };

        let text = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: display,
            source,
        })?;

        if is_json {
            Self::from_json_str(&text, actions)
        } else {
            Self::from_yaml_str(&text, actions)
        }
    }

    /// Parses a YAML document.
    pub fn from_yaml_str(text: &str, actions: &ActionRegistry) -> PolicyResult<Self> {
        let raw: Value = serde_yaml::from_str(text).map_err(|e| PolicyError::Parse {
            format: "YAML",
            message: e.to_string(),
        })?;
        Self::from_value(raw, actions)
    }

    /// Parses a JSON document.
    pub fn from_json_str(text: &str, actions: &ActionRegistry) -> PolicyResult<Self> {
        let raw: Value = serde_json::from_str(text).map_err(|e| PolicyError::Parse {
            format: "JSON",
            message: e.to_string(),
        })?;
        Self::from_value(raw, actions)
    }

    /// Validates an already-parsed document.
    pub fn from_value(raw: Value, actions: &ActionRegistry) -> PolicyResult<Self> {
        if !raw.is_object() {
            return Err(PolicyError::schema("policy document must be a mapping"));
        }
        let document: PolicyDocument =
            serde_json::from_value(raw.clone()).map_err(|e| PolicyError::schema(e.to_string()))?;

        check_unique_hosts(&document.sources)?;

        let sources = document
            .sources
            .into_iter()
            .map(|source| build_source(source, actions))
            .collect::<PolicyResult<Vec<_>>>()?;

        Ok(Self {
            version: document.version,
            sources,
            raw,
        })
    }

    /// Document format version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Sources in declaration order.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Finds the source declared for `host`.
    pub fn source(&self, host: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.host == host)
    }

    /// The document as loaded.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Checks that every declared auth kind has a registered handler.
    pub fn check_auth_kinds(&self, auth: &AuthHandlerRegistry) -> PolicyResult<()> {
        for source in &self.sources {
            if let Some(spec) = &source.auth {
                if !auth.contains(&spec.kind) {
                    return Err(PolicyError::UnknownAuthKind {
                        kind: spec.kind.clone(),
                        host: source.host.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("version", &self.version)
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

fn check_unique_hosts(sources: &[SourceDocument]) -> PolicyResult<()> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();

    for source in sources {
        if !seen.insert(source.host.as_str()) && !duplicates.contains(&source.host) {
            duplicates.push(source.host.clone());
        }
    }

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(PolicyError::DuplicateHosts { hosts: duplicates })
    }
}

fn build_source(source: SourceDocument, actions: &ActionRegistry) -> PolicyResult<Source> {
    let auth = match source.auth.as_deref() {
        None | Some("") => None,
        Some(spec) => Some(AuthSpec::parse(spec)?),
    };

    let rules = source
        .rules
        .into_iter()
        .map(|rule| -> PolicyResult<Rule> {
            let route = RouteSpec::parse(&rule.route)?;
            let actions = rule
                .actions
                .unwrap_or_default()
                .iter()
                .map(|spec| actions.build(&rule.route, spec))
                .collect::<PolicyResult<Vec<_>>>()?;
            Ok(Rule { route, actions })
        })
        .collect::<PolicyResult<Vec<_>>>()?;

    Ok(Source {
        host: source.host,
        auth,
        rules,
    })
}
