//! `redact` and `nullify`: overwrite matched values.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::{compile_paths, parse_fields, Action, ActionContext};
use crate::error::{GatewayResult, PolicyResult};
use crate::jsonpath::JsonPath;
use crate::BoxFuture;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsFields {
    json_paths: Vec<String>,
}

/// Replaces matched values with the redaction token.
#[derive(Debug)]
pub struct Redact {
    paths: Vec<Arc<JsonPath>>,
}

impl Redact {
    /// Registered kind.
    pub const KIND: &'static str = "redact";

    /// Builds the action from its policy fields.
    pub fn from_fields(fields: Value) -> PolicyResult<Self> {
        let fields: PathsFields = parse_fields(Self::KIND, fields)?;
        Ok(Self {
            paths: compile_paths(Self::KIND, &fields.json_paths)?,
        })
    }
}

impl Action for Redact {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn on_response<'a>(&'a self, ctx: &'a mut ActionContext) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            let token = Value::String(ctx.config.redact_token.clone());
            for path in &self.paths {
                path.replace(&mut ctx.response.json, &token);
            }
            Ok(())
        })
    }
}

/// Replaces matched values with `null`.
#[derive(Debug)]
pub struct Nullify {
    paths: Vec<Arc<JsonPath>>,
}

impl Nullify {
    /// Registered kind.
    pub const KIND: &'static str = "nullify";

    /// Builds the action from its policy fields.
    pub fn from_fields(fields: Value) -> PolicyResult<Self> {
        let fields: PathsFields = parse_fields(Self::KIND, fields)?;
        Ok(Self {
            paths: compile_paths(Self::KIND, &fields.json_paths)?,
        })
    }
}

impl Action for Nullify {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn on_response<'a>(&'a self, ctx: &'a mut ActionContext) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            for path in &self.paths {
                path.replace(&mut ctx.response.json, &Value::Null);
            }
            Ok(())
        })
    }
}
