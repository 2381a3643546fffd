//! `remove`: delete matched entries from their parents.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::{compile_paths, parse_fields, Action, ActionContext};
use crate::error::{GatewayResult, PolicyResult};
use crate::jsonpath::JsonPath;
use crate::BoxFuture;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoveFields {
    json_paths: Vec<String>,
}

/// Deletes matched entries entirely.
#[derive(Debug)]
pub struct Remove {
    paths: Vec<Arc<JsonPath>>,
}

impl Remove {
    /// Registered kind.
    pub const KIND: &'static str = "remove";

    /// Builds the action from its policy fields.
    pub fn from_fields(fields: Value) -> PolicyResult<Self> {
        let fields: RemoveFields = parse_fields(Self::KIND, fields)?;
        Ok(Self {
            paths: compile_paths(Self::KIND, &fields.json_paths)?,
        })
    }
}

impl Action for Remove {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn on_response<'a>(&'a self, ctx: &'a mut ActionContext) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            for path in &self.paths {
                let removed = path.remove(&mut ctx.response.json);
                tracing::trace!(path = %path, removed, "removed entries");
            }
            Ok(())
        })
    }
}
