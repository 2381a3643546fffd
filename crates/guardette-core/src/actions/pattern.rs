//! `redact_regex` and `filter_regex`: pattern-driven rewrites of string values.
//!
//! Patterns always match case-insensitively. Non-string matches are skipped.

use std::sync::Arc;

use regex::{NoExpand, Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;

use super::{compile_paths, parse_fields, Action, ActionContext};
use crate::error::{GatewayResult, PolicyError, PolicyResult};
use crate::jsonpath::JsonPath;
use crate::BoxFuture;

fn compile_pattern(kind: &str, pattern: &str) -> PolicyResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| PolicyError::invalid_action(kind, format!("invalid `regex_pattern`: {e}")))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RedactRegexFields {
    json_paths: Vec<String>,
    regex_pattern: String,
}

/// Substitutes every pattern match with the redaction token.
#[derive(Debug)]
pub struct RedactRegex {
    paths: Vec<Arc<JsonPath>>,
    pattern: Regex,
}

impl RedactRegex {
    /// Registered kind.
    pub const KIND: &'static str = "redact_regex";

    /// Builds the action from its policy fields.
    pub fn from_fields(fields: Value) -> PolicyResult<Self> {
        let fields: RedactRegexFields = parse_fields(Self::KIND, fields)?;
        Ok(Self {
            paths: compile_paths(Self::KIND, &fields.json_paths)?,
            pattern: compile_pattern(Self::KIND, &fields.regex_pattern)?,
        })
    }

    fn apply(&self, doc: &mut Value, token: &str) {
        for path in &self.paths {
            path.update_with(doc, |value| {
                let text = value.as_str()?;
                Some(Value::String(
                    self.pattern.replace_all(text, NoExpand(token)).into_owned(),
                ))
            });
        }
    }
}

impl Action for RedactRegex {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn on_response<'a>(&'a self, ctx: &'a mut ActionContext) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            let token = ctx.config.redact_token.clone();
            self.apply(&mut ctx.response.json, &token);
            Ok(())
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterRegexFields {
    json_paths: Vec<String>,
    regex_pattern: String,
    #[serde(default)]
    delimiter: String,
}

/// Keeps only the pattern matches, joined by a delimiter.
///
/// With capture groups in the pattern the group text is kept instead of the
/// whole match. A value with no match becomes the empty string.
#[derive(Debug)]
pub struct FilterRegex {
    paths: Vec<Arc<JsonPath>>,
    pattern: Regex,
    delimiter: String,
}

impl FilterRegex {
    /// Registered kind.
    pub const KIND: &'static str = "filter_regex";

    /// Builds the action from its policy fields.
    pub fn from_fields(fields: Value) -> PolicyResult<Self> {
        let fields: FilterRegexFields = parse_fields(Self::KIND, fields)?;
        Ok(Self {
            paths: compile_paths(Self::KIND, &fields.json_paths)?,
            pattern: compile_pattern(Self::KIND, &fields.regex_pattern)?,
            delimiter: fields.delimiter,
        })
    }

    fn apply(&self, doc: &mut Value) {
        for path in &self.paths {
            path.update_with(doc, |value| {
                let text = value.as_str()?;
                Some(Value::String(self.extract(text).join(self.delimiter.as_str())))
            });
        }
    }

    /// One piece per match: the whole match when the pattern has no groups,
    /// otherwise its capture groups concatenated in order. A group that did
    /// not participate contributes nothing.
    fn extract(&self, text: &str) -> Vec<String> {
        if self.pattern.captures_len() == 1 {
            return self
                .pattern
                .find_iter(text)
                .map(|m| m.as_str().to_string())
                .collect();
        }
        self.pattern
            .captures_iter(text)
            .map(|caps| {
                caps.iter()
                    .skip(1)
                    .map(|group| group.map_or("", |m| m.as_str()))
                    .collect::<String>()
            })
            .collect()
    }
}

impl Action for FilterRegex {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn on_response<'a>(&'a self, ctx: &'a mut ActionContext) -> BoxFuture<'a, GatewayResult<()>> {
        Box::pin(async move {
            self.apply(&mut ctx.response.json);
            Ok(())
        })
    }
}
