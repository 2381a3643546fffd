//! Path template compilation.
//!
//! A template is a path with embedded placeholders. Literal text must match
//! exactly; each placeholder binds a typed value:
//!
//! ```text
//! /v0/item/{id}.json        id   -> one segment ("8863")
//! /repos/{owner}/{n:int}    n    -> integer (42)
//! /files/{rest:path}        rest -> remainder ("a/b/c.txt")
//! ```

use std::collections::HashSet;

use regex::Regex;

use crate::error::{RouteError, RouteResult};
use crate::params::{ParamKind, Params};

/// A piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Param { name: String, kind: ParamKind },
}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct RouteTemplate {
    source: String,
    regex: Regex,
    params: Vec<(String, ParamKind)>,
}

impl RouteTemplate {
    /// Compiles a path template.
    ///
    /// # Example
    ///
    /// ```rust
    /// use guardette_router::RouteTemplate;
    ///
    /// let template = RouteTemplate::parse("/v0/item/{id}.json").unwrap();
    /// let params = template.match_path("/v0/item/8863.json").unwrap();
    /// assert_eq!(params.get_str("id"), Some("8863"));
    /// assert!(template.match_path("/v0/item/8863").is_none());
    /// ```
    pub fn parse(template: &str) -> RouteResult<Self> {
        if !template.starts_with('/') {
            return Err(RouteError::RelativePath {
                template: template.to_string(),
            });
        }

        let tokens = tokenize(template)?;

        let mut seen = HashSet::new();
        let mut pattern = String::from("^");
        let mut params = Vec::new();
        for token in &tokens {
            match token {
                Token::Literal(text) => pattern.push_str(&regex::escape(text)),
                Token::Param { name, kind } => {
                    if !seen.insert(name.clone()) {
                        return Err(RouteError::DuplicateParam {
                            name: name.clone(),
                            template: template.to_string(),
                        });
                    }
                    pattern.push_str(&format!("(?P<{name}>{})", kind.pattern()));
                    params.push((name.clone(), *kind));
                }
            }
        }
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| RouteError::Compile {
            template: template.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: template.to_string(),
            regex,
            params,
        })
    }

    /// Matches a request path, returning the bound parameters.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        let mut params = Params::with_capacity(self.params.len());
        for (name, kind) in &self.params {
            let raw = captures.name(name).map_or("", |m| m.as_str());
            params.push(name.clone(), kind.convert(raw)?);
        }
        Some(params)
    }

    /// The template text as declared.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names and kinds in template order.
    pub fn params(&self) -> &[(String, ParamKind)] {
        &self.params
    }
}

fn tokenize(template: &str) -> RouteResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        literal.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| RouteError::InvalidPlaceholder {
            placeholder: rest[open..].to_string(),
            template: template.to_string(),
        })?;
        let inner = &after[..close];

        let (name, kind_name) = inner.split_once(':').unwrap_or((inner, ""));
        if !is_valid_name(name) {
            return Err(RouteError::InvalidPlaceholder {
                placeholder: format!("{{{inner}}}"),
                template: template.to_string(),
            });
        }
        let kind = ParamKind::from_name(kind_name).ok_or_else(|| RouteError::UnknownParamType {
            kind: kind_name.to_string(),
            template: template.to_string(),
        })?;

        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }
        tokens.push(Token::Param {
            name: name.to_string(),
            kind,
        });
        rest = &after[close + 1..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }

    Ok(tokens)
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
