//! `METHOD /path` route declarations.

use std::fmt;
use std::str::FromStr;

use http::Method;

use crate::error::{RouteError, RouteResult};
use crate::params::Params;
use crate::template::RouteTemplate;

/// Methods a route may declare.
pub const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
];

/// A compiled route: one method plus one path template.
#[derive(Debug, Clone)]
pub struct RouteSpec {
    method: Method,
    template: RouteTemplate,
}

impl RouteSpec {
    /// Compiles a `METHOD /path` declaration.
    pub fn parse(route: &str) -> RouteResult<Self> {
        let malformed = || RouteError::Malformed {
            route: route.to_string(),
        };

        let (method, path) = route.trim().split_once(' ').ok_or_else(malformed)?;
        let path = path.trim();
        if method.is_empty() || path.is_empty() || path.contains(char::is_whitespace) {
            return Err(malformed());
        }

        let method = SUPPORTED_METHODS
            .iter()
            .find(|m| m.as_str() == method)
            .cloned()
            .ok_or_else(|| RouteError::UnsupportedMethod {
                method: method.to_string(),
                route: route.to_string(),
            })?;

        Ok(Self {
            method,
            template: RouteTemplate::parse(path)?,
        })
    }

    /// The declared method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The compiled path template.
    pub fn template(&self) -> &RouteTemplate {
        &self.template
    }

    /// Matches a request, returning bound parameters when both the method
    /// and the path align.
    #[must_use]
    pub fn matches(&self, method: &Method, path: &str) -> Option<Params> {
        if *method != self.method {
            return None;
        }
        self.template.match_path(path)
    }
}

impl FromStr for RouteSpec {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template.as_str())
    }
}
