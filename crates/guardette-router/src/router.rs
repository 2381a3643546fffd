//! High-level router API.
//!
//! This module provides the main [`Router`] struct which is the primary
//! interface for building and matching routes.

use http::Method;

use crate::error::RouteResult;
use crate::spec::RouteSpec;
use crate::RouteMatch;

/// An ordered, first-match router.
///
/// Routes are tried in the order they were inserted; the first route whose
/// method and path template both match wins. A later, more specific route
/// never overrides an earlier, broader one.
///
/// # Example
///
/// ```rust
/// use guardette_router::Router;
/// use http::Method;
///
/// let mut router = Router::new();
/// router.insert_route("GET /users/{id}", "byId").unwrap();
/// router.insert_route("GET /users/me", "me").unwrap();
///
/// // Declaration order wins, even over a literal match.
/// let m = router.match_route(&Method::GET, "/users/me").unwrap();
/// assert_eq!(*m.value, "byId");
/// ```
#[derive(Debug, Clone)]
pub struct Router<T> {
    routes: Vec<(RouteSpec, T)>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    /// Creates a new empty router.
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Appends a compiled route.
    pub fn insert(&mut self, spec: RouteSpec, value: T) {
        self.routes.push((spec, value));
    }

    /// Compiles and appends a `METHOD /path` route.
    pub fn insert_route(&mut self, route: &str, value: T) -> RouteResult<()> {
        self.insert(RouteSpec::parse(route)?, value);
        Ok(())
    }

    /// Matches a method and path against the routes in declaration order.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, T>> {
        self.routes
            .iter()
            .enumerate()
            .find_map(|(index, (spec, value))| {
                spec.matches(method, path)
                    .map(|params| RouteMatch::new(value, index, params))
            })
    }

    /// Returns the number of routes registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterates over the compiled routes in declaration order.
    pub fn routes(&self) -> impl Iterator<Item = (&RouteSpec, &T)> {
        self.routes.iter().map(|(spec, value)| (spec, value))
    }
}
