//! Ordered route-template matcher for Guardette.
//!
//! Policies declare each routable endpoint as a single string such as
//! `"GET /v0/item/{id}.json"`. This crate compiles those strings once and
//! matches inbound requests against them.
//!
//! # Features
//!
//! - **Typed placeholders**: `{name}` / `{name:str}`, `{name:int}` and
//!   `{name:path}` (remainder of the path, slashes included)
//! - **Mixed segments**: placeholders may sit next to literal text (`{id}.json`)
//! - **Declaration order**: routes are tried in insertion order and the first
//!   structural match wins; there is no specificity scoring
//! - **Method-aware**: a route only matches its own HTTP method
//!
//! # Example
//!
//! ```rust
//! use guardette_router::{ParamValue, Router};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.insert_route("GET /v0/item/{id:int}.json", "item").unwrap();
//! router.insert_route("GET /v0/user/{name}", "user").unwrap();
//!
//! let m = router.match_route(&Method::GET, "/v0/item/8863.json").unwrap();
//! assert_eq!(*m.value, "item");
//! assert_eq!(m.params.get("id"), Some(&ParamValue::Int(8863)));
//!
//! assert!(router.match_route(&Method::POST, "/v0/item/8863.json").is_none());
//! ```

mod error;
mod params;
mod router;
mod spec;
mod template;

pub use error::{RouteError, RouteResult};
pub use params::{ParamKind, ParamValue, Params};
pub use router::Router;
pub use spec::{RouteSpec, SUPPORTED_METHODS};
pub use template::RouteTemplate;

/// A matched route with its associated value and extracted parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch<'a, T> {
    /// The value registered with the matched route
    pub value: &'a T,
    /// Position of the matched route in declaration order
    pub index: usize,
    /// Extracted path parameters
    pub params: Params,
}

impl<'a, T> RouteMatch<'a, T> {
    /// Creates a new route match.
    #[must_use]
    pub fn new(value: &'a T, index: usize, params: Params) -> Self {
        Self {
            value,
            index,
            params,
        }
    }
}
