//! # Guardette Core
//!
//! The request pipeline of the Guardette privacy gateway.
//!
//! A caller sends an ordinary HTTP request to the gateway with a
//! `X-Guardette-Host` header naming the upstream. The gateway:
//!
//! 1. verifies the caller's shared secret
//! 2. matches the host and `METHOD /path` against the loaded [`Policy`]
//! 3. rebuilds the request for `https://{host}`, injecting upstream
//!    credentials for the source's `auth` strategy
//! 4. forwards it and runs the rule's actions over the JSON response
//!    (redaction, nullification, regex filtering, email pseudonymisation,
//!    field removal)
//!
//! Anything not explicitly declared is refused.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use guardette_config::ConfigLoader;
//! use guardette_core::Gateway;
//!
//! let config = Arc::new(ConfigLoader::new().load()?);
//! let gateway = Gateway::builder(Arc::clone(&config))
//!     .policy_file(&config.policy_path)
//!     .build()
//!     .await?;
//!
//! let response = gateway.handle(request).await;
//! ```

#![warn(missing_docs)]

use std::future::Future;
use std::pin::Pin;

pub mod actions;
pub mod auth;
pub mod error;
pub mod gateway;
pub mod headers;
pub mod jsonpath;
pub mod matcher;
pub mod policy;
pub mod proxy;
pub mod secrets;
pub mod transformer;

/// A boxed future, used where async work crosses a trait object.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Gateway version reported by the meta endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use actions::{Action, ActionContext, ActionRegistry};
pub use auth::{AuthHandler, AuthHandlerRegistry, AuthSpec};
pub use error::{GatewayError, GatewayResult, PolicyError, PolicyResult};
pub use gateway::{Gateway, GatewayBuilder};
pub use jsonpath::JsonPath;
pub use matcher::{MatchResult, Matcher};
pub use policy::{Policy, Rule, Source};
pub use proxy::{GatewayResponse, InboundRequest, ProxyRequest, ProxyResponse, ReqwestUpstream, UpstreamClient, UpstreamResponse};
pub use secrets::SecretsResolver;
pub use transformer::{Outcome, ProxyTransformer};
