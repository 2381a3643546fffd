//! Guardette Server - HTTP binding for the Guardette privacy gateway
//!
//! Exposes a [`Gateway`](guardette_core::Gateway) over HTTP/1.1:
//!
//! | route | response |
//! |-------|----------|
//! | `GET /_guardette/meta` | `{"version": ..., "policy": ...}` |
//! | `GET /_guardette/metrics` | Prometheus text exposition |
//! | anything else | the proxy pipeline |
//!
//! # Example Usage
//!
//! ```bash
//! $ CLIENT_SECRET=s3cret guardette-server --policy .guardette/policy.yml --watch
//!
//! $ curl -H 'Authorization: s3cret' \
//!        -H 'X-Guardette-Host: hacker-news.firebaseio.com' \
//!        http://localhost:8080/v0/item/8863.json
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod error;
pub mod server;

pub use cli::{Args, Command};
pub use error::{ServerError, ServerResult};
pub use server::{handle_request, spawn_policy_watcher, GatewayServer};

/// Server version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
