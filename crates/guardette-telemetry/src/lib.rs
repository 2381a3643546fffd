//! Observability for Guardette.
//!
//! - **Logging**: structured JSON (or pretty) output via `tracing-subscriber`,
//!   with per-call correlation ids carried on the request span
//! - **Metrics**: Prometheus-format metrics via the `metrics` crate, rendered
//!   on demand by the HTTP binding
//!
//! # Example
//!
//! ```rust,ignore
//! use guardette_telemetry::{init_logging, init_metrics, LogConfig};
//!
//! init_logging(&LogConfig::new("info", true))?;
//! init_metrics()?;
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use self::metrics::{init_metrics, record_request, record_secret_fetch, render_metrics};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
