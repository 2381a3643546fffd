//! Error types for the HTTP binding.

use std::net::SocketAddr;

use guardette_config::ConfigError;
use guardette_core::GatewayError;
use guardette_telemetry::TelemetryError;
use thiserror::Error;

/// Startup and serving failures.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Configuration failed to load or the policy watcher failed to start.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The gateway could not be built.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Logging or metrics could not be initialised.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// Invalid command-line usage.
    #[error("{0}")]
    Usage(String),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:8080".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        };
        assert_eq!(err.to_string(), "failed to bind 127.0.0.1:8080: address in use");

        let err: ServerError = GatewayError::configuration("a policy is required").into();
        assert_eq!(err.to_string(), "gateway error: a policy is required");
    }
}
