//! Error types for the Guardette pipeline.
//!
//! [`GatewayError`] is raised while a call is processed and decides the
//! caller-visible status and envelope. [`PolicyError`] is raised while a
//! policy document is loaded and is always fatal for that document.

use std::time::Duration;

use guardette_config::ConfigError;
use guardette_router::RouteError;
use thiserror::Error;

/// Boxed error kept for diagnostics.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Request-time failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The inbound credential is missing or wrong.
    #[error("{message}")]
    CallerAuth {
        /// Error message.
        message: String,
    },

    /// A required configuration or secret value is absent or invalid.
    #[error("{message}")]
    Configuration {
        /// Error message.
        message: String,
    },

    /// No source or rule matches the call.
    #[error("{message}")]
    MatchNotFound {
        /// Error message.
        message: String,
    },

    /// The inbound method cannot be forwarded.
    #[error("Unexpected http method: {method}")]
    UnsupportedMethod {
        /// The offending method.
        method: String,
    },

    /// Building the upstream request or transforming the response failed.
    #[error("{message}")]
    Transformation {
        /// Error message.
        message: String,
        /// Underlying cause, for logs only.
        #[source]
        source: Option<BoxError>,
    },

    /// The upstream call exceeded the configured timeout.
    #[error("upstream call timed out after {}s", timeout.as_secs())]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// An auth handler could not produce credentials.
    #[error("{message}")]
    AuthHandler {
        /// Error message.
        message: String,
    },

    /// The secret backend failed.
    #[error("{message}")]
    SecretsRetrieval {
        /// Error message.
        message: String,
        /// Underlying cause, for logs only.
        #[source]
        source: Option<BoxError>,
    },

    /// The upstream call failed before a response arrived.
    #[error("{message}")]
    Upstream {
        /// Error message.
        message: String,
        /// Underlying cause, for logs only.
        #[source]
        source: Option<BoxError>,
    },

    /// Unexpected internal failure.
    #[error("{message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl GatewayError {
    /// Create a caller authentication error.
    pub fn caller_auth(message: impl Into<String>) -> Self {
        Self::CallerAuth {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a match-not-found error.
    pub fn match_not_found(message: impl Into<String>) -> Self {
        Self::MatchNotFound {
            message: message.into(),
        }
    }

    /// Create an unsupported method error.
    pub fn unsupported_method(method: impl Into<String>) -> Self {
        Self::UnsupportedMethod {
            method: method.into(),
        }
    }

    /// Create a transformation error wrapping its cause.
    pub fn transformation(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transformation {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a timeout error.
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    /// Create an auth handler error.
    pub fn auth_handler(message: impl Into<String>) -> Self {
        Self::AuthHandler {
            message: message.into(),
        }
    }

    /// Create a secrets retrieval error wrapping its cause.
    pub fn secrets_retrieval(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::SecretsRetrieval {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create an upstream transport error wrapping its cause.
    pub fn upstream(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Upstream {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::CallerAuth { .. } => 401,
            Self::MatchNotFound { .. } => 404,
            _ => 500,
        }
    }

    /// Get the error category for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::CallerAuth { .. } => "caller_auth",
            Self::Configuration { .. } => "configuration",
            Self::MatchNotFound { .. } => "match_not_found",
            Self::UnsupportedMethod { .. } => "unsupported_method",
            Self::Transformation { .. } => "transformation",
            Self::Timeout { .. } => "timeout",
            Self::AuthHandler { .. } => "auth_handler",
            Self::SecretsRetrieval { .. } => "secrets_retrieval",
            Self::Upstream { .. } => "upstream",
            Self::Internal { .. } => "internal",
        }
    }

    /// Caller-visible description.
    ///
    /// Never includes the source chain. Unexpected internal failures get a
    /// generic message.
    pub fn details(&self) -> String {
        match self {
            Self::Internal { .. } => "An unexpected error occurred.".to_string(),
            other => other.to_string(),
        }
    }

    /// Renders the full cause chain for logs.
    pub fn cause_chain(&self) -> String {
        let mut chain = Vec::new();
        let mut current = std::error::Error::source(self);
        while let Some(err) = current {
            chain.push(err.to_string());
            current = err.source();
        }
        chain.join(": ")
    }
}

impl From<ConfigError> for GatewayError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

impl From<PolicyError> for GatewayError {
    fn from(err: PolicyError) -> Self {
        Self::configuration(err.to_string())
    }
}

/// Result type for request-time operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Policy loading and validation failures.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The document could not be read.
    #[error("failed to read policy {path}: {source}")]
    Io {
        /// Path to the document.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document extension is not a known format.
    #[error("unsupported policy format: {path} (expected .yml, .yaml or .json)")]
    UnsupportedFormat {
        /// Path to the document.
        path: String,
    },

    /// The document is not well-formed.
    #[error("failed to parse {format} policy: {message}")]
    Parse {
        /// Document format.
        format: &'static str,
        /// Parser message.
        message: String,
    },

    /// The document shape does not match the policy schema.
    #[error("invalid policy: {message}")]
    Schema {
        /// Explanation.
        message: String,
    },

    /// An action mapping has no `kind`.
    #[error("action in route '{route}' is missing `kind`")]
    MissingActionKind {
        /// Route declaring the action.
        route: String,
    },

    /// An action names an unregistered kind.
    #[error("unknown action kind: '{kind}'")]
    UnknownAction {
        /// The unknown kind.
        kind: String,
    },

    /// An action's fields fail its schema.
    #[error("invalid `{kind}` action: {reason}")]
    InvalidAction {
        /// Action kind.
        kind: String,
        /// Explanation.
        reason: String,
    },

    /// A JSON path expression does not parse.
    #[error("invalid JSON path '{expression}': {reason}")]
    InvalidJsonPath {
        /// The expression.
        expression: String,
        /// Explanation.
        reason: String,
    },

    /// Two or more sources share a host.
    #[error("Only one source per host is supported. Duplicated hosts: {}", hosts.join(", "))]
    DuplicateHosts {
        /// Every duplicated host, in first-seen order.
        hosts: Vec<String>,
    },

    /// A source `auth` value is not `kind` or `kind:subkind`.
    #[error("Invalid `auth` format: {auth}")]
    InvalidAuth {
        /// The offending value.
        auth: String,
    },

    /// A source names an auth kind with no registered handler.
    #[error("no auth handler registered for kind '{kind}' (host {host})")]
    UnknownAuthKind {
        /// Auth kind.
        kind: String,
        /// Source host.
        host: String,
    },

    /// A rule route does not compile.
    #[error("invalid route: {0}")]
    InvalidRoute(#[from] RouteError),

    /// A registry already holds the kind.
    #[error("{registry} already exists: '{kind}'")]
    DuplicateRegistration {
        /// Which registry rejected it.
        registry: &'static str,
        /// The duplicated kind.
        kind: String,
    },
}

impl PolicyError {
    /// Create a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create an invalid action error.
    pub fn invalid_action(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAction {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for policy loading.
pub type PolicyResult<T> = Result<T, PolicyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::caller_auth("x").status_code(), 401);
        assert_eq!(GatewayError::match_not_found("x").status_code(), 404);
        assert_eq!(GatewayError::configuration("x").status_code(), 500);
        assert_eq!(GatewayError::unsupported_method("TRACE").status_code(), 500);
        assert_eq!(GatewayError::timeout(Duration::from_secs(1)).status_code(), 500);
        assert_eq!(GatewayError::auth_handler("x").status_code(), 500);
    }

    #[test]
    fn test_timeout_message() {
        let err = GatewayError::timeout(Duration::from_secs(30));
        assert!(err.details().contains("timed out"));
        assert_eq!(err.category(), "timeout");
    }

    #[test]
    fn test_details_hide_cause() {
        let cause = std::io::Error::other("secret-bearing backend detail");
        let err = GatewayError::transformation("Error transforming response.", cause);

        assert_eq!(err.details(), "Error transforming response.");
        assert!(err.cause_chain().contains("secret-bearing backend detail"));
    }

    #[test]
    fn test_internal_details_are_generic() {
        let err = GatewayError::internal("index out of range in frobnicator");
        assert_eq!(err.details(), "An unexpected error occurred.");
    }

    #[test]
    fn test_duplicate_hosts_message() {
        let err = PolicyError::DuplicateHosts {
            hosts: vec!["a.example.com".to_string(), "b.example.com".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Only one source per host is supported. Duplicated hosts: a.example.com, b.example.com"
        );
    }

    #[test]
    fn test_policy_error_becomes_configuration() {
        let err: GatewayError = PolicyError::schema("sources must be a list").into();
        assert_eq!(err.category(), "configuration");
    }
}
