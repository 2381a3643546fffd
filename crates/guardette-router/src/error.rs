//! Route compilation errors.

use thiserror::Error;

/// Errors raised while compiling a route declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The route is not of the form `METHOD /path`.
    #[error("malformed route `{route}`: expected `METHOD /path`")]
    Malformed {
        /// The offending route string.
        route: String,
    },

    /// The route declares a method the gateway cannot forward.
    #[error("unsupported method `{method}` in route `{route}`")]
    UnsupportedMethod {
        /// The declared method.
        method: String,
        /// The offending route string.
        route: String,
    },

    /// The path template does not start with `/`.
    #[error("path template `{template}` must start with `/`")]
    RelativePath {
        /// The offending template.
        template: String,
    },

    /// A placeholder is unterminated, empty, or has an invalid name.
    #[error("invalid placeholder `{placeholder}` in `{template}`")]
    InvalidPlaceholder {
        /// The placeholder text.
        placeholder: String,
        /// The template containing it.
        template: String,
    },

    /// A placeholder uses a type other than `str`, `int`, or `path`.
    #[error("unknown placeholder type `{kind}` in `{template}`")]
    UnknownParamType {
        /// The declared type.
        kind: String,
        /// The template containing it.
        template: String,
    },

    /// The same placeholder name appears twice.
    #[error("duplicate placeholder `{name}` in `{template}`")]
    DuplicateParam {
        /// The repeated name.
        name: String,
        /// The template containing it.
        template: String,
    },

    /// The generated matcher failed to compile.
    #[error("failed to compile `{template}`: {reason}")]
    Compile {
        /// The template being compiled.
        template: String,
        /// Compiler message.
        reason: String,
    },
}

/// Result type for route compilation.
pub type RouteResult<T> = Result<T, RouteError>;
