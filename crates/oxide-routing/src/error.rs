//! Error types for routing.

use thiserror::Error;

/// Routing-specific errors.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A registration call received a malformed argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An id or name was registered twice.
    #[error("duplicate {kind}: {id}")]
    DuplicateId { kind: &'static str, id: String },

    /// No route matched the request.
    #[error("no route matched: {method} {path}")]
    NotFound { method: String, path: String },

    /// A param middleware failed while binding parameters.
    #[error("param middleware `{id}` failed: {message}")]
    ParamMiddleware { id: String, message: String },

    /// A router or route middleware failed.
    #[error("middleware `{id}` failed: {message}")]
    Middleware { id: String, message: String },

    /// The route handler failed.
    #[error("handler failed: {0}")]
    Handler(String),

    /// The request carries no authenticated principal.
    #[error("authentication required")]
    Unauthenticated,

    /// The principal is not allowed to access the route.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Router name not registered.
    #[error("router not found: {0}")]
    RouterNotFound(String),

    /// Route name or id not registered.
    #[error("route not found: {0}")]
    RouteNotFound(String),
}

impl RoutingError {
    /// Shorthand for [`RoutingError::InvalidArgument`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Wraps any displayable failure raised inside a handler.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        Self::Handler(err.to_string())
    }

    /// Returns `true` for resolution failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status code the surrounding layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Unauthenticated => 401,
            Self::Forbidden(_) => 403,
            _ => 500,
        }
    }
}

/// Result type alias for routing operations.
pub type Result<T> = std::result::Result<T, RoutingError>;
