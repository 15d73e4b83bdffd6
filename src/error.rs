//! Error taxonomy.
//!
//! # Responsibilities
//! - `ConfigurationError`: programmer/config mistakes, always surfaced
//! - `KernelError`: everything that can escape a request pipeline
//!
//! # Design Decisions
//! - "No matching route" is not an error; it is `None` from the router
//! - The kernel is the only place a `KernelError` is turned into a response

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error produced by application handlers and middleware.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Programmer or configuration error. Raised immediately, never defaulted away.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Unknown middleware \"{0}\" used.")]
    UnknownMiddleware(String),

    #[error("Unknown middleware group \"{0}\" used.")]
    UnknownMiddlewareGroup(String),

    #[error("Middleware group cycle detected: {0}")]
    MiddlewareGroupCycle(String),

    #[error("No or invalid handler provided.")]
    InvalidHandler,

    #[error("No route condition specified. Did you miss to call url() or condition()?")]
    MissingCondition,

    #[error("No route handler specified. Did you miss to call handle()?")]
    MissingHandler,

    #[error("Route does not have any assigned request methods. Did you miss to call get() or post() on your route definition, for example?")]
    MissingMethods,

    #[error("Attempted to register a route twice.")]
    DuplicateRoute,

    #[error("The route name \"{0}\" is already registered.")]
    DuplicateRouteName(String),

    #[error("No route registered with the name \"{0}\".")]
    UnknownRouteName(String),

    #[error("Route condition is not resolvable to a URL.")]
    NotUrlable,

    #[error("Required URL parameter \"{0}\" is not specified.")]
    MissingUrlParameter(String),

    #[error("Unknown condition type specified: {0}")]
    UnknownConditionType(String),

    #[error("Invalid arguments for condition \"{kind}\": {reason}")]
    InvalidConditionArguments { kind: String, reason: String },

    #[error("Invalid URL template \"{template}\": {reason}")]
    InvalidUrlTemplate { template: String, reason: String },

    #[error("Invalid pattern for URL parameter \"{parameter}\": {reason}")]
    InvalidWherePattern { parameter: String, reason: String },

    #[error("Response returned by controller is not valid (expected a response; received {0}).")]
    InvalidResponse(&'static str),

    #[error("Only routes with a URL condition can apply query filters. Make sure your route has a URL condition and it is not in a non-URL route group.")]
    QueryFilterWithoutUrl,

    #[error("Method \"{method}\" not found on controller \"{class}\".")]
    UnknownControllerMethod { class: String, method: String },
}

/// Error escaping a request pipeline.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Class not found - tried: {}", tried.join(", "))]
    ClassNotFound { tried: Vec<String> },

    #[error("Not found.")]
    NotFound,

    #[error("The CSRF token is missing or invalid.")]
    InvalidCsrfToken,

    #[error("Handler failed: {0}")]
    Handler(#[source] BoxError),

    #[error("Handler panicked: {0}")]
    Panic(String),
}

impl KernelError {
    /// Wrap an arbitrary application error.
    pub fn handler(error: impl Into<BoxError>) -> Self {
        KernelError::Handler(error.into())
    }

    /// Short machine-readable kind, used in logs, metrics and debug output.
    pub fn kind(&self) -> &'static str {
        match self {
            KernelError::Configuration(_) => "configuration",
            KernelError::ClassNotFound { .. } => "class_not_found",
            KernelError::NotFound => "not_found",
            KernelError::InvalidCsrfToken => "invalid_csrf_token",
            KernelError::Handler(_) => "handler",
            KernelError::Panic(_) => "panic",
        }
    }
}

pub type Result<T, E = KernelError> = std::result::Result<T, E>;
