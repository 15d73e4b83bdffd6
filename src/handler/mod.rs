//! Route handlers.
//!
//! # Data Flow
//! ```text
//! HandlerSpec (closure | "Class@method" | "Class::method" | (class, method))
//!     → Handler::parse (default method, namespace)
//!     → Handler::resolve (ControllerRegistry: bare class, then namespace + class)
//!     → HandlerInstance::call → HandlerOutput → Response
//! ```
//!
//! # Design Decisions
//! - Parsing happens when the route is built; resolving happens per request
//! - Controller middleware is read from the resolved instance, so the kernel
//!   resolves once and reuses the instance for the call

pub mod controllers;
pub mod output;

use std::fmt;
use std::sync::Arc;

pub use controllers::{
    unknown_method, Controller, ControllerMiddleware, ControllerMiddlewareSet, ControllerRegistry,
};
pub use output::{HandlerOutput, Responsable};

use crate::error::{ConfigurationError, Result};
use crate::http::Request;
use crate::routing::Arguments;

/// Closure handler.
pub type HandlerFn = Arc<dyn Fn(&Request, &Arguments) -> Result<HandlerOutput> + Send + Sync>;

/// Unparsed handler reference as written in a route definition.
#[derive(Clone)]
pub enum HandlerSpec {
    Closure(HandlerFn),
    /// `"Class@method"`, `"Class::method"` or a bare `"Class"`.
    Reference(String),
    Method { class: String, method: String },
}

impl HandlerSpec {
    pub fn closure<F>(handler: F) -> Self
    where
        F: Fn(&Request, &Arguments) -> Result<HandlerOutput> + Send + Sync + 'static,
    {
        HandlerSpec::Closure(Arc::new(handler))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            HandlerSpec::Closure(_) => false,
            HandlerSpec::Reference(reference) => reference.is_empty(),
            HandlerSpec::Method { class, .. } => class.is_empty(),
        }
    }
}

impl fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerSpec::Closure(_) => f.write_str("Closure(..)"),
            HandlerSpec::Reference(reference) => f.debug_tuple("Reference").field(reference).finish(),
            HandlerSpec::Method { class, method } => f
                .debug_struct("Method")
                .field("class", class)
                .field("method", method)
                .finish(),
        }
    }
}

impl From<&str> for HandlerSpec {
    fn from(reference: &str) -> Self {
        HandlerSpec::Reference(reference.to_string())
    }
}

impl From<String> for HandlerSpec {
    fn from(reference: String) -> Self {
        HandlerSpec::Reference(reference)
    }
}

impl From<(&str, &str)> for HandlerSpec {
    fn from((class, method): (&str, &str)) -> Self {
        HandlerSpec::Method {
            class: class.to_string(),
            method: method.to_string(),
        }
    }
}

/// A parsed handler.
#[derive(Clone)]
pub enum Handler {
    Closure(HandlerFn),
    Controller {
        class: String,
        method: String,
        namespace: String,
    },
}

impl Handler {
    /// Parse a spec. Class references need a class and a method (explicit or
    /// `default_method`).
    pub fn parse(
        spec: &HandlerSpec,
        default_method: &str,
        namespace: &str,
    ) -> std::result::Result<Self, ConfigurationError> {
        let (class, method) = match spec {
            HandlerSpec::Closure(handler) => return Ok(Handler::Closure(handler.clone())),
            HandlerSpec::Reference(reference) => split_reference(reference),
            HandlerSpec::Method { class, method } => (class.as_str(), Some(method.as_str())),
        };

        let class = class.trim_start_matches("::");
        let method = method.filter(|m| !m.is_empty()).unwrap_or(default_method);

        if class.is_empty() || method.is_empty() {
            return Err(ConfigurationError::InvalidHandler);
        }

        Ok(Handler::Controller {
            class: class.to_string(),
            method: method.to_string(),
            namespace: namespace.to_string(),
        })
    }

    /// Controller method, `None` for closures.
    pub fn method(&self) -> Option<&str> {
        match self {
            Handler::Closure(_) => None,
            Handler::Controller { method, .. } => Some(method.as_str()),
        }
    }

    /// Human-readable description for logs and diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Handler::Closure(_) => "closure".to_string(),
            Handler::Controller { class, method, .. } => format!("{class}@{method}"),
        }
    }

    /// Instantiate (controllers) or clone (closures).
    pub fn resolve(&self, controllers: &ControllerRegistry) -> Result<HandlerInstance> {
        match self {
            Handler::Closure(handler) => Ok(HandlerInstance::Closure(handler.clone())),
            Handler::Controller {
                class,
                method,
                namespace,
            } => Ok(HandlerInstance::Controller {
                instance: controllers.resolve(class, namespace)?,
                method: method.clone(),
            }),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Closure(_) => f.write_str("Closure(..)"),
            Handler::Controller {
                class,
                method,
                namespace,
            } => f
                .debug_struct("Controller")
                .field("class", class)
                .field("method", method)
                .field("namespace", namespace)
                .finish(),
        }
    }
}

/// Split on the first `@` or `::`, whichever comes first.
fn split_reference(reference: &str) -> (&str, Option<&str>) {
    let reference = reference.trim_start_matches("::");
    let at = reference.find('@').map(|index| (index, 1));
    let colons = reference.find("::").map(|index| (index, 2));

    let split = match (at, colons) {
        (Some(a), Some(c)) => Some(if a.0 < c.0 { a } else { c }),
        (a, c) => a.or(c),
    };

    match split {
        Some((index, len)) => (&reference[..index], Some(&reference[index + len..])),
        None => (reference, None),
    }
}

/// A handler ready to be called.
#[derive(Clone)]
pub enum HandlerInstance {
    Closure(HandlerFn),
    Controller {
        instance: Arc<dyn Controller>,
        method: String,
    },
}

impl HandlerInstance {
    /// Middleware declared by the controller for the routed method.
    pub fn middleware(&self) -> Vec<String> {
        match self {
            HandlerInstance::Closure(_) => Vec::new(),
            HandlerInstance::Controller { instance, method } => instance.middleware(method),
        }
    }

    pub fn call(&self, request: &Request, arguments: &Arguments) -> Result<HandlerOutput> {
        match self {
            HandlerInstance::Closure(handler) => handler(request, arguments),
            HandlerInstance::Controller { instance, method } => {
                instance.call(method, request, arguments)
            }
        }
    }
}
