//! Middleware resolution and execution.
//!
//! # Data Flow
//! ```text
//! route middleware + controller middleware (+ context group)
//!     → definitions.rs (aliases, "name:a,b" arguments, groups, special groups)
//!     → unique (first occurrence wins) → sort (declared priority, stable)
//!     → pipeline.rs (m0 → m1 → ... → terminal handler)
//!     → Response
//! ```
//!
//! # Design Decisions
//! - Middleware are looked up in an explicit registry built at startup
//! - `Next` is consumed by value, so a middleware continues the chain at most once
//! - The whole chain runs synchronously on the calling thread

pub mod builtin;
pub mod definitions;
pub mod pipeline;
pub mod registry;

use crate::error::Result;
use crate::http::{Request, Response};

pub use builtin::{CsrfMiddleware, CsrfTokens, UserCanMiddleware, UserLoggedInMiddleware, UserLoggedOutMiddleware};
pub use definitions::{Molecule, MiddlewareDefinitions};
pub use pipeline::{execute_middleware, Next};
pub use registry::MiddlewareRegistry;

/// A step wrapped around the route handler.
pub trait Middleware: Send + Sync {
    /// Produce a response, usually by calling `next.run(request)` somewhere
    /// along the way. `args` are the literal arguments of the molecule.
    fn handle(&self, request: Request, next: Next<'_>, args: &[String]) -> Result<Response>;
}

impl<F> Middleware for F
where
    F: for<'a> Fn(Request, Next<'a>, &[String]) -> Result<Response> + Send + Sync,
{
    fn handle(&self, request: Request, next: Next<'_>, args: &[String]) -> Result<Response> {
        self(request, next, args)
    }
}
