//! Request kernel.
//!
//! # Data Flow
//! ```text
//! Request
//!     → Router::execute (first satisfied route, or None → host default)
//!     → route middleware + controller middleware
//!     → MiddlewareDefinitions::resolve (expand, unique, sort)
//!     → execute_middleware (m0 → m1 → ... → handler → HandlerOutput → Response)
//!     → ErrorHandler on any error or panic
//!     → Response
//! ```
//!
//! # Design Decisions
//! - The kernel is the single recovery boundary; nothing below it catches errors
//! - Panics in handlers and middleware are caught and treated as errors
//! - Debug detail only when the error handler was built in debug mode

pub mod error_handler;
pub mod http_kernel;

pub use error_handler::{DefaultErrorHandler, ErrorHandler};
pub use http_kernel::{CurrentRoute, HttpKernel, RequestPhase};
