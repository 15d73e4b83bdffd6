//! Trellis: condition-based routing and a middleware pipeline for
//! request handling inside a host web runtime.

pub mod app;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod kernel;
pub mod middleware;
pub mod observability;
pub mod routing;

pub use app::{Application, BootFailure, RouteContext};
pub use config::AppConfig;
pub use error::{ConfigurationError, KernelError};
pub use http::{HttpServer, Request, Response};
pub use kernel::HttpKernel;
pub use routing::{Arguments, RouteBlueprint, Router};
