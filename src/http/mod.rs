//! HTTP abstractions shared by the routing core and the host adapter.
//!
//! # Data Flow
//! ```text
//! host transport (axum, or an embedding host)
//!     → request.rs (method override, query/body/cookie access, attributes)
//!     → host.rs (HostContext attached by the host)
//!     → [kernel: route → middleware → handler]
//!     → response.rs (status, headers, buffered body)
//!     → server.rs (axum) | respond.rs (chunked write to a sink)
//! ```
//!
//! `respond.rs` serves embedding hosts that own their output stream. The
//! bundled axum server does not use it.

pub mod host;
pub mod request;
pub mod respond;
pub mod response;
pub mod server;

pub use host::{admin_page_hook, HostContext, PostContext};
pub use request::Request;
pub use respond::{AlwaysConnected, ConnectionStatus, ResponseEmitter};
pub use response::{Redirect, Response};
pub use server::HttpServer;
