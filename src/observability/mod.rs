//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router, kernel, middleware resolver, error handler produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (request counters and latency histogram)
//!     → spans.rs (one span per handled request)
//!
//! Consumers:
//!     → Log output (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Everything goes through the `tracing` and `metrics` facades; without an
//!   installed subscriber or recorder the calls are no-ops
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod spans;
