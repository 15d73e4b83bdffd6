//! Metrics collection and exposition.
//!
//! # Metrics
//! - `trellis_requests_total` (counter): handled requests by outcome
//! - `trellis_request_duration_seconds` (histogram): kernel time per request
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; nothing is kept when no recorder is installed
//! - Outcome labels are a small fixed set

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "trellis_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "trellis_request_duration_seconds";

/// How the kernel finished with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A route matched and the pipeline produced a response.
    Handled,
    /// No route matched; the host handles the request.
    NoRoute,
    /// The pipeline failed and the error handler produced the response.
    Error,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Handled => "handled",
            Outcome::NoRoute => "no_route",
            Outcome::Error => "error",
        }
    }
}

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe();
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

fn describe() {
    metrics::describe_counter!(REQUESTS_TOTAL, "Requests seen by the kernel, by outcome");
    metrics::describe_histogram!(
        REQUEST_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Time spent in the kernel per request"
    );
}

/// Record one request.
pub fn record_request(outcome: Outcome, started: Instant) {
    metrics::counter!(REQUESTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    metrics::histogram!(REQUEST_DURATION_SECONDS, "outcome" => outcome.as_str())
        .record(started.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Handled.as_str(), "handled");
        assert_eq!(Outcome::NoRoute.as_str(), "no_route");
        assert_eq!(Outcome::Error.as_str(), "error");
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_request(Outcome::Handled, Instant::now());
    }
}
