//! Request spans.
//!
//! Every request handled by the kernel runs inside one `request` span, so
//! events from the router, the middleware and the handler share its fields.

use tracing::Span;

use crate::http::Request;

/// Span for one kernel request.
pub fn request_span(request: &Request) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.path(),
        route = tracing::field::Empty,
    )
}

/// Record the matched route on the current request span.
pub fn record_route(span: &Span, route: &str) {
    span.record("route", route);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_accepts_route() {
        let request = Request::get("/posts/1").unwrap();
        let span = request_span(&request);
        record_route(&span, "posts.show");
    }
}
