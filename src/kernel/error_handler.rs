//! Turning pipeline errors into responses.
//!
//! # Responsibilities
//! - Map known errors to specific status responses
//! - Log everything else
//! - Produce detailed output only in debug mode
//!
//! # Design Decisions
//! - Debug detail is opt-in per handler instance; production handlers never render it
//! - Panic locations are captured by a process-wide hook into a thread-local slot,
//!   which `register`/`unregister` clear around each pipeline run

use std::cell::RefCell;
use std::error::Error as StdError;
use std::panic;
use std::sync::Once;

use axum::http::{header, HeaderValue, StatusCode};
use serde_json::json;

use crate::error::KernelError;
use crate::http::{Request, Response};

/// Message shown for rejected CSRF tokens.
pub const CSRF_FAILURE_MESSAGE: &str = "The link you followed has expired.";

/// Recovery boundary hooks used by the kernel.
pub trait ErrorHandler: Send + Sync {
    /// Called before a pipeline runs.
    fn register(&self) {}

    /// Called after a pipeline ran, whatever its outcome.
    fn unregister(&self) {}

    fn response(&self, request: &Request, error: &KernelError) -> Response;
}

thread_local! {
    static PANIC_LOCATION: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Install the location-recording panic hook (once per process).
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if let Some(location) = info.location() {
                PANIC_LOCATION.with(|slot| {
                    *slot.borrow_mut() = Some(format!("{}:{}", location.file(), location.line()));
                });
            }
            previous(info);
        }));
    });
}

/// Location of the last panic on this thread since `register`.
pub fn panic_location() -> Option<String> {
    PANIC_LOCATION.with(|slot| slot.borrow().clone())
}

fn clear_panic_location() {
    PANIC_LOCATION.with(|slot| slot.borrow_mut().take());
}

#[derive(Debug, Clone, Default)]
pub struct DefaultErrorHandler {
    debug: bool,
}

impl DefaultErrorHandler {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Response for errors with a fixed meaning, if `error` is one.
    fn known_response(&self, error: &KernelError) -> Option<Response> {
        match error {
            KernelError::NotFound => Some(Response::error(StatusCode::NOT_FOUND)),
            KernelError::InvalidCsrfToken => Some(
                Response::output(CSRF_FAILURE_MESSAGE).with_status(StatusCode::FORBIDDEN),
            ),
            _ => None,
        }
    }

    fn debug_response(&self, request: &Request, error: &KernelError) -> Response {
        let trace = source_chain(error);
        let location = panic_location();

        if request.is_ajax() {
            let body = json!({
                "message": error.to_string(),
                "exception": error.kind(),
                "location": location,
                "trace": trace,
            });
            return match Response::json(&body) {
                Ok(response) => response.with_status(StatusCode::INTERNAL_SERVER_ERROR),
                Err(_) => Response::error(StatusCode::INTERNAL_SERVER_ERROR),
            };
        }

        let mut page = format!(
            "<!DOCTYPE html>\n<html><head><title>{kind}</title></head><body>\n<h1>{kind}</h1>\n<p>{message}</p>\n",
            kind = escape_html(error.kind()),
            message = escape_html(&error.to_string()),
        );
        if let Some(location) = location {
            page.push_str(&format!("<p><code>{}</code></p>\n", escape_html(&location)));
        }
        if !trace.is_empty() {
            page.push_str("<ol>\n");
            for cause in &trace {
                page.push_str(&format!("<li>{}</li>\n", escape_html(cause)));
            }
            page.push_str("</ol>\n");
        }
        page.push_str(&format!(
            "<p>{} {}</p>\n</body></html>\n",
            escape_html(request.method().as_str()),
            escape_html(request.path())
        ));

        Response::output(page)
            .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn register(&self) {
        if self.debug {
            install_panic_hook();
            clear_panic_location();
        }
    }

    fn unregister(&self) {
        if self.debug {
            clear_panic_location();
        }
    }

    fn response(&self, request: &Request, error: &KernelError) -> Response {
        if let Some(response) = self.known_response(error) {
            tracing::debug!(kind = error.kind(), status = %response.status(), "Error handled");
            return response;
        }

        tracing::error!(kind = error.kind(), error = %error, path = %request.path(), "Request failed");

        if !self.debug {
            return Response::error(StatusCode::INTERNAL_SERVER_ERROR);
        }

        self.debug_response(request, error)
    }
}

/// Messages of the error's sources, outermost first.
fn source_chain(error: &KernelError) -> Vec<String> {
    let mut chain = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
