//! Response value produced by handlers, middleware and the error handler.
//!
//! # Responsibilities
//! - Hold status, headers and a buffered body
//! - Offer the small set of constructors handlers need (text, JSON, redirect, error)
//! - Convert into an axum response at the host boundary
//!
//! # Design Decisions
//! - Bodies are buffered `Bytes`; chunked emission is `respond::ResponseEmitter`'s job
//! - `output` sets no content type, the host's default applies

use axum::body::{Body, Bytes};
use axum::http::header::{self, IntoHeaderName};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;

use crate::http::request::Request;

/// A response on its way back to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

impl Response {
    /// Empty `200 OK`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain output body.
    pub fn output(output: impl Into<String>) -> Self {
        Self {
            body: Bytes::from(output.into()),
            ..Self::default()
        }
    }

    /// Serialized JSON body with `Content-Type: application/json`.
    pub fn json<T: Serialize + ?Sized>(data: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(data)?;
        Ok(Self::default()
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body))
    }

    /// Empty response with the given status.
    pub fn error(status: StatusCode) -> Self {
        Self::default().with_status(status)
    }

    /// Start a redirect relative to `request`.
    pub fn redirect(request: &Request) -> Redirect<'_> {
        Redirect { request }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Replace every value of `name` with `value`.
    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }
}

impl axum::response::IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Redirect builder bound to the current request.
#[derive(Debug)]
pub struct Redirect<'r> {
    request: &'r Request,
}

impl Redirect<'_> {
    /// Redirect to `url`. Fails only when `url` is not a valid header value.
    pub fn to(&self, url: &str, status: StatusCode) -> Result<Response, header::InvalidHeaderValue> {
        let location = HeaderValue::from_str(url)?;
        Ok(Response::default()
            .with_header(header::LOCATION, location)
            .with_status(status))
    }

    /// Redirect to the referer, else `fallback`, else the current URL.
    pub fn back(&self, fallback: &str, status: StatusCode) -> Result<Response, header::InvalidHeaderValue> {
        let referer = self
            .request
            .header(header::REFERER.as_str())
            .filter(|url| !url.is_empty());

        let url = match referer {
            Some(url) => url,
            None if !fallback.is_empty() => fallback,
            None => self.request.url().as_str(),
        };

        self.to(url, status)
    }
}
