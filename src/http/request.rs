//! Request abstraction consumed by conditions, middleware and handlers.
//!
//! # Responsibilities
//! - Carry method, absolute URL, headers and buffered body
//! - Answer query/body/header/cookie lookups
//! - Carry typed attributes (route match, host context) through the pipeline
//!
//! # Design Decisions
//! - The body is fully buffered; the core never streams request bodies
//! - POST may be overridden to another standard verb (header or `_method` field)
//! - Cloning is cheap (`Bytes`, shared extensions) so the kernel can keep a
//!   copy for error reporting

use axum::body::Bytes;
use axum::http::header::{self, IntoHeaderName};
use axum::http::{Extensions, HeaderMap, HeaderValue, Method};
use serde::de::DeserializeOwned;
use url::Url;

use crate::http::host::HostContext;

const METHOD_OVERRIDE_HEADER: &str = "x-http-method-override";
const OVERRIDABLE_METHODS: [Method; 7] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// An incoming request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
    extensions: Extensions,
    home_url: Option<Url>,
}

impl Request {
    /// Create a request. Relative URLs are resolved against `http://localhost/`.
    pub fn new(method: Method, url: &str) -> Result<Self, url::ParseError> {
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse("http://localhost/")?.join(url)?
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            extensions: Extensions::new(),
            home_url: None,
        })
    }

    pub fn get(url: &str) -> Result<Self, url::ParseError> {
        Self::new(Method::GET, url)
    }

    pub fn post(url: &str) -> Result<Self, url::ParseError> {
        Self::new(Method::POST, url)
    }

    /// Build from already-parsed transport parts.
    pub fn from_parts(method: Method, url: Url, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            url,
            headers,
            body,
            extensions: Extensions::new(),
            home_url: None,
        }
    }

    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Replace the body with url-encoded form fields.
    pub fn with_form<'a>(mut self, fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        self.body = Bytes::from(encoded);
        self
    }

    /// Attach a typed attribute, replacing any previous value of that type.
    pub fn with_attribute<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    pub fn with_host(self, host: HostContext) -> Self {
        self.with_attribute(host)
    }

    pub fn with_home_url(mut self, home_url: Url) -> Self {
        self.home_url = Some(home_url);
        self
    }

    /// Effective method, honouring POST overrides.
    pub fn method(&self) -> Method {
        if self.method != Method::POST {
            return self.method.clone();
        }

        let mut candidate: Option<String> = self
            .header(METHOD_OVERRIDE_HEADER)
            .filter(|value| !value.is_empty())
            .map(str::to_ascii_uppercase);

        if let Some(field) = self.body_param("_method").filter(|value| !value.is_empty()) {
            candidate = Some(field.to_ascii_uppercase());
        }

        candidate
            .and_then(|name| {
                OVERRIDABLE_METHODS
                    .iter()
                    .find(|method| method.as_str() == name)
                    .cloned()
            })
            .unwrap_or(Method::POST)
    }

    /// Method as received on the wire.
    pub fn raw_method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn home_url(&self) -> Option<&Url> {
        self.home_url.as_ref()
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

    pub fn query(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.url.query_pairs().into_owned().collect()
    }

    /// Url-encoded form fields of the body. Empty for any other content type.
    pub fn body_params(&self) -> Vec<(String, String)> {
        if !self.is_form() {
            return Vec::new();
        }
        url::form_urlencoded::parse(&self.body).into_owned().collect()
    }

    pub fn body_param(&self, key: &str) -> Option<String> {
        if !self.is_form() {
            return None;
        }
        url::form_urlencoded::parse(&self.body)
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
    }

    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|line| line.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }

    pub fn attribute<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    pub fn host(&self) -> Option<&HostContext> {
        self.attribute::<HostContext>()
    }

    pub fn is_get(&self) -> bool {
        self.method() == Method::GET
    }

    pub fn is_post(&self) -> bool {
        self.method() == Method::POST
    }

    /// GET, HEAD and OPTIONS.
    pub fn is_read_verb(&self) -> bool {
        matches!(self.method(), Method::GET | Method::HEAD | Method::OPTIONS)
    }

    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with")
            .map(|value| value.eq_ignore_ascii_case("xmlhttprequest"))
            .unwrap_or(false)
    }

    fn is_form(&self) -> bool {
        self.header(header::CONTENT_TYPE.as_str())
            .map(|value| value.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false)
    }
}
