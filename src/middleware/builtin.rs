//! Middleware shipped with the kernel.
//!
//! | key                 | arguments                     |
//! |---------------------|-------------------------------|
//! | `user.logged_in`    | `[redirect_url]`              |
//! | `user.logged_out`   | `[redirect_url]`              |
//! | `user.can`          | `capability[,object_id[,url]]`|
//! | `csrf`              | `[action]`                    |
//!
//! User checks read the request's `HostContext`; a request without one counts
//! as anonymous with no capabilities.

use std::sync::Arc;

use axum::http::StatusCode;

use super::registry::MiddlewareRegistry;
use super::{Middleware, Next};
use crate::error::{KernelError, Result};
use crate::http::{Request, Response};

pub const USER_LOGGED_IN: &str = "user.logged_in";
pub const USER_LOGGED_OUT: &str = "user.logged_out";
pub const USER_CAN: &str = "user.can";
pub const CSRF: &str = "csrf";

/// Register the user middleware, plus `csrf` when a token store is given.
pub fn register_defaults(registry: &mut MiddlewareRegistry, csrf: Option<Arc<dyn CsrfTokens>>) {
    registry
        .instance(USER_LOGGED_IN, UserLoggedInMiddleware)
        .instance(USER_LOGGED_OUT, UserLoggedOutMiddleware)
        .instance(USER_CAN, UserCanMiddleware);

    if let Some(tokens) = csrf {
        registry.instance(CSRF, CsrfMiddleware::new(tokens));
    }
}

fn argument<'a>(args: &'a [String], index: usize) -> Option<&'a str> {
    args.get(index).map(String::as_str).filter(|value| !value.is_empty())
}

fn home(request: &Request) -> String {
    request
        .home_url()
        .map_or_else(|| "/".to_string(), |url| url.to_string())
}

fn redirect(request: &Request, url: &str) -> Result<Response> {
    tracing::debug!(path = %request.path(), location = %url, "Middleware redirect");
    Response::redirect(request)
        .to(url, StatusCode::FOUND)
        .map_err(KernelError::handler)
}

fn logged_in(request: &Request) -> bool {
    request.host().is_some_and(|host| host.logged_in)
}

/// Only logged-in users pass; others go to the login URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserLoggedInMiddleware;

impl Middleware for UserLoggedInMiddleware {
    fn handle(&self, request: Request, next: Next<'_>, args: &[String]) -> Result<Response> {
        if logged_in(&request) {
            return next.run(request);
        }

        let url = match argument(args, 0) {
            Some(url) => url.to_string(),
            None => login_url(&request),
        };
        redirect(&request, &url)
    }
}

/// Login URL carrying the current URL as `redirect_to`.
fn login_url(request: &Request) -> String {
    let base = request
        .host()
        .and_then(|host| host.login_url.clone())
        .unwrap_or_else(|| home(request));

    let separator = if base.contains('?') { '&' } else { '?' };
    let target: String =
        url::form_urlencoded::byte_serialize(request.url().as_str().as_bytes()).collect();
    format!("{base}{separator}redirect_to={target}")
}

/// Only anonymous users pass; others go home.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserLoggedOutMiddleware;

impl Middleware for UserLoggedOutMiddleware {
    fn handle(&self, request: Request, next: Next<'_>, args: &[String]) -> Result<Response> {
        if !logged_in(&request) {
            return next.run(request);
        }

        let url = argument(args, 0).map_or_else(|| home(&request), str::to_string);
        redirect(&request, &url)
    }
}

/// Only users holding a capability pass.
///
/// The object id argument is accepted for compatibility; capabilities in the
/// host context are not object scoped.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserCanMiddleware;

impl Middleware for UserCanMiddleware {
    fn handle(&self, request: Request, next: Next<'_>, args: &[String]) -> Result<Response> {
        let capability = argument(args, 0).unwrap_or_default();
        let allowed = request
            .host()
            .is_some_and(|host| host.logged_in && host.can(capability));

        if allowed {
            return next.run(request);
        }

        let url = argument(args, 2).map_or_else(|| home(&request), str::to_string);
        redirect(&request, &url)
    }
}

/// Token issuing and verification, owned by the host session layer.
pub trait CsrfTokens: Send + Sync {
    /// Issue (or refresh) the token for `action`.
    fn generate(&self, action: &str) -> String;

    fn is_valid(&self, token: &str, action: &str) -> bool;
}

pub const CSRF_FIELD: &str = "__trellisCsrfToken";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Verifies the token of every non-read request.
pub struct CsrfMiddleware {
    tokens: Arc<dyn CsrfTokens>,
    field: String,
}

impl CsrfMiddleware {
    pub fn new(tokens: Arc<dyn CsrfTokens>) -> Self {
        Self {
            tokens,
            field: CSRF_FIELD.to_string(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Token from the query, then the body, then the header.
    pub fn token_from_request(&self, request: &Request) -> String {
        request
            .query(&self.field)
            .filter(|token| !token.is_empty())
            .or_else(|| request.body_param(&self.field).filter(|token| !token.is_empty()))
            .or_else(|| request.header(CSRF_HEADER).map(str::to_string))
            .unwrap_or_default()
    }
}

impl Middleware for CsrfMiddleware {
    fn handle(&self, request: Request, next: Next<'_>, args: &[String]) -> Result<Response> {
        let action = argument(args, 0).unwrap_or_default();

        if !request.is_read_verb() {
            let token = self.token_from_request(&request);
            if !self.tokens.is_valid(&token, action) {
                tracing::warn!(path = %request.path(), "Rejected request with invalid CSRF token");
                return Err(KernelError::InvalidCsrfToken);
            }
        }

        self.tokens.generate(action);
        next.run(request)
    }
}
