//! A registered route.

use std::fmt;
use std::panic::Location;

use axum::http::Method;
use serde_json::Value;

use super::arguments::Arguments;
use super::attributes::{QueryFilter, QueryVars};
use super::conditions::ConditionRef;
use crate::error::ConfigurationError;
use crate::handler::Handler;
use crate::http::Request;

/// Methods matched by `any()`.
pub const ALL_METHODS: [Method; 7] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Immutable route: methods, condition, middleware and handler.
///
/// Built by `Router::route`, which guarantees a condition, a handler and at
/// least one method.
pub struct Route {
    pub(crate) methods: Vec<Method>,
    pub(crate) condition: ConditionRef,
    pub(crate) middleware: Vec<String>,
    pub(crate) namespace: String,
    pub(crate) handler: Handler,
    pub(crate) query: Option<QueryFilter>,
    pub(crate) name: String,
    pub(crate) defined_at: Option<&'static Location<'static>>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("methods", &self.methods)
            .field("condition", &self.condition)
            .field("middleware", &self.middleware)
            .field("handler", &self.handler)
            .field("name", &self.name)
            .field("defined_at", &self.defined_at.map(ToString::to_string))
            .finish()
    }
}

impl Route {
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn condition(&self) -> &ConditionRef {
        &self.condition
    }

    pub fn middleware(&self) -> &[String] {
        &self.middleware
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn has_query_filter(&self) -> bool {
        self.query.is_some()
    }

    /// Empty when unnamed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source location of the definition, when it was recorded.
    pub fn defined_at(&self) -> Option<&'static Location<'static>> {
        self.defined_at
    }

    pub fn with_defined_at(mut self, location: &'static Location<'static>) -> Self {
        self.defined_at = Some(location);
        self
    }

    /// Name for logs: the route name, else the handler.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.handler.describe()
        } else {
            self.name.clone()
        }
    }

    /// Method allowed and condition satisfied.
    pub fn is_satisfied(&self, request: &Request) -> bool {
        self.methods.contains(&request.method()) && self.condition.is_satisfied(request)
    }

    pub fn arguments(&self, request: &Request) -> Arguments {
        self.condition.arguments(request)
    }

    /// Run the query filter, if any, with the route arguments.
    ///
    /// Only URL routes may filter the query.
    pub fn apply_query_filter(
        &self,
        request: &Request,
        vars: QueryVars,
    ) -> Result<QueryVars, ConfigurationError> {
        let Some(query) = &self.query else {
            return Ok(vars);
        };

        if self.condition.as_url().is_none() {
            return Err(ConfigurationError::QueryFilterWithoutUrl);
        }

        let arguments: Vec<Value> = self.arguments(request).values().cloned().collect();
        Ok(query(vars, &arguments))
    }
}
