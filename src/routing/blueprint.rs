//! Fluent route definitions.
//!
//! ```ignore
//! router.blueprint().get().url("/posts/{id}").middleware(["auth"]).name("posts.show").handle("Posts@show")?;
//! router.blueprint().url("/admin").group(|router| { ... })?;
//! ```

use std::panic::Location;
use std::sync::Arc;

use axum::http::Method;
use serde_json::Value;

use super::attributes::{compose_queries, QueryFilter, QueryVars, RouteAttributes};
use super::conditions::{ConditionSpec, WILDCARD};
use super::route::{Route, ALL_METHODS};
use super::router::Router;
use crate::error::ConfigurationError;
use crate::handler::HandlerSpec;

/// Accumulates route attributes, then registers a route or opens a group.
///
/// Condition errors are held until `handle` or `group`, so calls chain.
pub struct RouteBlueprint<'r> {
    router: &'r mut Router,
    attributes: RouteAttributes,
    error: Option<ConfigurationError>,
}

impl<'r> RouteBlueprint<'r> {
    pub fn new(router: &'r mut Router) -> Self {
        Self {
            router,
            attributes: RouteAttributes::default(),
            error: None,
        }
    }

    pub fn attributes(&self) -> &RouteAttributes {
        &self.attributes
    }

    /// Replace all attributes.
    pub fn with_attributes(mut self, attributes: RouteAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Add request methods.
    pub fn methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.attributes.methods.extend(methods);
        self
    }

    pub fn get(self) -> Self {
        self.methods([Method::GET, Method::HEAD])
    }

    pub fn post(self) -> Self {
        self.methods([Method::POST])
    }

    pub fn put(self) -> Self {
        self.methods([Method::PUT])
    }

    pub fn patch(self) -> Self {
        self.methods([Method::PATCH])
    }

    pub fn delete(self) -> Self {
        self.methods([Method::DELETE])
    }

    pub fn options(self) -> Self {
        self.methods([Method::OPTIONS])
    }

    pub fn any(self) -> Self {
        self.methods(ALL_METHODS)
    }

    /// Add a condition, merged with any condition set before.
    pub fn condition(mut self, spec: impl Into<ConditionSpec>) -> Self {
        if self.error.is_some() {
            return self;
        }

        let spec = spec.into();
        match self
            .router
            .factory()
            .merge(self.attributes.condition.as_ref(), Some(&spec))
        {
            Ok(merged) => self.attributes.condition = merged.map(ConditionSpec::Condition),
            Err(err) => self.error = Some(err),
        }
        self
    }

    pub fn url(self, url: &str) -> Self {
        self.condition(url)
    }

    /// URL with per-parameter regex constraints.
    pub fn url_where<'a>(self, url: &str, constraints: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.condition(ConditionSpec::url_where(url, constraints))
    }

    pub fn middleware<I, S>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .middleware
            .extend(middleware.into_iter().map(Into::into));
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.attributes.namespace = namespace.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.attributes.name = name.into();
        self
    }

    /// Add a query filter, composed after any filter set before.
    pub fn query<F>(mut self, filter: F) -> Self
    where
        F: Fn(QueryVars, &[Value]) -> QueryVars + Send + Sync + 'static,
    {
        let filter: QueryFilter = Arc::new(filter);
        self.attributes.query = compose_queries(self.attributes.query.take(), Some(filter));
        self
    }

    /// Open a group with the accumulated attributes.
    pub fn group<F>(self, define: F) -> Result<(), ConfigurationError>
    where
        F: FnOnce(&mut Router) -> Result<(), ConfigurationError>,
    {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.router.group(self.attributes, define)
    }

    /// Set the handler, then build and register the route.
    #[track_caller]
    pub fn handle(mut self, handler: impl Into<HandlerSpec>) -> Result<Arc<Route>, ConfigurationError> {
        let location = Location::caller();
        if let Some(err) = self.error.take() {
            return Err(err);
        }

        let handler = handler.into();
        if !handler.is_empty() {
            self.attributes.handler = Some(handler);
        }

        let route = self.router.route(self.attributes)?.with_defined_at(location);
        self.router.add_route(route)
    }

    /// Catch-all route for every method.
    #[track_caller]
    pub fn all(self, handler: impl Into<HandlerSpec>) -> Result<Arc<Route>, ConfigurationError> {
        self.any().url(WILDCARD).handle(handler)
    }
}
