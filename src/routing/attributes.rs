//! Route attribute bag and group merge rules.

use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use serde_json::{Map, Value};

use super::conditions::{ConditionFactory, ConditionSpec};
use crate::error::ConfigurationError;
use crate::handler::HandlerSpec;

/// Host query variables, as handed to query filters.
pub type QueryVars = Map<String, Value>;

/// Rewrites the host query for a matched route. Receives the route arguments.
pub type QueryFilter = Arc<dyn Fn(QueryVars, &[Value]) -> QueryVars + Send + Sync>;

/// Attributes shared by routes, blueprints and group frames.
#[derive(Clone, Default)]
pub struct RouteAttributes {
    pub methods: Vec<Method>,
    pub condition: Option<ConditionSpec>,
    pub middleware: Vec<String>,
    pub namespace: String,
    pub handler: Option<HandlerSpec>,
    pub query: Option<QueryFilter>,
    pub name: String,
}

impl fmt::Debug for RouteAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteAttributes")
            .field("methods", &self.methods)
            .field("condition", &self.condition)
            .field("middleware", &self.middleware)
            .field("namespace", &self.namespace)
            .field("handler", &self.handler)
            .field("query", &self.query.as_ref().map(|_| ".."))
            .field("name", &self.name)
            .finish()
    }
}

impl RouteAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `new` over `old`.
    ///
    /// - `methods`, `middleware`: concatenated
    /// - `condition`: merged through the factory
    /// - `namespace`, `handler`: last non-empty wins
    /// - `query`: composed, `old` runs first
    /// - `name`: dot-joined
    pub fn merge(
        old: &RouteAttributes,
        new: RouteAttributes,
        factory: &ConditionFactory,
    ) -> Result<RouteAttributes, ConfigurationError> {
        let condition = factory
            .merge(old.condition.as_ref(), new.condition.as_ref())?
            .map(ConditionSpec::Condition);

        Ok(RouteAttributes {
            methods: merge_lists(&old.methods, new.methods),
            condition,
            middleware: merge_lists(&old.middleware, new.middleware),
            namespace: if new.namespace.is_empty() {
                old.namespace.clone()
            } else {
                new.namespace
            },
            handler: match new.handler {
                Some(handler) if !handler.is_empty() => Some(handler),
                _ => old.handler.clone(),
            },
            query: compose_queries(old.query.clone(), new.query),
            name: merge_names(&old.name, &new.name),
        })
    }
}

fn merge_lists<T: Clone>(old: &[T], new: Vec<T>) -> Vec<T> {
    let mut merged = old.to_vec();
    merged.extend(new);
    merged
}

/// `new(old(vars))`, or whichever side exists.
pub fn compose_queries(old: Option<QueryFilter>, new: Option<QueryFilter>) -> Option<QueryFilter> {
    match (old, new) {
        (None, new) => new,
        (old, None) => old,
        (Some(old), Some(new)) => Some(Arc::new(move |vars, args: &[Value]| {
            new(old(vars, args), args)
        })),
    }
}

/// `"posts" + "show"` → `"posts.show"`, without stray or doubled dots.
pub fn merge_names(old: &str, new: &str) -> String {
    let joined = format!("{old}.{new}");
    joined
        .split('.')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}
