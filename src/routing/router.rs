//! Route registry and dispatch.
//!
//! # Responsibilities
//! - Build routes from attributes, folding in the enclosing group
//! - Store registered routes in registration order
//! - Select the first satisfied route for a request
//! - Reverse named routes into URLs
//!
//! # Design Decisions
//! - First match wins; earlier routes shadow later overlapping ones
//! - O(n) scan (acceptable for typical route counts)
//! - Explicit `None` rather than a silent default route

use std::sync::Arc;

use super::arguments::Arguments;
use super::attributes::RouteAttributes;
use super::blueprint::RouteBlueprint;
use super::conditions::{ConditionFactory, ConditionRef, UrlContext};
use super::route::Route;
use crate::error::ConfigurationError;
use crate::handler::Handler;
use crate::http::Request;

#[derive(Debug)]
pub struct Router {
    factory: ConditionFactory,
    url_context: UrlContext,
    routes: Vec<Arc<Route>>,
    group_stack: Vec<RouteAttributes>,
    current_route: Option<Arc<Route>>,
}

impl Router {
    pub fn new(factory: ConditionFactory, url_context: UrlContext) -> Self {
        Self {
            factory,
            url_context,
            routes: Vec::new(),
            group_stack: Vec::new(),
            current_route: None,
        }
    }

    pub fn factory(&self) -> &ConditionFactory {
        &self.factory
    }

    pub fn url_context(&self) -> &UrlContext {
        &self.url_context
    }

    /// Start a fluent route definition.
    pub fn blueprint(&mut self) -> RouteBlueprint<'_> {
        RouteBlueprint::new(self)
    }

    /// Attributes of the innermost open group.
    pub fn group_attributes(&self) -> Option<&RouteAttributes> {
        self.group_stack.last()
    }

    /// Run `define` inside a group. The group attributes are merged with the
    /// enclosing group and apply to every route built inside.
    pub fn group<F>(&mut self, attributes: RouteAttributes, define: F) -> Result<(), ConfigurationError>
    where
        F: FnOnce(&mut Router) -> Result<(), ConfigurationError>,
    {
        let merged = match self.group_stack.last() {
            Some(top) => RouteAttributes::merge(top, attributes, &self.factory)?,
            None => RouteAttributes::merge(&RouteAttributes::default(), attributes, &self.factory)?,
        };

        self.group_stack.push(merged);
        let result = define(self);
        self.group_stack.pop();
        result
    }

    /// Build (but do not register) a route.
    pub fn route(&self, attributes: RouteAttributes) -> Result<Route, ConfigurationError> {
        let attributes = match self.group_stack.last() {
            Some(top) => RouteAttributes::merge(top, attributes, &self.factory)?,
            None => attributes,
        };

        let condition: ConditionRef = match &attributes.condition {
            Some(spec) => self.factory.make(spec)?,
            None => return Err(ConfigurationError::MissingCondition),
        };

        let handler = match &attributes.handler {
            Some(spec) if !spec.is_empty() => Handler::parse(spec, "", &attributes.namespace)?,
            _ => return Err(ConfigurationError::MissingHandler),
        };

        if attributes.methods.is_empty() {
            return Err(ConfigurationError::MissingMethods);
        }

        Ok(Route {
            methods: attributes.methods,
            condition,
            middleware: attributes.middleware,
            namespace: attributes.namespace,
            handler,
            query: attributes.query,
            name: attributes.name,
            defined_at: None,
        })
    }

    /// Register a route. The same route or a taken name is rejected.
    pub fn add_route(&mut self, route: impl Into<Arc<Route>>) -> Result<Arc<Route>, ConfigurationError> {
        let route = route.into();

        if self.routes.iter().any(|existing| Arc::ptr_eq(existing, &route)) {
            return Err(ConfigurationError::DuplicateRoute);
        }

        if !route.name.is_empty() && self.routes.iter().any(|existing| existing.name == route.name) {
            return Err(ConfigurationError::DuplicateRouteName(route.name.clone()));
        }

        tracing::debug!(
            route = %route.label(),
            methods = ?route.methods,
            defined_at = ?route.defined_at.map(ToString::to_string),
            "Route registered"
        );
        self.routes.push(route.clone());
        Ok(route)
    }

    /// Unregister a route. Returns whether it was registered.
    pub fn remove_route(&mut self, route: &Arc<Route>) -> bool {
        let before = self.routes.len();
        self.routes.retain(|existing| !Arc::ptr_eq(existing, route));
        before != self.routes.len()
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Select the first satisfied route and remember it as current.
    pub fn execute(&mut self, request: &Request) -> Option<Arc<Route>> {
        let matched = self
            .routes
            .iter()
            .find(|route| route.is_satisfied(request))
            .cloned();

        match &matched {
            Some(route) => tracing::debug!(route = %route.label(), path = %request.path(), "Route matched"),
            None => tracing::trace!(path = %request.path(), "No route matched"),
        }

        if let Some(route) = &matched {
            self.current_route = Some(route.clone());
        }
        matched
    }

    /// Route selected by the last `execute` that matched.
    pub fn current_route(&self) -> Option<&Arc<Route>> {
        self.current_route.as_ref()
    }

    /// URL of a named route.
    pub fn route_url(&self, name: &str, arguments: &Arguments) -> Result<String, ConfigurationError> {
        let route = self
            .routes
            .iter()
            .find(|route| route.name == name)
            .ok_or_else(|| ConfigurationError::UnknownRouteName(name.to_string()))?;

        let urlable = route
            .condition
            .as_urlable()
            .ok_or(ConfigurationError::NotUrlable)?;

        urlable.to_url(arguments, &self.url_context)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::json;

    use super::*;
    use crate::handler::HandlerSpec;
    use crate::routing::conditions::ConditionSpec;

    fn router() -> Router {
        let home = ::url::Url::parse("http://example.com/").unwrap();
        Router::new(ConditionFactory::with_defaults(), UrlContext::from_home(home))
    }

    fn attributes(methods: &[Method], url: &str, handler: &str) -> RouteAttributes {
        RouteAttributes {
            methods: methods.to_vec(),
            condition: Some(url.into()),
            handler: Some(handler.into()),
            ..RouteAttributes::default()
        }
    }

    fn handler_of(route: &Route) -> String {
        route.handler().describe()
    }

    #[test]
    fn test_route_requires_condition_handler_and_methods() {
        let router = router();

        let mut missing = attributes(&[Method::GET], "/", "Home@index");
        missing.condition = None;
        assert_eq!(router.route(missing).unwrap_err(), ConfigurationError::MissingCondition);

        let mut missing = attributes(&[Method::GET], "/", "Home@index");
        missing.handler = Some(HandlerSpec::Reference(String::new()));
        assert_eq!(router.route(missing).unwrap_err(), ConfigurationError::MissingHandler);

        let missing = attributes(&[], "/", "Home@index");
        assert_eq!(router.route(missing).unwrap_err(), ConfigurationError::MissingMethods);

        let invalid = attributes(&[Method::GET], "/", "Home");
        assert_eq!(router.route(invalid).unwrap_err(), ConfigurationError::InvalidHandler);
    }

    #[test]
    fn test_first_match_wins() {
        let mut router = router();
        let specific = router
            .add_route(router.route(attributes(&[Method::GET], "/foo/{id}", "Foo@show")).unwrap())
            .unwrap();
        router
            .add_route(router.route(attributes(&[Method::GET], "*", "Fallback@index")).unwrap())
            .unwrap();

        let request = Request::get("/foo/42").unwrap();
        let matched = router.execute(&request).unwrap();
        assert!(Arc::ptr_eq(&matched, &specific));
        assert_eq!(matched.arguments(&request), [("id", "42")].into_iter().collect::<Arguments>());

        let fallback = router.execute(&Request::get("/elsewhere").unwrap()).unwrap();
        assert_eq!(handler_of(&fallback), "Fallback@index");
        assert!(Arc::ptr_eq(router.current_route().unwrap(), &fallback));
    }

    #[test]
    fn test_registration_order_decides_overlaps() {
        let mut router = router();
        router
            .add_route(router.route(attributes(&[Method::GET], "*", "Fallback@index")).unwrap())
            .unwrap();
        router
            .add_route(router.route(attributes(&[Method::GET], "/foo/{id}", "Foo@show")).unwrap())
            .unwrap();

        let matched = router.execute(&Request::get("/foo/42").unwrap()).unwrap();
        assert_eq!(handler_of(&matched), "Fallback@index");
    }

    #[test]
    fn test_method_must_match() {
        let mut router = router();
        router
            .add_route(router.route(attributes(&[Method::POST], "/form", "Form@save")).unwrap())
            .unwrap();

        assert!(router.execute(&Request::get("/form").unwrap()).is_none());
        assert!(router.current_route().is_none());
        assert!(router.execute(&Request::post("/form").unwrap()).is_some());
    }

    #[test]
    fn test_current_route_survives_a_miss() {
        let mut router = router();
        let route = router
            .add_route(router.route(attributes(&[Method::GET], "/a", "A@index")).unwrap())
            .unwrap();

        assert!(router.execute(&Request::get("/a").unwrap()).is_some());
        assert!(router.execute(&Request::get("/b").unwrap()).is_none());
        assert!(Arc::ptr_eq(router.current_route().unwrap(), &route));
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut router = router();
        let mut named = attributes(&[Method::GET], "/a", "A@index");
        named.name = "a".into();
        let route = router.add_route(router.route(named.clone()).unwrap()).unwrap();

        assert_eq!(router.add_route(route.clone()).unwrap_err(), ConfigurationError::DuplicateRoute);
        assert_eq!(
            router.add_route(router.route(named).unwrap()).unwrap_err(),
            ConfigurationError::DuplicateRouteName("a".into())
        );

        // Unnamed routes never collide by name.
        router.add_route(router.route(attributes(&[Method::GET], "/b", "B@index")).unwrap()).unwrap();
        router.add_route(router.route(attributes(&[Method::GET], "/c", "C@index")).unwrap()).unwrap();
        assert_eq!(router.routes().len(), 3);

        assert!(router.remove_route(&route));
        assert!(!router.remove_route(&route));
        assert_eq!(router.routes().len(), 2);
    }

    #[test]
    fn test_groups_fold_attributes() {
        let mut router = router();
        let group = RouteAttributes {
            condition: Some("/admin".into()),
            middleware: vec!["auth".into()],
            namespace: "app::admin::".into(),
            name: "admin".into(),
            ..RouteAttributes::default()
        };

        router
            .group(group, |router| {
                let nested = RouteAttributes {
                    condition: Some("/users".into()),
                    name: "users".into(),
                    ..RouteAttributes::default()
                };
                router.group(nested, |router| {
                    let mut show = attributes(&[Method::GET], "/{id}", "Users@show");
                    show.name = "show".into();
                    show.middleware = vec!["log".into()];
                    let route = router.route(show)?;
                    router.add_route(route)?;
                    Ok(())
                })
            })
            .unwrap();

        assert!(router.group_attributes().is_none());

        let request = Request::get("/admin/users/9").unwrap();
        let route = router.execute(&request).unwrap();
        assert_eq!(route.name(), "admin.users.show");
        assert_eq!(route.middleware(), ["auth", "log"]);
        assert_eq!(route.namespace(), "app::admin::");
        assert_eq!(route.arguments(&request).get_str("id"), Some("9"));
    }

    #[test]
    fn test_group_is_popped_on_error() {
        let mut router = router();
        let result = router.group(RouteAttributes::default(), |router| {
            router.route(RouteAttributes::default()).map(|_| ())
        });

        assert_eq!(result.unwrap_err(), ConfigurationError::MissingCondition);
        assert!(router.group_attributes().is_none());
    }

    #[test]
    fn test_route_url() {
        let mut router = router();
        let mut show = attributes(&[Method::GET], "/posts/{slug}/{page?}", "Posts@show");
        show.name = "posts.show".into();
        router.add_route(router.route(show).unwrap()).unwrap();

        let mut custom = RouteAttributes::new();
        custom.methods = vec![Method::GET];
        custom.condition = Some(ConditionSpec::predicate(|_, _| true, vec![]));
        custom.handler = Some("Any@index".into());
        custom.name = "custom".into();
        router.add_route(router.route(custom).unwrap()).unwrap();

        let args: Arguments = [("slug", json!("hello world"))].into_iter().collect();
        assert_eq!(
            router.route_url("posts.show", &args).unwrap(),
            "http://example.com/posts/hello+world"
        );
        assert_eq!(
            router.route_url("missing", &args).unwrap_err(),
            ConfigurationError::UnknownRouteName("missing".into())
        );
        assert_eq!(
            router.route_url("custom", &args).unwrap_err(),
            ConfigurationError::NotUrlable
        );
        assert_eq!(
            router.route_url("posts.show", &Arguments::new()).unwrap_err(),
            ConfigurationError::MissingUrlParameter("slug".into())
        );
    }
}
