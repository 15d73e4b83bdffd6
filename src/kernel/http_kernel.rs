//! Request orchestration.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use super::error_handler::ErrorHandler;
use crate::error::{ConfigurationError, KernelError, Result};
use crate::handler::{ControllerRegistry, Handler};
use crate::http::{Request, Response};
use crate::middleware::{execute_middleware, MiddlewareDefinitions};
use crate::observability::metrics::{self, Outcome};
use crate::observability::spans;
use crate::routing::{Arguments, QueryVars, Route, Router};

/// Where the kernel is with the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    RouteResolved,
    NoRoute,
    MiddlewareAssembled,
    PipelineExecuting,
    Responded,
    ErrorHandled,
}

/// Route selected for a request, attached to it as an attribute.
#[derive(Debug, Clone)]
pub struct CurrentRoute {
    pub route: Arc<Route>,
    pub arguments: Arguments,
}

/// Router + middleware + handlers + error boundary.
pub struct HttpKernel {
    router: Router,
    definitions: MiddlewareDefinitions,
    controllers: ControllerRegistry,
    error_handler: Box<dyn ErrorHandler>,
    phase: Cell<RequestPhase>,
}

impl HttpKernel {
    pub fn new(
        router: Router,
        definitions: MiddlewareDefinitions,
        controllers: ControllerRegistry,
        error_handler: impl ErrorHandler + 'static,
    ) -> Self {
        Self {
            router,
            definitions,
            controllers,
            error_handler: Box::new(error_handler),
            phase: Cell::new(RequestPhase::Idle),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn definitions(&self) -> &MiddlewareDefinitions {
        &self.definitions
    }

    pub fn definitions_mut(&mut self) -> &mut MiddlewareDefinitions {
        &mut self.definitions
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    pub fn controllers_mut(&mut self) -> &mut ControllerRegistry {
        &mut self.controllers
    }

    /// Phase reached by the most recent request.
    pub fn phase(&self) -> RequestPhase {
        self.phase.get()
    }

    fn enter(&self, phase: RequestPhase) {
        tracing::trace!(?phase, "Kernel phase");
        self.phase.set(phase);
    }

    /// Route and run a request. `None` means no route matched and the host
    /// should fall back to its default behaviour.
    ///
    /// `arguments` are passed to the handler ahead of the route arguments.
    pub fn handle(&mut self, request: Request, arguments: Arguments) -> Option<Response> {
        let started = Instant::now();
        let span = spans::request_span(&request);
        let _entered = span.enter();
        self.enter(RequestPhase::Idle);

        let Some(route) = self.router.execute(&request) else {
            self.enter(RequestPhase::NoRoute);
            metrics::record_request(Outcome::NoRoute, started);
            return None;
        };
        self.enter(RequestPhase::RouteResolved);
        spans::record_route(&span, &route.label());

        let route_arguments = route.arguments(&request);
        let request = request.with_attribute(CurrentRoute {
            route: route.clone(),
            arguments: route_arguments.clone(),
        });

        let response = self.run(
            request,
            route.middleware(),
            route.handler(),
            arguments.merged(route_arguments),
        );

        let outcome = match self.phase() {
            RequestPhase::ErrorHandled => Outcome::Error,
            _ => Outcome::Handled,
        };
        metrics::record_request(outcome, started);
        Some(response)
    }

    /// Run `handler` behind `middleware` (plus whatever the handler declares)
    /// inside the error boundary.
    pub fn run(
        &self,
        request: Request,
        middleware: &[String],
        handler: &Handler,
        arguments: Arguments,
    ) -> Response {
        self.error_handler.register();

        let boundary_request = request.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pipeline(request, middleware, handler, &arguments)
        }))
        .unwrap_or_else(|payload| Err(KernelError::Panic(panic_message(payload.as_ref()))));

        let response = match result {
            Ok(response) => {
                self.enter(RequestPhase::Responded);
                response
            }
            Err(error) => {
                let response = self.error_handler.response(&boundary_request, &error);
                self.enter(RequestPhase::ErrorHandled);
                response
            }
        };

        self.error_handler.unregister();
        response
    }

    fn pipeline(
        &self,
        request: Request,
        middleware: &[String],
        handler: &Handler,
        arguments: &Arguments,
    ) -> Result<Response> {
        let instance = handler.resolve(&self.controllers)?;

        let mut specs = middleware.to_vec();
        specs.extend(instance.middleware());
        let molecules = self.definitions.resolve(&specs)?;
        self.enter(RequestPhase::MiddlewareAssembled);
        tracing::debug!(
            handler = %handler.describe(),
            molecules = molecules.len(),
            "Pipeline assembled"
        );

        let terminal = |request: Request| -> Result<Response> {
            instance.call(&request, arguments)?.into_response()
        };

        self.enter(RequestPhase::PipelineExecuting);
        execute_middleware(&molecules, self.definitions.registry(), request, &terminal)
    }

    /// Let the first route satisfied by `request` rewrite the host query.
    pub fn filter_query(&self, request: &Request, vars: QueryVars) -> std::result::Result<QueryVars, ConfigurationError> {
        match self.router.routes().iter().find(|route| route.is_satisfied(request)) {
            Some(route) => route.apply_query_filter(request, vars),
            None => Ok(vars),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::http::{HeaderValue, Method, StatusCode};
    use serde_json::json;

    use super::*;
    use crate::handler::{Controller, HandlerOutput, HandlerSpec};
    use crate::kernel::DefaultErrorHandler;
    use crate::middleware::{MiddlewareRegistry, Next};
    use crate::routing::conditions::{ConditionFactory, UrlContext};

    fn kernel(debug: bool) -> HttpKernel {
        let home = ::url::Url::parse("http://example.com/").unwrap();
        let router = Router::new(ConditionFactory::with_defaults(), UrlContext::from_home(home));

        let mut registry = MiddlewareRegistry::new();
        registry.instance("tag", tag);

        HttpKernel::new(
            router,
            MiddlewareDefinitions::new(registry),
            ControllerRegistry::new(),
            DefaultErrorHandler::new(debug),
        )
    }

    fn tag(request: Request, next: Next<'_>, args: &[String]) -> Result<Response> {
        let response = next.run(request)?;
        let value = HeaderValue::from_str(&args.join(",")).map_err(KernelError::handler)?;
        Ok(response.with_header("x-tag", value))
    }

    struct Posts;

    impl Controller for Posts {
        fn call(&self, method: &str, _request: &Request, arguments: &Arguments) -> Result<HandlerOutput> {
            match method {
                "show" => Ok(json!({ "id": arguments.get("id") }).into()),
                other => Err(crate::handler::unknown_method("Posts", other)),
            }
        }

        fn middleware(&self, method: &str) -> Vec<String> {
            if method == "show" {
                vec!["tag:controller".into()]
            } else {
                Vec::new()
            }
        }
    }

    #[test]
    fn test_no_route_returns_none() {
        let mut kernel = kernel(false);
        assert!(kernel.handle(Request::get("/").unwrap(), Arguments::new()).is_none());
        assert_eq!(kernel.phase(), RequestPhase::NoRoute);
    }

    #[test]
    fn test_array_output_becomes_json() {
        let mut kernel = kernel(false);
        kernel
            .router_mut()
            .blueprint()
            .get()
            .url("/data")
            .handle(HandlerSpec::closure(|_, _| Ok(json!({ "a": 1 }).into())))
            .unwrap();

        let response = kernel.handle(Request::get("/data").unwrap(), Arguments::new()).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.text(), r#"{"a":1}"#);
        assert_eq!(kernel.phase(), RequestPhase::Responded);
    }

    #[test]
    fn test_controller_middleware_and_route_arguments() {
        let mut kernel = kernel(false);
        kernel.controllers_mut().singleton("app::Posts", Posts);
        kernel
            .router_mut()
            .blueprint()
            .get()
            .url("/posts/{id}")
            .namespace("app::")
            .middleware(["tag:route"])
            .handle("Posts@show")
            .unwrap();

        let response = kernel.handle(Request::get("/posts/5").unwrap(), Arguments::new()).unwrap();
        assert_eq!(response.text(), r#"{"id":"5"}"#);
        // Route middleware wraps controller middleware; the outer one sets the header last.
        assert_eq!(response.header("x-tag"), Some("route"));
    }

    #[test]
    fn test_extra_arguments_come_first() {
        let mut kernel = kernel(false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        kernel
            .router_mut()
            .blueprint()
            .get()
            .url("/t/{slug}")
            .handle(HandlerSpec::closure(move |request, arguments| {
                *log.lock().unwrap() = arguments.values().cloned().collect();
                assert!(request.attribute::<CurrentRoute>().is_some());
                Ok("ok".into())
            }))
            .unwrap();

        let extra: Arguments = std::iter::once(("template", "single.php")).collect();
        kernel.handle(Request::get("/t/x").unwrap(), extra).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![json!("single.php"), json!("x")]);
    }

    #[test]
    fn test_errors_are_handled_at_the_boundary() {
        let mut kernel = kernel(false);
        kernel
            .router_mut()
            .blueprint()
            .get()
            .url("/missing-controller")
            .handle("Ghost@index")
            .unwrap();
        kernel
            .router_mut()
            .blueprint()
            .get()
            .url("/nothing")
            .handle(HandlerSpec::closure(|_, _| Ok(HandlerOutput::Nothing)))
            .unwrap();
        kernel
            .router_mut()
            .blueprint()
            .get()
            .url("/not-found")
            .handle(HandlerSpec::closure(|_, _| Err(KernelError::NotFound)))
            .unwrap();

        let response = kernel.handle(Request::get("/missing-controller").unwrap(), Arguments::new()).unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(kernel.phase(), RequestPhase::ErrorHandled);

        let response = kernel.handle(Request::get("/nothing").unwrap(), Arguments::new()).unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = kernel.handle(Request::get("/not-found").unwrap(), Arguments::new()).unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_panics_are_caught() {
        let mut kernel = kernel(true);
        kernel
            .router_mut()
            .blueprint()
            .get()
            .url("/boom")
            .handle(HandlerSpec::closure(|_, _| panic!("kaboom")))
            .unwrap();

        let request = Request::get("/boom")
            .unwrap()
            .with_header("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        let response = kernel.handle(request, Arguments::new()).unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["exception"], "panic");
        assert_eq!(body["message"], "Handler panicked: kaboom");
    }

    #[test]
    fn test_filter_query_uses_first_satisfied_route() {
        let mut kernel = kernel(false);
        kernel
            .router_mut()
            .blueprint()
            .methods([Method::GET])
            .url("/books/{slug}")
            .query(|mut vars, args| {
                vars.insert("name".into(), args[0].clone());
                vars
            })
            .handle("Books@show")
            .unwrap();

        let vars = kernel
            .filter_query(&Request::get("/books/dune").unwrap(), QueryVars::new())
            .unwrap();
        assert_eq!(vars.get("name"), Some(&json!("dune")));

        let untouched = kernel
            .filter_query(&Request::get("/elsewhere").unwrap(), QueryVars::new())
            .unwrap();
        assert!(untouched.is_empty());
    }
}
