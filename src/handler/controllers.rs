//! Controllers and the registry that instantiates them.
//!
//! # Responsibilities
//! - `Controller`: string-keyed method dispatch plus optional per-method middleware
//! - `ControllerRegistry`: singletons first, then registered constructors
//! - `ControllerMiddleware`: middleware limited with `only` / `except`

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigurationError, KernelError, Result};
use crate::handler::output::HandlerOutput;
use crate::http::Request;
use crate::routing::Arguments;

/// A class-style request handler.
pub trait Controller: Send + Sync {
    /// Dispatch `method`. Unknown methods should return [`unknown_method`].
    fn call(&self, method: &str, request: &Request, arguments: &Arguments) -> Result<HandlerOutput>;

    /// Middleware this controller declares for `method`.
    fn middleware(&self, _method: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Error for a method the controller does not expose.
pub fn unknown_method(class: &str, method: &str) -> KernelError {
    ConfigurationError::UnknownControllerMethod {
        class: class.to_string(),
        method: method.to_string(),
    }
    .into()
}

type ControllerConstructor = Arc<dyn Fn() -> Arc<dyn Controller> + Send + Sync>;

/// Name → controller lookup.
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    singletons: HashMap<String, Arc<dyn Controller>>,
    constructors: HashMap<String, ControllerConstructor>,
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut singletons: Vec<_> = self.singletons.keys().collect();
        singletons.sort();
        let mut constructors: Vec<_> = self.constructors.keys().collect();
        constructors.sort();
        f.debug_struct("ControllerRegistry")
            .field("singletons", &singletons)
            .field("constructors", &constructors)
            .finish()
    }
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share one instance for every request.
    pub fn singleton<C: Controller + 'static>(&mut self, class: impl Into<String>, controller: C) {
        self.singletons.insert(class.into(), Arc::new(controller));
    }

    /// Build a fresh instance per resolution.
    pub fn register<C, F>(&mut self, class: impl Into<String>, constructor: F)
    where
        C: Controller + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.constructors.insert(
            class.into(),
            Arc::new(move || Arc::new(constructor()) as Arc<dyn Controller>),
        );
    }

    pub fn contains(&self, class: &str) -> bool {
        self.singletons.contains_key(class) || self.constructors.contains_key(class)
    }

    /// Instance for exactly `class`, if known.
    pub fn make(&self, class: &str) -> Option<Arc<dyn Controller>> {
        if let Some(instance) = self.singletons.get(class) {
            return Some(instance.clone());
        }
        self.constructors.get(class).map(|constructor| constructor())
    }

    /// Try `class`, then `namespace` + `class`.
    pub fn resolve(&self, class: &str, namespace: &str) -> Result<Arc<dyn Controller>> {
        if let Some(instance) = self.make(class) {
            return Ok(instance);
        }

        let mut tried = vec![class.to_string()];
        if !namespace.is_empty() {
            let qualified = format!("{namespace}{class}");
            if let Some(instance) = self.make(&qualified) {
                return Ok(instance);
            }
            tried.push(qualified);
        }

        Err(KernelError::ClassNotFound { tried })
    }
}

/// Middleware a controller applies to some of its methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerMiddleware {
    middleware: Vec<String>,
    only: Vec<String>,
    except: Vec<String>,
}

impl ControllerMiddleware {
    pub fn new<I, S>(middleware: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            middleware: middleware.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Restrict to these methods.
    pub fn only<I, S>(&mut self, methods: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Skip these methods.
    pub fn except<I, S>(&mut self, methods: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn get(&self) -> &[String] {
        &self.middleware
    }

    pub fn applies_to(&self, method: &str) -> bool {
        if self.except.iter().any(|m| m == method) {
            return false;
        }
        self.only.is_empty() || self.only.iter().any(|m| m == method)
    }
}

/// Ordered middleware declarations of one controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerMiddlewareSet {
    entries: Vec<ControllerMiddleware>,
}

impl ControllerMiddlewareSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare middleware; narrow it with `only` / `except` on the result.
    pub fn add<I, S>(&mut self, middleware: I) -> &mut ControllerMiddleware
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.push(ControllerMiddleware::new(middleware));
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    /// Middleware applying to `method`, in declaration order.
    pub fn for_method(&self, method: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.applies_to(method))
            .flat_map(|entry| entry.get().iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Posts {
        middleware: ControllerMiddlewareSet,
    }

    impl Posts {
        fn new() -> Self {
            let mut middleware = ControllerMiddlewareSet::new();
            middleware.add(["user.logged_in"]).except(["index"]);
            middleware.add(["csrf"]).only(["store"]);
            Self { middleware }
        }
    }

    impl Controller for Posts {
        fn call(&self, method: &str, _request: &Request, arguments: &Arguments) -> Result<HandlerOutput> {
            match method {
                "index" => Ok("index".into()),
                "show" => Ok(format!("show {}", arguments.get_str("id").unwrap_or("?")).into()),
                _ => Err(unknown_method("Posts", method)),
            }
        }

        fn middleware(&self, method: &str) -> Vec<String> {
            self.middleware.for_method(method)
        }
    }

    #[test]
    fn test_controller_middleware_filters() {
        let posts = Posts::new();
        assert!(posts.middleware("index").is_empty());
        assert_eq!(posts.middleware("show"), vec!["user.logged_in"]);
        assert_eq!(posts.middleware("store"), vec!["user.logged_in", "csrf"]);
    }

    #[test]
    fn test_resolve_tries_bare_then_namespaced() {
        let mut registry = ControllerRegistry::new();
        registry.register("app::Posts", Posts::new);

        assert!(registry.resolve("app::Posts", "").is_ok());
        assert!(registry.resolve("Posts", "app::").is_ok());

        let err = registry.resolve("Pages", "app::").err().unwrap();
        assert_eq!(err.to_string(), "Class not found - tried: Pages, app::Pages");
    }

    #[test]
    fn test_singletons_are_shared_and_constructors_are_fresh() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        let mut registry = ControllerRegistry::new();
        registry.singleton("Shared", Posts::new());
        registry.register("Fresh", || {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Posts::new()
        });

        let a = registry.make("Shared").unwrap();
        let b = registry.make("Shared").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        registry.make("Fresh").unwrap();
        registry.make("Fresh").unwrap();
        assert_eq!(BUILT.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_method() {
        let request = Request::get("/").unwrap();
        let err = Posts::new()
            .call("destroy", &request, &Arguments::new())
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Method \"destroy\" not found on controller \"Posts\".");
    }
}
