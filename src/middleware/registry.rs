use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Middleware;
use crate::error::{KernelError, Result};

type MiddlewareConstructor = Arc<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;

/// Key → middleware table.
///
/// Keys are what molecules resolve to; aliases in the definitions point here.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    instances: HashMap<String, Arc<dyn Middleware>>,
    constructors: HashMap<String, MiddlewareConstructor>,
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.keys().collect();
        keys.sort();
        f.debug_struct("MiddlewareRegistry").field("keys", &keys).finish()
    }
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared instance.
    pub fn instance<M: Middleware + 'static>(&mut self, key: impl Into<String>, middleware: M) -> &mut Self {
        self.instances.insert(key.into(), Arc::new(middleware));
        self
    }

    /// Register a constructor invoked for every use.
    pub fn register<M, F>(&mut self, key: impl Into<String>, constructor: F) -> &mut Self
    where
        M: Middleware + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.constructors.insert(
            key.into(),
            Arc::new(move || Arc::new(constructor()) as Arc<dyn Middleware>),
        );
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.instances.contains_key(key) || self.constructors.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.instances
            .keys()
            .chain(self.constructors.keys())
            .map(String::as_str)
    }

    pub fn make(&self, key: &str) -> Result<Arc<dyn Middleware>> {
        if let Some(instance) = self.instances.get(key) {
            return Ok(instance.clone());
        }

        self.constructors
            .get(key)
            .map(|constructor| constructor())
            .ok_or_else(|| KernelError::ClassNotFound {
                tried: vec![key.to_string()],
            })
    }
}
