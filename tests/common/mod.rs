//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::json;

use trellis::config::AppConfig;
use trellis::error::Result;
use trellis::handler::{unknown_method, Controller, ControllerRegistry, HandlerOutput};
use trellis::http::HostContext;
use trellis::middleware::{builtin, CsrfTokens, Middleware, MiddlewareRegistry, Next};
use trellis::{Application, Arguments, Request, Response};

pub const HOME: &str = "http://example.com/";
pub const TOKEN: &str = "s3cret";

pub type Log = Arc<Mutex<Vec<String>>>;

/// Appends its first argument to the log before continuing.
pub struct Recorder {
    pub log: Log,
}

impl Middleware for Recorder {
    fn handle(&self, request: Request, next: Next<'_>, args: &[String]) -> Result<Response> {
        self.log.lock().unwrap().push(args.join(","));
        next.run(request)
    }
}

/// Accepts a single fixed token.
pub struct FixedTokens;

impl CsrfTokens for FixedTokens {
    fn generate(&self, _action: &str) -> String {
        TOKEN.to_string()
    }

    fn is_valid(&self, token: &str, _action: &str) -> bool {
        token == TOKEN
    }
}

pub struct Posts;

impl Controller for Posts {
    fn call(&self, method: &str, _request: &Request, arguments: &Arguments) -> Result<HandlerOutput> {
        match method {
            "index" => Ok("all posts".into()),
            "show" => Ok(json!({ "id": arguments.get("id") }).into()),
            "boom" => panic!("controller exploded"),
            other => Err(unknown_method("Posts", other)),
        }
    }

    fn middleware(&self, method: &str) -> Vec<String> {
        match method {
            "show" => vec!["record:controller".to_string()],
            _ => Vec::new(),
        }
    }
}

pub fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.home_url = HOME.to_string();
    config
}

pub fn application(config: AppConfig) -> (Application, Log) {
    let log = Log::default();

    let mut middleware = MiddlewareRegistry::new();
    builtin::register_defaults(&mut middleware, Some(Arc::new(FixedTokens)));
    middleware.instance("record", Recorder { log: log.clone() });

    let mut controllers = ControllerRegistry::new();
    controllers.singleton("app::Posts", Posts);

    let app = Application::new(config, middleware, controllers).unwrap();
    (app, log)
}

pub fn get(path: &str) -> Request {
    Request::get(&format!("http://example.com{path}")).unwrap()
}

pub fn post(path: &str) -> Request {
    Request::post(&format!("http://example.com{path}")).unwrap()
}

pub fn logged_in(capabilities: &[&str]) -> HostContext {
    HostContext {
        logged_in: true,
        capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        ..HostContext::default()
    }
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}
