//! Application context.
//!
//! # Responsibilities
//! - Build the router, middleware definitions and kernel from `AppConfig`
//! - Load route definitions under the defaults of a request context
//! - Turn configuration errors raised while booting into a diagnostic page
//!   when configured to
//!
//! # Design Decisions
//! - One explicit object owns everything a request needs; there is no global container
//! - Registries are filled by the caller before the application is built

use ::url::Url;
use thiserror::Error;

use crate::config::{AppConfig, ConfigError};
use crate::config::validation::validate_config;
use crate::error::{ConfigurationError, KernelError};
use crate::handler::{ControllerRegistry, HandlerSpec};
use crate::http::{Request, Response};
use crate::kernel::{DefaultErrorHandler, ErrorHandler, HttpKernel};
use crate::middleware::{MiddlewareDefinitions, MiddlewareRegistry};
use crate::routing::{Arguments, ConditionFactory, QueryVars, RouteAttributes, Router, UrlContext};

/// Failure to build an `Application`.
#[derive(Debug, Error)]
pub enum BootFailure {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{field} is not a valid URL: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: ::url::ParseError,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Kind of request a set of route definitions serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteContext {
    Web,
    Admin,
    Ajax,
    Rest,
}

impl RouteContext {
    pub const ALL: [RouteContext; 4] = [
        RouteContext::Web,
        RouteContext::Admin,
        RouteContext::Ajax,
        RouteContext::Rest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteContext::Web => "web",
            RouteContext::Admin => "admin",
            RouteContext::Ajax => "ajax",
            RouteContext::Rest => "rest",
        }
    }
}

pub struct Application {
    config: AppConfig,
    home_url: Url,
    kernel: HttpKernel,
    configuration_error: Option<ConfigurationError>,
}

impl Application {
    pub fn new(
        config: AppConfig,
        middleware: MiddlewareRegistry,
        controllers: ControllerRegistry,
    ) -> Result<Self, BootFailure> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let home_url = parse_url("home_url", &config.home_url)?;
        let url_context = if config.admin_url.is_empty() {
            UrlContext::from_home(home_url.clone())
        } else {
            UrlContext::new(home_url.clone(), parse_url("admin_url", &config.admin_url)?)
        };

        let definitions = MiddlewareDefinitions::from_config(&config.middleware, middleware);
        definitions.validate()?;

        let router = Router::new(ConditionFactory::with_defaults(), url_context);
        let kernel = HttpKernel::new(
            router,
            definitions,
            controllers,
            DefaultErrorHandler::new(config.debug.enabled),
        );

        tracing::info!(home_url = %home_url, debug = config.debug.enabled, "Application built");

        Ok(Self {
            config,
            home_url,
            kernel,
            configuration_error: None,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn home_url(&self) -> &Url {
        &self.home_url
    }

    pub fn kernel(&self) -> &HttpKernel {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut HttpKernel {
        &mut self.kernel
    }

    pub fn router_mut(&mut self) -> &mut Router {
        self.kernel.router_mut()
    }

    /// Configuration error captured by `render_configuration_errors`.
    pub fn configuration_error(&self) -> Option<&ConfigurationError> {
        self.configuration_error.as_ref()
    }

    /// Group attributes configured for `context`. The context's own
    /// middleware group is listed first when it exists.
    pub fn context_attributes(&self, context: RouteContext) -> RouteAttributes {
        let group = context.as_str();
        let defaults = self.config.routes.get(group).cloned().unwrap_or_default();

        let mut middleware = defaults.middleware;
        if !middleware.iter().any(|name| name == group) && self.kernel.definitions().has_group(group) {
            middleware.insert(0, group.to_string());
        }

        RouteAttributes {
            middleware,
            namespace: defaults.namespace,
            handler: (!defaults.handler.is_empty()).then(|| HandlerSpec::from(defaults.handler)),
            ..RouteAttributes::default()
        }
    }

    /// Define routes inside a group carrying the defaults of `context`.
    pub fn load_routes<F>(&mut self, context: RouteContext, define: F) -> Result<(), ConfigurationError>
    where
        F: FnOnce(&mut Router) -> Result<(), ConfigurationError>,
    {
        let attributes = self.context_attributes(context);
        tracing::debug!(context = context.as_str(), "Loading routes");
        self.kernel.router_mut().group(attributes, define)
    }

    /// Run `action`. With `debug.render_configuration_errors` set, a
    /// configuration error it raises is kept and every later request is
    /// answered with a diagnostic page instead.
    pub fn render_configuration_errors<F>(&mut self, action: F) -> Result<(), ConfigurationError>
    where
        F: FnOnce(&mut Self) -> Result<(), ConfigurationError>,
    {
        match action(self) {
            Ok(()) => Ok(()),
            Err(error) if self.config.debug.render_configuration_errors => {
                tracing::error!(error = %error, "Configuration error, serving diagnostics");
                self.configuration_error = Some(error);
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Route and run a request. `None` means the host should fall back to
    /// its default behaviour.
    pub fn handle(&mut self, request: Request, arguments: Arguments) -> Option<Response> {
        let request = self.prepare(request);

        if let Some(error) = &self.configuration_error {
            let error = KernelError::Configuration(error.clone());
            let handler = DefaultErrorHandler::new(self.config.debug.enabled);
            return Some(handler.response(&request, &error));
        }

        self.kernel.handle(request, arguments)
    }

    pub fn filter_query(&self, request: Request, vars: QueryVars) -> Result<QueryVars, ConfigurationError> {
        let request = self.prepare(request);
        self.kernel.filter_query(&request, vars)
    }

    /// URL of a named route.
    pub fn route_url(&self, name: &str, arguments: &Arguments) -> Result<String, ConfigurationError> {
        self.kernel.router().route_url(name, arguments)
    }

    fn prepare(&self, request: Request) -> Request {
        if request.home_url().is_some() {
            request
        } else {
            request.with_home_url(self.home_url.clone())
        }
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, BootFailure> {
    Url::parse(value).map_err(|source| BootFailure::InvalidUrl { field, source })
}
