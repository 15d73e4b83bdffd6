//! Trellis demonstration server.
//!
//! ```text
//! axum (tower-http trace/timeout/limit)
//!     → http::server (Request conversion, blocking dispatch)
//!     → Application → HttpKernel
//!         → Router (first satisfied route)
//!         → middleware pipeline
//!         → handler
//!     → Response, or 404 when nothing matched
//! ```

use std::path::PathBuf;

use axum::http::HeaderValue;
use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;

use trellis::config::{load_config, AppConfig};
use trellis::error::Result;
use trellis::handler::{unknown_method, Controller, ControllerRegistry, HandlerOutput, HandlerSpec};
use trellis::middleware::{builtin, MiddlewareRegistry, Next};
use trellis::observability::{logging, metrics};
use trellis::routing::conditions::ConditionSpec;
use trellis::{Application, Arguments, ConfigurationError, HttpServer, Request, Response, RouteContext, Router};

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Serve a demonstration route table", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

struct Pages;

impl Controller for Pages {
    fn call(&self, method: &str, request: &Request, arguments: &Arguments) -> Result<HandlerOutput> {
        match method {
            "index" => Ok("Welcome to trellis.".into()),
            "show" => Ok(json!({
                "page": arguments.get("slug"),
                "method": request.method().as_str(),
            })
            .into()),
            other => Err(unknown_method("Pages", other)),
        }
    }

    fn middleware(&self, method: &str) -> Vec<String> {
        match method {
            "show" => vec!["powered_by:pages".to_string()],
            _ => Vec::new(),
        }
    }
}

fn powered_by(request: Request, next: Next<'_>, args: &[String]) -> Result<Response> {
    let response = next.run(request)?;
    let value = format!("trellis/{}", args.first().map_or("core", String::as_str));
    match HeaderValue::from_str(&value) {
        Ok(value) => Ok(response.with_header("x-powered-by", value)),
        Err(_) => Ok(response),
    }
}

fn routes(router: &mut Router) -> std::result::Result<(), ConfigurationError> {
    router.blueprint().get().url("/").name("home").handle("Pages@index")?;
    router
        .blueprint()
        .get()
        .url_where("/pages/{slug}", [("slug", "^[a-z0-9-]+$")])
        .name("pages.show")
        .handle("Pages@show")?;
    router
        .blueprint()
        .url("/account")
        .middleware(["user.logged_in"])
        .group(|router| {
            router
                .blueprint()
                .get()
                .url("/")
                .name("account")
                .handle(HandlerSpec::closure(|_, _| Ok("Your account".into())))?;
            Ok(())
        })?;
    router
        .blueprint()
        .get()
        .condition(ConditionSpec::predicate(
            |request, _| request.query("ping").is_some(),
            vec![],
        ))
        .handle(HandlerSpec::closure(|_, _| Ok("pong".into())))?;
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("trellis v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut middleware = MiddlewareRegistry::new();
    builtin::register_defaults(&mut middleware, None);
    middleware.instance("powered_by", powered_by);

    let mut controllers = ControllerRegistry::new();
    controllers.singleton("Pages", Pages);

    let bind_address = config.listener.bind_address.clone();
    let mut app = Application::new(config, middleware, controllers)?;
    app.render_configuration_errors(|app| app.load_routes(RouteContext::Web, routes))?;

    let listener = TcpListener::bind(&bind_address).await?;
    HttpServer::new(app).run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
