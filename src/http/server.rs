//! HTTP server setup.
//!
//! # Responsibilities
//! - Convert axum requests into `Request`s with an absolute URL
//! - Run the application on a blocking thread; the routing core is synchronous
//! - Fall back to 404 when no route matches
//! - Wire up tower-http layers (tracing, timeout, body limit)
//! - Shut down gracefully on Ctrl+C

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response as AxumResponse},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use url::{Position, Url};

use crate::app::Application;
use crate::http::Request;
use crate::routing::Arguments;

/// Body sent when no route claims a request.
pub const NO_ROUTE_BODY: &str = "No matching route found";

#[derive(Clone)]
struct ServerState {
    app: Arc<Mutex<Application>>,
    home_url: Url,
    max_body_bytes: usize,
}

/// axum front for an `Application`.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(app: Application) -> Self {
        let listener = app.config().listener.clone();
        let state = ServerState {
            home_url: app.home_url().clone(),
            app: Arc::new(Mutex::new(app)),
            max_body_bytes: listener.max_body_bytes,
        };

        let router = Self::build_router(state, listener.request_timeout_secs, listener.max_body_bytes);
        Self { router }
    }

    #[allow(deprecated)]
    fn build_router(state: ServerState, timeout_secs: u64, max_body_bytes: usize) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// The axum router, for serving elsewhere or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn dispatch(State(state): State<ServerState>, request: axum::extract::Request) -> AxumResponse {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(error = %err, "Rejected request body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let url = match absolute_url(&parts, &state.home_url) {
        Ok(url) => url,
        Err(err) => {
            tracing::debug!(error = %err, uri = %parts.uri, "Unparsable request URL");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let request = Request::from_parts(parts.method, url, parts.headers, body)
        .with_home_url(state.home_url.clone());

    let app = state.app.clone();
    let handled = tokio::task::spawn_blocking(move || {
        let mut app = app.lock().map_err(|_| "application lock poisoned")?;
        Ok::<_, &'static str>(app.handle(request, Arguments::new()))
    })
    .await;

    match handled {
        Ok(Ok(Some(response))) => response.into_response(),
        Ok(Ok(None)) => (StatusCode::NOT_FOUND, NO_ROUTE_BODY).into_response(),
        Ok(Err(reason)) => {
            tracing::error!(reason, "Application unavailable");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "Request task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Rebuild the absolute request URL. The scheme comes from the home URL;
/// the authority from the Host header, else the home URL.
fn absolute_url(parts: &Parts, home_url: &Url) -> Result<Url, url::ParseError> {
    let authority = parts
        .headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(ToString::to_string))
        .unwrap_or_else(|| home_url[Position::BeforeHost..Position::AfterPort].to_string());

    let path = parts
        .uri
        .path_and_query()
        .map(|path| path.as_str())
        .unwrap_or("/");

    Url::parse(&format!("{}://{}{}", home_url.scheme(), authority, path))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{HeaderValue, Uri};

    use super::*;

    fn parts(uri: &str, host: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri(uri.parse::<Uri>().unwrap());
        if let Some(host) = host {
            builder = builder.header(header::HOST, HeaderValue::from_str(host).unwrap());
        }
        builder.body(Body::empty()).unwrap().into_parts().0
    }

    #[test]
    fn test_absolute_url_prefers_host_header() {
        let home = Url::parse("https://example.com/").unwrap();
        let url = absolute_url(&parts("/a/b?x=1", Some("site.test:8080")), &home).unwrap();
        assert_eq!(url.as_str(), "https://site.test:8080/a/b?x=1");
    }

    #[test]
    fn test_absolute_url_falls_back_to_home() {
        let home = Url::parse("http://localhost:8080/").unwrap();
        let url = absolute_url(&parts("/posts", None), &home).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/posts");
    }
}
