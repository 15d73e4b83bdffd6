//! The axum adapter in front of an application.

use axum::body::Body;
use axum::http::{header, Request as HttpRequest, StatusCode};
use tower::ServiceExt;

use trellis::handler::HandlerSpec;
use trellis::http::server::NO_ROUTE_BODY;
use trellis::{HttpServer, RouteContext};

mod common;

use common::{application, config};

fn server(max_body_bytes: usize) -> HttpServer {
    let mut config = config();
    config.listener.max_body_bytes = max_body_bytes;

    let (mut app, _) = application(config);
    app.load_routes(RouteContext::Web, |router| {
        router
            .blueprint()
            .get()
            .url("/hello/{name}")
            .handle(HandlerSpec::closure(|request, arguments| {
                let host = request.url().host_str().unwrap_or_default().to_string();
                Ok(format!("{} from {host}", arguments.get_str("name").unwrap_or_default()).into())
            }))?;
        router
            .blueprint()
            .post()
            .url("/echo")
            .handle(HandlerSpec::closure(|request, _| {
                Ok(String::from_utf8_lossy(request.body()).into_owned().into())
            }))?;
        Ok(())
    })
    .unwrap();

    HttpServer::new(app)
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_matched_route_is_served() {
    let request = HttpRequest::builder()
        .uri("/hello/ana")
        .body(Body::empty())
        .unwrap();

    let response = server(1024).router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ana from example.com");
}

#[tokio::test]
async fn test_host_header_is_kept() {
    let request = HttpRequest::builder()
        .uri("/hello/bo")
        .header(header::HOST, "example.com")
        .body(Body::empty())
        .unwrap();

    let response = server(1024).router().oneshot(request).await.unwrap();
    assert_eq!(body_text(response).await, "bo from example.com");
}

#[tokio::test]
async fn test_unmatched_request_falls_back_to_404() {
    let request = HttpRequest::builder()
        .uri("/nothing/here")
        .body(Body::empty())
        .unwrap();

    let response = server(1024).router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, NO_ROUTE_BODY);
}

#[tokio::test]
async fn test_request_body_reaches_handler() {
    let request = HttpRequest::builder()
        .method("POST")
        .uri("/echo")
        .body(Body::from("payload"))
        .unwrap();

    let response = server(1024).router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "payload");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let request = HttpRequest::builder()
        .method("POST")
        .uri("/echo")
        .body(Body::from("x".repeat(64)))
        .unwrap();

    let response = server(8).router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
