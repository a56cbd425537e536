//! The single-page UI on the gateway listener.

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::Full;

use terminal_gateway::auth::ListenerPort;

use crate::common::{collect, Harness, UI_MARKER};

async fn fetch(harness: &Harness, port: ListenerPort, path: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = harness.request(port, request).await;
    let status = response.status();
    let (body, _) = collect(response).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}

#[tokio::test]
async fn test_index_is_served() {
    let harness = Harness::new();
    let (status, body) = fetch(&harness, ListenerPort::Gateway, "/index.html").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(UI_MARKER));
}

#[tokio::test]
async fn test_assets_are_served() {
    let harness = Harness::new();
    let (status, body) = fetch(&harness, ListenerPort::Gateway, "/app.js").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("console.log"));
}

#[tokio::test]
async fn test_client_routes_fall_back_to_index() {
    let harness = Harness::new();
    for path in ["/loop", "/pool/orders", "/"] {
        let (status, body) = fetch(&harness, ListenerPort::Gateway, path).await;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert!(body.contains(UI_MARKER), "{path}");
    }
}

#[tokio::test]
async fn test_ui_is_not_served_on_core_port() {
    let harness = Harness::new();
    let (status, _) = fetch(&harness, ListenerPort::Core, "/index.html").await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_non_get_outside_api_is_not_found() {
    let harness = Harness::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/loop")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = harness.request(ListenerPort::Gateway, request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
