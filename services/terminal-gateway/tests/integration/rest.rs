//! REST/JSON transcoding on the gateway listener.

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::Full;
use prost::Message;
use serde_json::Value;

use terminal_gateway::auth::ListenerPort;
use terminal_gateway::endpoints::BackendName;
use terminal_gateway::proto::lnrpc;

use crate::common::{basic, collect, Harness, NODE_PUBKEY, SWAP_ID, UI_PASSWORD};

fn get(path: &str) -> http::request::Builder {
    Request::builder().method(Method::GET).uri(path)
}

async fn json(harness: &Harness, request: Request<Full<Bytes>>) -> (StatusCode, http::HeaderMap, Value) {
    let response = harness.request(ListenerPort::Gateway, request).await;
    let status = response.status();
    let headers = response.headers().clone();
    let (body, _) = collect(response).await;
    (status, headers, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_auth_failure_is_reported_in_band() {
    let harness = Harness::new();
    let request = get("/v1/getinfo").body(Full::new(Bytes::new())).unwrap();

    let (status, headers, body) = json(&harness, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/json");
    assert!(headers.contains_key("x-correlation-id"));
    assert_eq!(body["code"], 2);
    assert_eq!(body["message"], "expected 1 macaroon, got 0");
    assert_eq!(body["details"], Value::Array(Vec::new()));
}

#[tokio::test]
async fn test_password_authorized_request() {
    let harness = Harness::new();
    let request = get("/v1/getinfo")
        .header("authorization", basic(UI_PASSWORD))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (status, headers, body) = json(&harness, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["grpc-metadata-x-daemon"], "lnd");
    assert_eq!(body["identity_pubkey"], NODE_PUBKEY);
}

#[tokio::test]
async fn test_credential_in_plain_header() {
    let harness = Harness::new();
    let request = get("/v1/loop/swaps")
        .header("macaroon", harness.macaroon(BackendName::Loop))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (status, _, body) = json(&harness, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["swaps"][0]["id"], SWAP_ID);
}

#[tokio::test]
async fn test_credential_in_prefixed_metadata_header() {
    let harness = Harness::new();
    let request = get("/v1/pool/info")
        .header("grpc-metadata-macaroon", harness.macaroon(BackendName::Pool))
        .body(Full::new(Bytes::new()))
        .unwrap();

    let (status, _, body) = json(&harness, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accounts_total"], 3);
}

#[tokio::test]
async fn test_post_body_is_transcoded_to_protobuf() {
    let harness = Harness::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/invoices")
        .header("content-type", "application/json")
        .header("macaroon", harness.macaroon(BackendName::Lnd))
        .body(Full::new(Bytes::from_static(
            br#"{"memo": "coffee", "value": "2100"}"#,
        )))
        .unwrap();

    let (status, _, body) = json(&harness, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_request"], "lnbcrt1fake");

    let calls = harness.daemon(BackendName::Lnd).calls();
    let invoice = lnrpc::Invoice::decode(calls[0].message.clone()).unwrap();
    assert_eq!(invoice.memo, "coffee");
    assert_eq!(invoice.value, 2100);
}

#[tokio::test]
async fn test_malformed_json_is_a_bad_request() {
    let harness = Harness::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/invoices")
        .header("authorization", basic(UI_PASSWORD))
        .body(Full::new(Bytes::from_static(b"{not json")))
        .unwrap();

    let (status, _, body) = json(&harness, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 3);
}

#[tokio::test]
async fn test_wrong_verb_on_rest_path() {
    let harness = Harness::new();
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/v1/getinfo")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = harness.request(ListenerPort::Gateway, request).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["allow"], "GET");
}

#[tokio::test]
async fn test_rest_is_not_served_on_core_port() {
    let harness = Harness::new();
    let request = get("/v1/getinfo").body(Full::new(Bytes::new())).unwrap();
    let response = harness.request(ListenerPort::Core, request).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}
