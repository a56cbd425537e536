//! gRPC and gRPC-Web through the protocol multiplexer.

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use http::{HeaderValue, Method, Request, StatusCode};
use http_body_util::Full;
use prost::Message;

use terminal_gateway::auth::ListenerPort;
use terminal_gateway::endpoints::BackendName;
use terminal_gateway::proto::{lnrpc, looprpc};
use terminal_gateway::server::framing::{encode_frame, FRAME_HEADER_LEN, TRAILER_FLAG};

use crate::common::{basic, collect, Harness, NODE_PUBKEY, SWAP_ID, UI_PASSWORD};

fn grpc_web_request(method: &str, content_type: &'static str, body: Bytes) -> Request<Full<Bytes>> {
    Request::builder()
        .method(Method::POST)
        .uri(method)
        .header("content-type", content_type)
        .header("x-grpc-web", "1")
        .body(Full::new(body))
        .unwrap()
}

/// Split a gRPC-Web response body into its data payload and trailer block.
fn split_frames(body: &[u8]) -> (Bytes, String) {
    let mut data = Bytes::new();
    let mut trailers = String::new();
    let mut rest = body;
    while rest.len() >= FRAME_HEADER_LEN {
        let flags = rest[0];
        let len = u32::from_be_bytes([rest[1], rest[2], rest[3], rest[4]]) as usize;
        let payload = &rest[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len];
        if flags & TRAILER_FLAG != 0 {
            trailers.push_str(std::str::from_utf8(payload).unwrap());
        } else {
            data = Bytes::copy_from_slice(payload);
        }
        rest = &rest[FRAME_HEADER_LEN + len..];
    }
    assert!(rest.is_empty(), "trailing bytes in body");
    (data, trailers)
}

#[tokio::test]
async fn test_unauthenticated_call_reports_status_in_headers() {
    let harness = Harness::new();
    let request = grpc_web_request(
        lnrpc::GET_INFO,
        "application/grpc-web+proto",
        encode_frame(0, &[]),
    );

    let response = harness.request(ListenerPort::Gateway, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["grpc-status"], "2");
    assert_eq!(
        response.headers()["grpc-message"],
        "expected 1 macaroon, got 0"
    );
    assert!(response.headers().contains_key("x-correlation-id"));

    let (body, _) = collect(response).await;
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_password_call_returns_data_and_trailer_frames() {
    let harness = Harness::new();
    let mut request = grpc_web_request(
        lnrpc::GET_INFO,
        "application/grpc-web+proto",
        encode_frame(0, &[]),
    );
    request
        .headers_mut()
        .insert("authorization", basic(UI_PASSWORD));

    let response = harness.request(ListenerPort::Gateway, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "application/grpc-web+proto"
    );
    assert_eq!(response.headers()["x-daemon"], "lnd");

    let (body, _) = collect(response).await;
    let (data, trailers) = split_frames(&body);
    let reply = lnrpc::GetInfoResponse::decode(data).unwrap();
    assert_eq!(reply.identity_pubkey, NODE_PUBKEY);
    assert!(trailers.contains("grpc-status: 0"), "{trailers}");
}

#[tokio::test]
async fn test_text_variant_is_base64_both_ways() {
    let harness = Harness::new();
    let body = Bytes::from(STANDARD.encode(encode_frame(0, &[])));
    let mut request = grpc_web_request(looprpc::LIST_SWAPS, "application/grpc-web-text", body);
    request.headers_mut().insert(
        "macaroon",
        HeaderValue::from_str(&harness.macaroon(BackendName::Loop)).unwrap(),
    );

    let response = harness.request(ListenerPort::Gateway, request).await;
    assert_eq!(
        response.headers()["content-type"],
        "application/grpc-web-text+proto"
    );
    let (body, _) = collect(response).await;
    let decoded = STANDARD.decode(&body).unwrap();
    let (data, trailers) = split_frames(&decoded);
    let reply = looprpc::ListSwapsResponse::decode(data).unwrap();
    assert_eq!(reply.swaps[0].id, SWAP_ID);
    assert!(trailers.contains("grpc-status: 0"));
}

#[tokio::test]
async fn test_grpc_web_is_not_served_on_core_port() {
    let harness = Harness::new();
    let request = grpc_web_request(
        lnrpc::GET_INFO,
        "application/grpc-web+proto",
        encode_frame(0, &[]),
    );
    let response = harness.request(ListenerPort::Core, request).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_native_grpc_reply_carries_status_in_trailers() {
    let harness = Harness::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri(looprpc::LIST_SWAPS)
        .header("content-type", "application/grpc")
        .header("te", "trailers")
        .header("macaroon", harness.macaroon(BackendName::Loop))
        .body(Full::new(encode_frame(0, &[])))
        .unwrap();

    let response = harness.request(ListenerPort::Core, request).await;
    assert_eq!(response.headers()["content-type"], "application/grpc");
    let (body, trailers) = collect(response).await;
    let trailers = trailers.unwrap();
    assert_eq!(trailers["grpc-status"], "0");

    let (data, _) = split_frames(&body);
    let reply = looprpc::ListSwapsResponse::decode(data).unwrap();
    assert_eq!(reply.swaps.len(), 1);
}

#[tokio::test]
async fn test_native_grpc_failure_is_trailers_only() {
    let harness = Harness::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri(looprpc::LIST_SWAPS)
        .header("content-type", "application/grpc")
        .header("macaroon", hex::encode(b"dummy"))
        .body(Full::new(encode_frame(0, &[])))
        .unwrap();

    let response = harness.request(ListenerPort::Core, request).await;
    assert_eq!(response.headers()["grpc-status"], "2");
    assert_eq!(
        response.headers()["grpc-message"],
        "unable to unmarshal macaroon: packet too short"
    );
    let (body, _) = collect(response).await;
    assert!(body.is_empty());
}
