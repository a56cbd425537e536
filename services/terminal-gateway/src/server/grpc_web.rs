//! gRPC-Web, binary and base64 text variants.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};
use http_body::Body;
use tower::ServiceExt;
use uuid::Uuid;

use super::body::{empty, full, read_body, BoxError, GatewayBody};
use super::framing::{
    decode_single_frame, encode_frame, encode_trailer_frame, ok_trailers, status_headers,
};
use super::MAX_MESSAGE_SIZE;
use crate::auth::ListenerPort;
use crate::call::{relayable_metadata, GatewayCall, PeerAddr, Protocol};
use crate::error::GatewayError;
use crate::middleware::ApiService;

/// Header browsers' gRPC-Web clients add to every call.
pub const GRPC_WEB_HEADER: &str = "x-grpc-web";

/// Which gRPC-Web encoding a call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrpcWebVariant {
    /// `application/grpc-web[+proto]`
    Binary,
    /// `application/grpc-web-text[+proto]`, base64 bodies
    Text,
}

impl GrpcWebVariant {
    /// Variant named by a request content type.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        if essence.starts_with("application/grpc-web-text") {
            Some(Self::Text)
        } else if essence.starts_with("application/grpc-web") {
            Some(Self::Binary)
        } else {
            None
        }
    }

    /// Content type of responses.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Binary => "application/grpc-web+proto",
            Self::Text => "application/grpc-web-text+proto",
        }
    }

    fn decode(self, body: Bytes) -> Result<Bytes, GatewayError> {
        match self {
            Self::Binary => Ok(body),
            Self::Text => {
                let compact: Vec<u8> = body
                    .iter()
                    .copied()
                    .filter(|b| !b.is_ascii_whitespace())
                    .collect();
                STANDARD
                    .decode(compact)
                    .map(Bytes::from)
                    .map_err(|e| GatewayError::InvalidRequest {
                        reason: format!("invalid grpc-web-text body: {e}"),
                    })
            }
        }
    }

    fn encode(self, body: Bytes) -> Bytes {
        match self {
            Self::Binary => body,
            Self::Text => Bytes::from(STANDARD.encode(&body)),
        }
    }
}

/// Serve one unary gRPC-Web call.
pub async fn handle<B>(
    api: ApiService,
    port: ListenerPort,
    variant: GrpcWebVariant,
    request: Request<B>,
) -> Response<GatewayBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let (parts, body) = request.into_parts();
    let peer = parts.extensions.get::<PeerAddr>().map(|p| p.0);

    let message = match read_body(body, MAX_MESSAGE_SIZE)
        .await
        .and_then(|body| variant.decode(body))
        .and_then(decode_single_frame)
    {
        Ok(message) => message,
        Err(err) => return error_response(variant, &err, Uuid::new_v4()),
    };

    let call = GatewayCall::new(parts.uri.path(), Protocol::GrpcWeb, port, parts.headers, message)
        .with_peer(peer);
    let correlation_id = call.correlation_id;

    match api.oneshot(call).await {
        Ok(reply) => {
            let mut body = BytesMut::new();
            body.extend_from_slice(&encode_frame(0, &reply.message));
            body.extend_from_slice(&encode_trailer_frame(&ok_trailers()));

            let mut response = Response::new(full(variant.encode(body.freeze())));
            let headers = response.headers_mut();
            headers.extend(relayable_metadata(&reply.metadata));
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(variant.content_type()));
            response
        }
        Err(err) => error_response(variant, &err, correlation_id),
    }
}

/// A failed call: status in the response headers, no body.
pub fn error_response(
    variant: GrpcWebVariant,
    err: &GatewayError,
    correlation_id: Uuid,
) -> Response<GatewayBody> {
    let status = err.to_status_with_correlation(correlation_id);
    let mut response = Response::new(empty());
    *response.status_mut() = StatusCode::OK;
    let headers: &mut HeaderMap = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(variant.content_type()));
    headers.extend(status_headers(&status));
    response
}
