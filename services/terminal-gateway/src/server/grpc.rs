//! Native gRPC over HTTP/2.

use bytes::Bytes;
use futures::stream;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};
use http_body::{Body, Frame};
use http_body_util::{BodyExt, StreamBody};
use tower::ServiceExt;
use uuid::Uuid;

use super::body::{empty, read_body, BoxError, GatewayBody};
use super::framing::{decode_single_frame, encode_frame, ok_trailers, status_headers};
use super::MAX_MESSAGE_SIZE;
use crate::auth::ListenerPort;
use crate::call::{relayable_metadata, GatewayCall, PeerAddr, Protocol};
use crate::error::GatewayError;
use crate::middleware::ApiService;

const GRPC_CONTENT_TYPE: &str = "application/grpc";

/// Serve one unary gRPC call.
pub async fn handle<B>(api: ApiService, port: ListenerPort, request: Request<B>) -> Response<GatewayBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let (parts, body) = request.into_parts();
    let peer = parts.extensions.get::<PeerAddr>().map(|p| p.0);

    let message = match read_body(body, MAX_MESSAGE_SIZE)
        .await
        .and_then(decode_single_frame)
    {
        Ok(message) => message,
        Err(err) => return error_response(&err, Uuid::new_v4()),
    };

    let call = GatewayCall::new(parts.uri.path(), Protocol::Grpc, port, parts.headers, message)
        .with_peer(peer);
    let correlation_id = call.correlation_id;

    match api.oneshot(call).await {
        Ok(reply) => {
            let frames = vec![
                Ok::<_, BoxError>(Frame::data(encode_frame(0, &reply.message))),
                Ok(Frame::trailers(ok_trailers())),
            ];
            let mut response = Response::new(StreamBody::new(stream::iter(frames)).boxed_unsync());
            let headers = response.headers_mut();
            headers.extend(relayable_metadata(&reply.metadata));
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(GRPC_CONTENT_TYPE));
            response
        }
        Err(err) => error_response(&err, correlation_id),
    }
}

/// A trailers-only response carrying `err`.
pub fn error_response(err: &GatewayError, correlation_id: Uuid) -> Response<GatewayBody> {
    let status = err.to_status_with_correlation(correlation_id);
    let mut response = Response::new(empty());
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(GRPC_CONTENT_TYPE));
    headers.extend(status_headers(&status));
    response
}
