//! REST/JSON transcoding in the grpc-gateway style.

use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use http_body::Body;
use serde::Serialize;
use tonic::Code;
use tower::ServiceExt;
use uuid::Uuid;

use super::body::{full, read_body, BoxError, GatewayBody};
use super::MAX_MESSAGE_SIZE;
use crate::auth::ListenerPort;
use crate::call::{
    relayable_metadata, unprefix_rest_metadata, GatewayCall, PeerAddr, Protocol,
    REST_METADATA_PREFIX,
};
use crate::endpoints::EndpointRegistry;
use crate::error::{GatewayError, CORRELATION_ID_HEADER};
use crate::middleware::ApiService;

/// JSON error body.
#[derive(Debug, Serialize)]
struct RestError<'a> {
    code: i32,
    message: &'a str,
    details: Vec<serde_json::Value>,
}

/// HTTP status grpc-gateway uses for a gRPC code.
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => {
            StatusCode::BAD_REQUEST
        }
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::Unknown | Code::Internal | Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Serve a REST request already matched to a route.
pub async fn handle<B>(
    api: ApiService,
    endpoints: Arc<EndpointRegistry>,
    port: ListenerPort,
    request: Request<B>,
) -> Response<GatewayBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let (mut parts, body) = request.into_parts();
    let peer = parts.extensions.get::<PeerAddr>().map(|p| p.0);

    let Some((full_method, transcoder)) = endpoints
        .rest_route(&parts.method, parts.uri.path())
        .and_then(|d| d.rest.as_ref().map(|rest| (d.full_method, rest.transcoder)))
    else {
        let err = GatewayError::UnknownMethod {
            method: format!("{} {}", parts.method, parts.uri.path()),
        };
        return error_response(&err, Uuid::new_v4());
    };

    let message = match read_body(body, MAX_MESSAGE_SIZE)
        .await
        .and_then(|body| transcoder.request_to_proto(&body))
    {
        Ok(message) => Bytes::from(message),
        Err(err) => return error_response(&err, Uuid::new_v4()),
    };

    unprefix_rest_metadata(&mut parts.headers);
    let call = GatewayCall::new(full_method, Protocol::Rest, port, parts.headers, message)
        .with_peer(peer);
    let correlation_id = call.correlation_id;

    let reply = match api.oneshot(call).await {
        Ok(reply) => reply,
        Err(err) => return error_response(&err, correlation_id),
    };

    match transcoder.response_to_json(&reply.message) {
        Ok(json) => {
            let mut response = json_response(StatusCode::OK, json);
            let headers = response.headers_mut();
            for (name, value) in &relayable_metadata(&reply.metadata) {
                let prefixed = format!("{REST_METADATA_PREFIX}{}", name.as_str());
                if let Ok(name) = HeaderName::from_bytes(prefixed.as_bytes()) {
                    headers.append(name, value.clone());
                }
            }
            response
        }
        Err(err) => error_response(&err, correlation_id),
    }
}

/// A JSON error response for `err`.
///
/// Authentication failures are answered in-band with HTTP 200.
pub fn error_response(err: &GatewayError, correlation_id: Uuid) -> Response<GatewayBody> {
    let status = err.to_status();
    let http_status = if err.code().is_auth_failure() {
        StatusCode::OK
    } else {
        http_status(status.code())
    };

    let body = RestError {
        code: status.code() as i32,
        message: status.message(),
        details: Vec::new(),
    };
    let json = serde_json::to_vec(&body).unwrap_or_default();

    let mut response = json_response(http_status, json);
    if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}

fn json_response(status: StatusCode, json: Vec<u8>) -> Response<GatewayBody> {
    let mut response = Response::new(full(json));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        "grpc-metadata-content-type",
        HeaderValue::from_static("application/grpc"),
    );
    response
}
