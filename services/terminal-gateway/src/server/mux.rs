//! Per-request protocol dispatch.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use http_body::Body;
use tracing::debug;

use super::body::{empty, BoxError, GatewayBody};
use super::grpc_web::{GrpcWebVariant, GRPC_WEB_HEADER};
use super::static_ui::StaticUi;
use super::{grpc, grpc_web, rest};
use crate::auth::ListenerPort;
use crate::endpoints::EndpointRegistry;
use crate::middleware::ApiService;

/// How a request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Native gRPC
    Grpc,
    /// gRPC-Web
    GrpcWeb(GrpcWebVariant),
    /// A registered REST route
    Rest,
    /// A REST path used with a verb it does not support
    MethodNotAllowed,
    /// UI assets
    Static,
    /// Nothing serves this request
    NotFound,
    /// The core port speaks native gRPC only
    UnsupportedMediaType,
}

struct Shared {
    endpoints: Arc<EndpointRegistry>,
    ui: StaticUi,
    port: ListenerPort,
}

/// Front door of one listener.
#[derive(Clone)]
pub struct Mux {
    api: ApiService,
    shared: Arc<Shared>,
}

impl Mux {
    /// Dispatcher for `port`.
    pub fn new(
        api: ApiService,
        endpoints: Arc<EndpointRegistry>,
        ui: StaticUi,
        port: ListenerPort,
    ) -> Self {
        Self {
            api,
            shared: Arc::new(Shared {
                endpoints,
                ui,
                port,
            }),
        }
    }

    /// Listener this dispatcher serves.
    pub fn port(&self) -> ListenerPort {
        self.shared.port
    }

    /// Classify a request by its method, path and headers.
    pub fn route(&self, method: &Method, path: &str, headers: &HeaderMap) -> Route {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if let Some(variant) = GrpcWebVariant::from_content_type(content_type) {
            return match self.shared.port {
                ListenerPort::Gateway => Route::GrpcWeb(variant),
                ListenerPort::Core => Route::UnsupportedMediaType,
            };
        }
        if content_type.starts_with("application/grpc") {
            if headers.contains_key(GRPC_WEB_HEADER) && self.shared.port == ListenerPort::Gateway {
                return Route::GrpcWeb(GrpcWebVariant::Binary);
            }
            return Route::Grpc;
        }
        if self.shared.port == ListenerPort::Core {
            return Route::UnsupportedMediaType;
        }

        let endpoints = &self.shared.endpoints;
        if endpoints.rest_route(method, path).is_some() {
            Route::Rest
        } else if endpoints.is_rest_path(path) {
            Route::MethodNotAllowed
        } else if method == Method::GET || method == Method::HEAD {
            Route::Static
        } else {
            Route::NotFound
        }
    }

    /// Serve one request.
    pub async fn handle<B>(self, request: Request<B>) -> Result<Response<GatewayBody>, Infallible>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let route = self.route(request.method(), request.uri().path(), request.headers());
        debug!(
            port = %self.shared.port,
            method = %request.method(),
            path = request.uri().path(),
            route = ?route,
            "Dispatching request"
        );

        let port = self.shared.port;
        let response = match route {
            Route::Grpc => grpc::handle(self.api, port, request).await,
            Route::GrpcWeb(variant) => grpc_web::handle(self.api, port, variant, request).await,
            Route::Rest => {
                let endpoints = self.shared.endpoints.clone();
                rest::handle(self.api, endpoints, port, request).await
            }
            Route::Static => {
                let ui = self.shared.ui.clone();
                ui.serve(request).await
            }
            Route::MethodNotAllowed => {
                let mut response = status_only(StatusCode::METHOD_NOT_ALLOWED);
                let allowed = [Method::GET, Method::POST]
                    .into_iter()
                    .filter(|verb| {
                        self.shared
                            .endpoints
                            .rest_route(verb, request.uri().path())
                            .is_some()
                    })
                    .map(|verb| verb.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                if let Ok(value) = HeaderValue::from_str(&allowed) {
                    response.headers_mut().insert(ALLOW, value);
                }
                response
            }
            Route::NotFound => status_only(StatusCode::NOT_FOUND),
            Route::UnsupportedMediaType => status_only(StatusCode::UNSUPPORTED_MEDIA_TYPE),
        };
        Ok(response)
    }
}

fn status_only(status: StatusCode) -> Response<GatewayBody> {
    let mut response = Response::new(empty());
    *response.status_mut() = status;
    response
}
