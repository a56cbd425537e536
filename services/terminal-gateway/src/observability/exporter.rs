//! Plain-HTTP metrics endpoint.

use std::convert::Infallible;
use std::net::SocketAddr;

use bytes::Bytes;
use http::{header, Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use super::GatewayMetrics;
use crate::server::listener::AcceptBackoff;
use crate::shutdown::ShutdownSignal;

/// Serve `GET /metrics` on `addr` until shutdown.
pub async fn serve_metrics(
    addr: SocketAddr,
    metrics: GatewayMetrics,
    shutdown: ShutdownSignal,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Metrics endpoint listening");

    let accept = async {
        let mut backoff = AcceptBackoff::new();
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => {
                    backoff.reset();
                    accepted
                }
                Err(e) => {
                    let pause = backoff.failed();
                    warn!(error = %e, retry_in = ?pause, "Metrics accept failed");
                    tokio::time::sleep(pause).await;
                    continue;
                }
            };
            let metrics = metrics.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let metrics = metrics.clone();
                    async move { Ok::<_, Infallible>(respond(&metrics, &req)) }
                });
                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!(peer = %peer, error = %e, "Metrics connection closed");
                }
            });
        }
    };

    tokio::select! {
        () = accept => Ok(()),
        () = shutdown.recv() => Ok(()),
    }
}

fn respond(metrics: &GatewayMetrics, req: &Request<Incoming>) -> Response<Full<Bytes>> {
    render(metrics, req.method(), req.uri().path())
}

fn render(metrics: &GatewayMetrics, method: &Method, path: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    if method != Method::GET || path != "/metrics" {
        *response.status_mut() = StatusCode::NOT_FOUND;
        return response;
    }
    match metrics.encode() {
        Ok(text) => {
            *response.body_mut() = Full::new(Bytes::from(text));
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("text/plain; version=0.0.4"),
            );
        }
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        }
    }
    response
}
