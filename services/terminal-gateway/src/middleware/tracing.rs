//! Tracing Tower Layer
//!
//! Wraps every API call in a span carrying its correlation ID, method,
//! protocol and port, and records the outcome in logs and metrics.

use std::task::{Context, Poll};
use std::time::Instant;

use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::call::GatewayCall;
use crate::error::GatewayError;
use crate::observability::GatewayMetrics;

/// Tracing layer for Tower
#[derive(Clone)]
pub struct TracingLayer {
    service_name: &'static str,
    metrics: Option<GatewayMetrics>,
}

impl TracingLayer {
    /// Creates a new tracing layer
    pub fn new(service_name: &'static str, metrics: Option<GatewayMetrics>) -> Self {
        Self {
            service_name,
            metrics,
        }
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService {
            inner,
            service_name: self.service_name,
            metrics: self.metrics.clone(),
        }
    }
}

/// Tracing service wrapper
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
    service_name: &'static str,
    metrics: Option<GatewayMetrics>,
}

impl<S> Service<GatewayCall> for TracingService<S>
where
    S: Service<GatewayCall> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Into<GatewayError> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = GatewayError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, call: GatewayCall) -> Self::Future {
        let metrics = self.metrics.clone();
        let (protocol, port) = (call.protocol, call.port);
        let span = info_span!(
            "call",
            service = self.service_name,
            correlation_id = %call.correlation_id,
            method = %call.full_method,
            protocol = %protocol,
            port = %port,
        );
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(
            async move {
                let started = Instant::now();
                let result = inner.call(call).await.map_err(Into::into);
                let elapsed_ms = started.elapsed().as_millis() as u64;

                let outcome = match &result {
                    Ok(_) => {
                        tracing::info!(elapsed_ms, "Call completed");
                        "ok"
                    }
                    Err(err) => {
                        let code = err.code();
                        if code.is_auth_failure() {
                            tracing::info!(elapsed_ms, error_code = code.as_str(), error = %err, "Call rejected");
                        } else {
                            tracing::error!(elapsed_ms, error_code = code.as_str(), error = %err, "Call failed");
                        }
                        code.as_str()
                    }
                };
                if let Some(metrics) = &metrics {
                    metrics.record_request(protocol, port, outcome);
                }
                result
            }
            .instrument(span),
        )
    }
}
