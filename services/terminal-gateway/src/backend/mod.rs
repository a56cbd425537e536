//! Backend dispatch
//!
//! Each daemon behind the gateway is a [`Backend`]. The [`BackendRouter`]
//! resolves the owning backend of an authorized call from the endpoint
//! registry and hands the call over. It is the innermost tower service of
//! the API stack.

mod authority;
mod codec;
mod grpc;

pub use self::codec::{RawCodec, RawDecoder, RawEncoder};
pub use self::authority::{
    classify_check_failure, credential_rejection, LndSigningAuthority, SigningAuthority,
};
#[cfg(test)]
pub use self::authority::MockSigningAuthority;
pub use self::grpc::{GrpcBackend, GrpcBackendConfig};

use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tonic::{Code, Status};
use tower::Service;

use crate::auth::Grant;
use crate::call::{GatewayCall, GatewayReply};
use crate::endpoints::{BackendName, EndpointRegistry};
use crate::error::GatewayError;
use crate::observability::GatewayMetrics;

/// A daemon (or in-process service) that executes calls.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which backend this is.
    fn name(&self) -> BackendName;

    /// Execute an authorized call.
    async fn call(&self, call: &GatewayCall) -> Result<GatewayReply, GatewayError>;
}

/// Convert a status returned by `backend` into a gateway error.
pub(crate) fn upstream_error(backend: BackendName, status: Status) -> GatewayError {
    match status.code() {
        Code::Unavailable => GatewayError::UpstreamUnavailable {
            backend: backend.to_string(),
            reason: status.message().to_string(),
        },
        _ => GatewayError::Upstream(status),
    }
}

struct RouterInner {
    endpoints: Arc<EndpointRegistry>,
    backends: HashMap<BackendName, Arc<dyn Backend>>,
    metrics: Option<GatewayMetrics>,
}

/// Routes calls to the backend owning their method.
#[derive(Clone)]
pub struct BackendRouter {
    inner: Arc<RouterInner>,
}

impl BackendRouter {
    /// Router over `backends`. A later backend with the same name replaces
    /// an earlier one.
    pub fn new(
        endpoints: Arc<EndpointRegistry>,
        backends: impl IntoIterator<Item = Arc<dyn Backend>>,
        metrics: Option<GatewayMetrics>,
    ) -> Self {
        let backends = backends
            .into_iter()
            .map(|backend| (backend.name(), backend))
            .collect();
        Self {
            inner: Arc::new(RouterInner {
                endpoints,
                backends,
                metrics,
            }),
        }
    }

    /// Whether `backend` has been registered.
    pub fn has_backend(&self, backend: BackendName) -> bool {
        self.inner.backends.contains_key(&backend)
    }

    /// Dispatch `call` to its backend.
    pub async fn route(&self, call: GatewayCall) -> Result<GatewayReply, GatewayError> {
        let descriptor = self
            .inner
            .endpoints
            .lookup(&call.full_method)
            .ok_or_else(|| GatewayError::UnknownMethod {
                method: call.full_method.clone(),
            })?;

        let backend = self
            .inner
            .backends
            .get(&descriptor.backend)
            .ok_or_else(|| GatewayError::UpstreamUnavailable {
                backend: descriptor.backend.to_string(),
                reason: "backend not configured".to_string(),
            })?;

        let started = Instant::now();
        let result = backend.call(&call).await;
        if let Some(metrics) = &self.inner.metrics {
            metrics.observe_backend(descriptor.backend, started.elapsed());
        }
        result.map_err(|err| match (&call.grant, err) {
            (Some(Grant::Credential(credential)), GatewayError::Upstream(status))
                if credential.delegated =>
            {
                credential_rejection(&status).unwrap_or(GatewayError::Upstream(status))
            }
            (_, err) => err,
        })
    }
}

impl Service<GatewayCall> for BackendRouter {
    type Response = GatewayReply;
    type Error = GatewayError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: GatewayCall) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { router.route(call).await })
    }
}
