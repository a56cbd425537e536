//! Authorization Tower Layer
//!
//! Runs the [`Authorizer`] on every call and records the grant on it before
//! the call reaches a backend. Rejections are final.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::warn;

use crate::auth::Authorizer;
use crate::call::GatewayCall;
use crate::error::GatewayError;
use crate::observability::GatewayMetrics;

/// Authorization layer for Tower
#[derive(Clone)]
pub struct AuthLayer {
    authorizer: Arc<Authorizer>,
    metrics: Option<GatewayMetrics>,
}

impl AuthLayer {
    /// Layer running `authorizer`.
    pub fn new(authorizer: Arc<Authorizer>, metrics: Option<GatewayMetrics>) -> Self {
        Self {
            authorizer,
            metrics,
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            authorizer: self.authorizer.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Authorization service wrapper
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    authorizer: Arc<Authorizer>,
    metrics: Option<GatewayMetrics>,
}

impl<S> Service<GatewayCall> for AuthService<S>
where
    S: Service<GatewayCall> + Clone + Send + 'static,
    S::Error: Into<GatewayError> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = GatewayError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut call: GatewayCall) -> Self::Future {
        let authorizer = self.authorizer.clone();
        let metrics = self.metrics.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let context = call.auth_context();
            let decision = authorizer
                .authorize(&call.full_method, call.port, &context)
                .await;
            match decision {
                Ok(grant) => {
                    call.grant = Some(grant);
                    inner.call(call).await.map_err(Into::into)
                }
                Err(err) => {
                    warn!(
                        correlation_id = %call.correlation_id,
                        method = %call.full_method,
                        port = %call.port,
                        error_code = err.code().as_str(),
                        "Call rejected"
                    );
                    if let Some(metrics) = &metrics {
                        metrics.record_auth_failure(err.code());
                    }
                    Err(err)
                }
            }
        })
    }
}
