//! Timeout Tower Layer
//!
//! Bounds every backend call by the configured timeout, or by the caller's
//! own deadline when that is shorter. Expiry fails the call; nothing is
//! retried.

use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::timeout;
use tower::{Layer, Service};

use crate::call::GatewayCall;
use crate::error::GatewayError;

/// A request that may carry its caller's deadline.
pub trait RequestDeadline {
    /// Time the caller is willing to wait, if it said.
    fn requested_timeout(&self) -> Option<Duration> {
        None
    }
}

impl RequestDeadline for GatewayCall {
    fn requested_timeout(&self) -> Option<Duration> {
        self.deadline()
    }
}

/// Timeout layer for Tower
#[derive(Debug, Clone)]
pub struct TimeoutLayer {
    duration: Duration,
    operation: &'static str,
}

impl TimeoutLayer {
    /// Creates a new timeout layer; `operation` names what timed out.
    pub fn new(duration: Duration, operation: &'static str) -> Self {
        Self {
            duration,
            operation,
        }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            duration: self.duration,
            operation: self.operation,
        }
    }
}

/// Timeout service wrapper
#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
    duration: Duration,
    operation: &'static str,
}

impl<S, Req> Service<Req> for TimeoutService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Into<GatewayError> + Send + 'static,
    S::Future: Send + 'static,
    Req: RequestDeadline + Send + 'static,
{
    type Response = S::Response;
    type Error = GatewayError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let duration = req
            .requested_timeout()
            .map_or(self.duration, |requested| requested.min(self.duration));
        let operation = self.operation;
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match timeout(duration, inner.call(req)).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(GatewayError::Timeout {
                    operation: operation.to_string(),
                    duration,
                }),
            }
        })
    }
}
