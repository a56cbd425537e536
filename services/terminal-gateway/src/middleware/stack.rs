//! Service Stack Builder
//!
//! Composes the API middleware around the backend router.

use std::sync::Arc;
use std::time::Duration;

use tower::util::BoxCloneService;
use tower::ServiceBuilder;

use crate::auth::Authorizer;
use crate::backend::BackendRouter;
use crate::call::{GatewayCall, GatewayReply};
use crate::error::GatewayError;
use crate::middleware::auth::AuthLayer;
use crate::middleware::timeout::TimeoutLayer;
use crate::middleware::tracing::TracingLayer;
use crate::observability::GatewayMetrics;

/// The type-erased API service every protocol adapter calls into.
pub type ApiService = BoxCloneService<GatewayCall, GatewayReply, GatewayError>;

/// Builds the API service stack
///
/// Layer order (outermost to innermost):
/// 1. Tracing - span, outcome logging and request metrics
/// 2. Auth - authorization; rejected calls stop here
/// 3. Timeout - bounds the backend call
/// 4. Router - dispatch to the owning backend
pub fn build_api_stack(
    authorizer: Arc<Authorizer>,
    router: BackendRouter,
    backend_timeout: Duration,
    metrics: Option<GatewayMetrics>,
) -> ApiService {
    let service = ServiceBuilder::new()
        .layer(TracingLayer::new("terminal-gateway", metrics.clone()))
        .layer(AuthLayer::new(authorizer, metrics))
        .layer(TimeoutLayer::new(backend_timeout, "backend call"))
        .service(router);
    BoxCloneService::new(service)
}
