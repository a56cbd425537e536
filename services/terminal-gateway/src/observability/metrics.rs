//! Gateway metrics
//!
//! Prometheus counters and histograms for the API surface, registered on a
//! registry owned by the gateway.

use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::auth::ListenerPort;
use crate::call::Protocol;
use crate::endpoints::BackendName;
use crate::error::ErrorCode;

const NAMESPACE: &str = "terminal_gateway";

/// Gateway metrics
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    /// Calls handled, by protocol, port and outcome
    pub requests: IntCounterVec,
    /// Rejected calls, by error code
    pub auth_failures: IntCounterVec,
    /// Time spent in backend calls
    pub backend_latency: HistogramVec,
    /// Super macaroons minted
    pub super_macaroons_baked: IntCounterVec,
}

impl GatewayMetrics {
    /// Metrics registered on a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::register(Registry::new())
    }

    /// Metrics registered on `registry`.
    pub fn register(registry: Registry) -> Result<Self, prometheus::Error> {
        let requests = IntCounterVec::new(
            Opts::new("requests_total", "Total API calls handled").namespace(NAMESPACE),
            &["protocol", "port", "outcome"],
        )?;
        registry.register(Box::new(requests.clone()))?;

        let auth_failures = IntCounterVec::new(
            Opts::new("auth_failures_total", "Total calls rejected by authorization")
                .namespace(NAMESPACE),
            &["reason"],
        )?;
        registry.register(Box::new(auth_failures.clone()))?;

        let backend_latency = HistogramVec::new(
            HistogramOpts::new("backend_latency_seconds", "Backend call latency in seconds")
                .namespace(NAMESPACE)
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 10.0]),
            &["backend"],
        )?;
        registry.register(Box::new(backend_latency.clone()))?;

        let super_macaroons_baked = IntCounterVec::new(
            Opts::new("super_macaroons_baked_total", "Total super macaroons baked")
                .namespace(NAMESPACE),
            &["read_only"],
        )?;
        registry.register(Box::new(super_macaroons_baked.clone()))?;

        Ok(Self {
            registry,
            requests,
            auth_failures,
            backend_latency,
            super_macaroons_baked,
        })
    }

    /// Records a finished call. `outcome` is `ok` or an error code.
    pub fn record_request(&self, protocol: Protocol, port: ListenerPort, outcome: &str) {
        self.requests
            .with_label_values(&[protocol.as_str(), port.as_str(), outcome])
            .inc();
    }

    /// Records an authorization rejection
    pub fn record_auth_failure(&self, code: ErrorCode) {
        self.auth_failures.with_label_values(&[code.as_str()]).inc();
    }

    /// Records backend latency
    pub fn observe_backend(&self, backend: BackendName, elapsed: Duration) {
        self.backend_latency
            .with_label_values(&[backend.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    /// Records a baked super macaroon
    pub fn record_bake(&self, read_only: bool) {
        self.super_macaroons_baked
            .with_label_values(&[if read_only { "true" } else { "false" }])
            .inc();
    }

    /// The registry the metrics live on.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Every metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for GatewayMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayMetrics").finish_non_exhaustive()
    }
}
