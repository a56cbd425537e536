//! Observability
//!
//! Structured logging through `tracing` and Prometheus metrics.

pub mod exporter;
pub mod logging;
pub mod metrics;

pub use exporter::serve_metrics;
pub use logging::{init_logging, LogConfig};
pub use metrics::GatewayMetrics;
