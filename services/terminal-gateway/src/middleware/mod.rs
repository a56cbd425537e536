//! Tower Middleware Stack
//!
//! Composable layers between the protocol adapters and the backends.

pub mod auth;
pub mod stack;
pub mod timeout;
pub mod tracing;

pub use auth::AuthLayer;
pub use stack::{build_api_stack, ApiService};
pub use timeout::TimeoutLayer;
pub use tracing::TracingLayer;
