//! Listeners and protocol adapters
//!
//! Both ports run the same accept loop with the same TLS identity. Each
//! request is classified by the [`Mux`] and handed to the native gRPC,
//! gRPC-Web or REST adapter, which all call the one API service stack, or
//! to the static UI.

pub mod body;
pub mod framing;
pub mod grpc;
pub mod grpc_web;
pub mod listener;
pub mod mux;
pub mod rest;
pub mod static_ui;
pub mod tls;

pub use body::{BoxError, GatewayBody};
pub use grpc_web::GrpcWebVariant;
pub use listener::serve;
pub use mux::{Mux, Route};
pub use static_ui::StaticUi;
pub use tls::{CertificateSummary, TlsError, TlsIdentity};

/// Largest request message accepted, matching the gRPC default.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;
