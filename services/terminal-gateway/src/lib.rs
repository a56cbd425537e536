//! Terminal Gateway - one TLS front door for a node daemon and its companions.
//!
//! This crate provides macaroon and UI-password authorization in front of
//! lnd, faraday, loop and pool, a multiplexer serving gRPC, gRPC-Web, REST
//! and the bundled UI from one port, and a baker for super macaroons that
//! carry the union of every backend's permissions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod auth;
pub mod backend;
pub mod bakery;
pub mod call;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod macaroon;
pub mod middleware;
pub mod observability;
pub mod permission;
pub mod proto;
pub mod rootkey;
pub mod server;
pub mod session;
pub mod shutdown;

pub use app::{Gateway, GatewayBuilder};
pub use config::{Config, ConfigError};
pub use error::{ErrorCode, GatewayError};
