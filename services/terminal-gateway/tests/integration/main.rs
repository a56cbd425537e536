//! End-to-end tests of the gateway against in-process fake daemons.

mod auth_matrix;
mod common;
mod grpc_web;
mod rest;
mod sessions;
mod static_ui;
mod super_macaroon;
mod tls_identity;
