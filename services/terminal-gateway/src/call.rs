//! Protocol-neutral call shape
//!
//! Every adapter (native gRPC, gRPC-Web, REST) turns its request into a
//! [`GatewayCall`] carrying one serialized protobuf message, and turns the
//! resulting [`GatewayReply`] back into its own wire format.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName};
use uuid::Uuid;

use crate::auth::{AuthContext, Grant, ListenerPort};

/// Wire protocol a call arrived over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// HTTP/2 gRPC
    Grpc,
    /// gRPC-Web, binary or text
    GrpcWeb,
    /// REST with JSON bodies
    Rest,
}

impl Protocol {
    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grpc => "grpc",
            Self::GrpcWeb => "grpc-web",
            Self::Rest => "rest",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of the connected peer, stored in request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

/// One unary call on its way to a backend.
#[derive(Debug, Clone)]
pub struct GatewayCall {
    /// Correlation ID for logs and error metadata
    pub correlation_id: Uuid,
    /// `/package.Service/Method`
    pub full_method: String,
    /// Protocol the call arrived over
    pub protocol: Protocol,
    /// Listener the call arrived on
    pub port: ListenerPort,
    /// Request metadata, normalized to gRPC metadata names
    pub headers: HeaderMap,
    /// Connected peer
    pub peer: Option<SocketAddr>,
    /// Serialized request message
    pub message: Bytes,
    /// Set once the call has been authorized
    pub grant: Option<Grant>,
}

impl GatewayCall {
    /// New, not yet authorized call.
    pub fn new(
        full_method: impl Into<String>,
        protocol: Protocol,
        port: ListenerPort,
        headers: HeaderMap,
        message: Bytes,
    ) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            full_method: full_method.into(),
            protocol,
            port,
            headers,
            peer: None,
            message,
            grant: None,
        }
    }

    /// Attach the connected peer.
    #[must_use]
    pub fn with_peer(mut self, peer: Option<SocketAddr>) -> Self {
        self.peer = peer;
        self
    }

    /// Auth context extracted from this call's metadata.
    pub fn auth_context(&self) -> AuthContext {
        AuthContext::from_headers(&self.headers, self.peer.map(|addr| addr.ip()))
    }

    /// Deadline the caller sent in `grpc-timeout`, if any and well formed.
    pub fn deadline(&self) -> Option<Duration> {
        self.headers
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_grpc_timeout)
    }
}

/// Metadata key carrying a caller's deadline.
pub const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Parse a `grpc-timeout` value: at most eight digits and a unit.
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;
    Some(match unit {
        "H" => Duration::from_secs(amount * 3600),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    })
}

/// Reply from a backend.
#[derive(Debug, Clone, Default)]
pub struct GatewayReply {
    /// Serialized response message
    pub message: Bytes,
    /// Response metadata relayed to the caller
    pub metadata: HeaderMap,
}

impl GatewayReply {
    /// Reply with a message and no metadata.
    pub fn new(message: impl Into<Bytes>) -> Self {
        Self {
            message: message.into(),
            metadata: HeaderMap::new(),
        }
    }
}

/// Headers that never travel to a backend as metadata: transport headers,
/// the gRPC framing headers the client channel sets itself, and the
/// credentials the gateway consumes or replaces.
const STRIPPED: &[&str] = &[
    "authorization",
    "macaroon",
    "content-type",
    "content-length",
    "connection",
    "host",
    "te",
    "transfer-encoding",
    "user-agent",
    "accept",
    "accept-encoding",
    "x-grpc-web",
    "x-user-agent",
];

/// Prefix grpc-gateway uses for metadata carried in REST headers.
pub const REST_METADATA_PREFIX: &str = "grpc-metadata-";

/// Request metadata safe to forward to a backend.
pub fn forwardable_metadata(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in headers {
        let name_str = name.as_str();
        if STRIPPED.contains(&name_str) || name_str.starts_with("grpc-") {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

/// Rename `grpc-metadata-<key>` REST headers to plain `<key>` metadata.
///
/// Existing plain headers win over the prefixed form.
pub fn unprefix_rest_metadata(headers: &mut HeaderMap) {
    let prefixed: Vec<(HeaderName, http::HeaderValue)> = headers
        .iter()
        .filter_map(|(name, value)| {
            let key = name.as_str().strip_prefix(REST_METADATA_PREFIX)?;
            let key = HeaderName::from_bytes(key.as_bytes()).ok()?;
            Some((key, value.clone()))
        })
        .collect();

    for (key, value) in prefixed {
        if !headers.contains_key(&key) {
            headers.append(key, value);
        }
    }
}

/// Response metadata safe to relay to a caller.
pub fn relayable_metadata(metadata: &HeaderMap) -> HeaderMap {
    let mut relayed = HeaderMap::new();
    for (name, value) in metadata {
        let name_str = name.as_str();
        if name_str == "content-type" || name_str == "content-length" || name_str.starts_with("grpc-")
        {
            continue;
        }
        relayed.append(name.clone(), value.clone());
    }
    relayed
}
