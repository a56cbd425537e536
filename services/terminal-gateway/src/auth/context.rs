//! Per-request auth context.

use std::net::IpAddr;

use http::header::AUTHORIZATION;
use http::HeaderMap;

use super::password::BasicAuth;
use crate::error::GatewayError;

/// Metadata key carrying the hex-encoded credential.
pub const MACAROON_HEADER: &str = "macaroon";

/// Credentials extracted from one request's metadata.
///
/// Built fresh for every call and dropped with it.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    credentials: Vec<String>,
    basic_auth: Option<BasicAuth>,
    peer: Option<IpAddr>,
}

impl AuthContext {
    /// Extract credential values and Basic auth from `headers`.
    ///
    /// An `authorization` header that is not well-formed Basic auth counts as
    /// no Basic auth at all.
    pub fn from_headers(headers: &HeaderMap, peer: Option<IpAddr>) -> Self {
        let credentials = headers
            .get_all(MACAROON_HEADER)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect();
        let basic_auth = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(BasicAuth::parse);

        Self {
            credentials,
            basic_auth,
            peer,
        }
    }

    /// The single credential value, if exactly one was supplied.
    pub fn credential(&self) -> Result<&str, GatewayError> {
        match self.credentials.as_slice() {
            [single] => Ok(single.as_str()),
            other => Err(GatewayError::MissingCredential { count: other.len() }),
        }
    }

    /// Number of credential values supplied.
    pub fn credential_count(&self) -> usize {
        self.credentials.len()
    }

    /// Basic auth pair, if present and well-formed.
    pub fn basic_auth(&self) -> Option<&BasicAuth> {
        self.basic_auth.as_ref()
    }

    /// Caller's address.
    pub fn peer(&self) -> Option<IpAddr> {
        self.peer
    }
}
