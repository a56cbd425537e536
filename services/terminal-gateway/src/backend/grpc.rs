//! Forwarding to a daemon over gRPC.

use std::time::Duration;

use async_trait::async_trait;
use http::uri::PathAndQuery;
use http::HeaderValue;
use tonic::metadata::MetadataMap;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tracing::debug;

use super::codec::RawCodec;
use super::{upstream_error, Backend};
use crate::auth::{Grant, MACAROON_HEADER};
use crate::call::{forwardable_metadata, GatewayCall, GatewayReply};
use crate::endpoints::BackendName;
use crate::error::GatewayError;

/// Connection settings for one daemon.
#[derive(Debug, Clone)]
pub struct GrpcBackendConfig {
    /// Backend served at this address
    pub name: BackendName,
    /// `https://host:port` (or `http://` for plaintext test daemons)
    pub url: String,
    /// PEM certificate the daemon presents, trusted as a root
    pub tls_ca_pem: Option<Vec<u8>>,
    /// Server name to verify instead of the URL host
    pub tls_domain: Option<String>,
    /// Raw macaroon the gateway uses when it speaks for the caller
    pub service_macaroon: Option<Vec<u8>>,
    /// Deadline for establishing the connection
    pub connect_timeout: Duration,
}

impl GrpcBackendConfig {
    /// Settings for `name` at `url`.
    pub fn new(name: BackendName, url: impl Into<String>) -> Self {
        Self {
            name,
            url: url.into(),
            tls_ca_pem: None,
            tls_domain: None,
            service_macaroon: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Trust `pem` when connecting.
    #[must_use]
    pub fn with_tls_ca(mut self, pem: Vec<u8>) -> Self {
        self.tls_ca_pem = Some(pem);
        self
    }

    /// Verify the daemon's certificate against `domain`.
    #[must_use]
    pub fn with_tls_domain(mut self, domain: impl Into<String>) -> Self {
        self.tls_domain = Some(domain.into());
        self
    }

    /// Macaroon used for password-authorized and super macaroon calls.
    #[must_use]
    pub fn with_service_macaroon(mut self, macaroon: Vec<u8>) -> Self {
        self.service_macaroon = Some(macaroon);
        self
    }

    /// Connection deadline.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// A daemon reached over a lazily connected tonic channel.
#[derive(Clone)]
pub struct GrpcBackend {
    name: BackendName,
    channel: Channel,
    service_credential: Option<String>,
}

impl GrpcBackend {
    /// Build the channel without connecting; the first call connects.
    pub fn connect_lazy(config: GrpcBackendConfig) -> Result<Self, GatewayError> {
        let name = config.name;
        let invalid = |reason: String| GatewayError::UpstreamUnavailable {
            backend: name.to_string(),
            reason,
        };

        let mut endpoint = Endpoint::from_shared(config.url.clone())
            .map_err(|e| invalid(format!("invalid endpoint {}: {e}", config.url)))?
            .connect_timeout(config.connect_timeout);

        if let Some(pem) = &config.tls_ca_pem {
            let mut tls = ClientTlsConfig::new().ca_certificate(Certificate::from_pem(pem));
            if let Some(domain) = &config.tls_domain {
                tls = tls.domain_name(domain.clone());
            }
            endpoint = endpoint
                .tls_config(tls)
                .map_err(|e| invalid(format!("invalid TLS settings: {e}")))?;
        }

        Ok(Self {
            name,
            channel: endpoint.connect_lazy(),
            service_credential: config.service_macaroon.map(hex::encode),
        })
    }

    /// The underlying channel.
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    /// Credential to present upstream for a call with `grant`.
    ///
    /// Native credentials travel unchanged. Password grants and super
    /// macaroons are replaced with the gateway's service credential for
    /// this daemon, which cannot verify either on its own.
    fn outbound_credential<'a>(&'a self, grant: Option<&'a Grant>) -> Result<&'a str, GatewayError> {
        match grant {
            Some(Grant::Credential(credential)) if !credential.super_credential => {
                Ok(credential.encoded.as_str())
            }
            Some(_) => self.service_credential.as_deref().ok_or_else(|| {
                GatewayError::UpstreamUnavailable {
                    backend: self.name.to_string(),
                    reason: "no service credential configured".to_string(),
                }
            }),
            None => Err(GatewayError::Unauthenticated {
                reason: "call was not authorized".to_string(),
            }),
        }
    }
}

#[async_trait]
impl Backend for GrpcBackend {
    fn name(&self) -> BackendName {
        self.name
    }

    async fn call(&self, call: &GatewayCall) -> Result<GatewayReply, GatewayError> {
        let credential = self.outbound_credential(call.grant.as_ref())?;

        let mut headers = forwardable_metadata(&call.headers);
        headers.insert(
            MACAROON_HEADER,
            HeaderValue::from_str(credential)
                .map_err(|e| GatewayError::Internal(anyhow::anyhow!("credential header: {e}")))?,
        );

        let path = PathAndQuery::try_from(call.full_method.as_str()).map_err(|e| {
            GatewayError::InvalidRequest {
                reason: format!("invalid method path: {e}"),
            }
        })?;

        let mut request = tonic::Request::new(call.message.clone());
        *request.metadata_mut() = MetadataMap::from_headers(headers);
        if let Some(deadline) = call.deadline() {
            request.set_timeout(deadline);
        }

        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable {
                backend: self.name.to_string(),
                reason: e.to_string(),
            })?;

        debug!(backend = %self.name, method = %call.full_method, "Forwarding call");
        let response = grpc
            .unary(request, path, RawCodec)
            .await
            .map_err(|status| upstream_error(self.name, status))?;

        let (metadata, message, _) = response.into_parts();
        Ok(GatewayReply {
            message,
            metadata: metadata.into_headers(),
        })
    }
}
