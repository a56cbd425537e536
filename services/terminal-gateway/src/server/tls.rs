//! The TLS identity served on both listeners
//!
//! The certificate and key are produced by the core daemon and loaded
//! verbatim. One [`TlsIdentity`] builds the acceptor for both ports, so a
//! handshake against either yields the same leaf certificate bytes.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;
use x509_parser::prelude::*;

/// ALPN protocols offered, HTTP/2 first for gRPC.
pub const ALPN_PROTOCOLS: &[&[u8]] = &[b"h2", b"http/1.1"];

/// TLS setup errors.
#[derive(Error, Debug)]
pub enum TlsError {
    /// Certificate or key file unreadable
    #[error("unable to read {path}: {source}")]
    Read {
        /// File that failed
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// No certificate in the PEM input
    #[error("no certificate found in PEM data")]
    NoCertificate,

    /// No private key in the PEM input
    #[error("no private key found in PEM data")]
    NoPrivateKey,

    /// PEM or DER content is malformed
    #[error("invalid certificate: {0}")]
    Invalid(String),

    /// rustls refused the certificate and key
    #[error("TLS configuration rejected: {0}")]
    Config(#[from] rustls::Error),
}

/// Facts about the leaf certificate, for startup logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    /// Subject distinguished name
    pub subject: String,
    /// DNS subject alternative names
    pub dns_names: Vec<String>,
    /// Start of validity
    pub not_before: DateTime<Utc>,
    /// End of validity
    pub not_after: DateTime<Utc>,
}

impl CertificateSummary {
    /// Whether `now` lies within the validity period.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }
}

/// Certificate chain and key shared by every listener.
pub struct TlsIdentity {
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl TlsIdentity {
    /// Load PEM files written by the core daemon.
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self, TlsError> {
        let read = |path: &Path| {
            std::fs::read(path).map_err(|source| TlsError::Read {
                path: path.display().to_string(),
                source,
            })
        };
        Self::from_pem(&read(cert_path)?, &read(key_path)?)
    }

    /// Parse a PEM certificate chain and private key.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, TlsError> {
        let certs = rustls_pemfile::certs(&mut Cursor::new(cert_pem))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TlsError::Invalid(format!("failed to parse PEM: {e}")))?;
        if certs.is_empty() {
            return Err(TlsError::NoCertificate);
        }
        let key = rustls_pemfile::private_key(&mut Cursor::new(key_pem))
            .map_err(|e| TlsError::Invalid(format!("failed to parse key: {e}")))?
            .ok_or(TlsError::NoPrivateKey)?;
        Ok(Self { certs, key })
    }

    /// DER bytes of the leaf certificate.
    pub fn leaf_der(&self) -> &[u8] {
        self.certs[0].as_ref()
    }

    /// Parsed facts about the leaf certificate.
    pub fn summary(&self) -> Result<CertificateSummary, TlsError> {
        let (_, cert) = X509Certificate::from_der(self.leaf_der())
            .map_err(|e| TlsError::Invalid(format!("failed to parse certificate: {e}")))?;

        let mut dns_names = Vec::new();
        for ext in cert.extensions() {
            if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
                for name in &san.general_names {
                    if let GeneralName::DNSName(dns) = name {
                        dns_names.push((*dns).to_string());
                    }
                }
            }
        }

        let timestamp = |t: i64| {
            DateTime::from_timestamp(t, 0)
                .ok_or_else(|| TlsError::Invalid(format!("validity timestamp {t} out of range")))
        };
        Ok(CertificateSummary {
            subject: cert.subject().to_string(),
            dns_names,
            not_before: timestamp(cert.validity().not_before.timestamp())?,
            not_after: timestamp(cert.validity().not_after.timestamp())?,
        })
    }

    /// rustls server configuration offering [`ALPN_PROTOCOLS`].
    pub fn server_config(&self) -> Result<Arc<ServerConfig>, TlsError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(self.certs.clone(), self.key.clone_key())?;
        config.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();
        Ok(Arc::new(config))
    }

    /// Acceptor for one listener.
    pub fn acceptor(&self) -> Result<TlsAcceptor, TlsError> {
        Ok(TlsAcceptor::from(self.server_config()?))
    }
}
