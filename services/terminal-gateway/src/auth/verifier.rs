//! Credential verifiers
//!
//! One verifier per backend, registered in the authorizer at startup. A
//! verifier receives an already-decoded macaroon; decoding failures never
//! reach it.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::backend::SigningAuthority;
use crate::endpoints::BackendName;
use crate::error::GatewayError;
use crate::macaroon::{CaveatChecker, Macaroon};
use crate::permission::{missing_permission, Permission, PermissionSet};
use crate::rootkey::{RootKeyId, RootKeyStore};

/// What a verifier is asked to prove.
#[derive(Debug, Clone, Copy)]
pub struct VerifyRequest<'a> {
    /// Raw credential bytes exactly as supplied
    pub raw: &'a [u8],
    /// Method being called
    pub full_method: &'a str,
    /// Permissions the method requires
    pub required: &'a [Permission],
    /// Caller's address for `ipaddr` caveats
    pub peer: Option<IpAddr>,
}

/// A credential that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    /// Root key the credential is signed under
    pub root_key_id: Option<RootKeyId>,
    /// Operations the credential grants
    pub permissions: PermissionSet,
    /// Caveat predicates in chain order
    pub caveats: Vec<String>,
    /// Whether the root key is in the super macaroon namespace
    pub super_credential: bool,
    /// Hex encoding of the credential as supplied
    pub encoded: String,
    /// The owning backend has yet to check the credential; it does so when
    /// the call is forwarded with the credential attached
    pub delegated: bool,
}

impl VerifiedCredential {
    fn from_macaroon(macaroon: &Macaroon, raw: &[u8]) -> Self {
        let id = macaroon.id();
        let root_key_id = id.root_key_id();
        Self {
            root_key_id,
            permissions: id.ops,
            caveats: macaroon
                .caveats()
                .iter()
                .map(|c| String::from_utf8_lossy(&c.id).into_owned())
                .collect(),
            super_credential: root_key_id.is_some_and(RootKeyId::is_super),
            encoded: hex::encode(raw),
            delegated: false,
        }
    }
}

/// Verifies decoded credentials for one backend.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Verify `macaroon` for the call described by `request`.
    async fn verify(
        &self,
        macaroon: &Macaroon,
        request: &VerifyRequest<'_>,
    ) -> Result<VerifiedCredential, GatewayError>;
}

/// Verifies against a root-key store the gateway can read.
pub struct LocalVerifier {
    store: Arc<dyn RootKeyStore>,
}

impl LocalVerifier {
    /// Verifier over `store`.
    pub fn new(store: Arc<dyn RootKeyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialVerifier for LocalVerifier {
    async fn verify(
        &self,
        macaroon: &Macaroon,
        request: &VerifyRequest<'_>,
    ) -> Result<VerifiedCredential, GatewayError> {
        let id = macaroon.id();
        let root_key = self.store.get(&id.storage_id).await?;

        macaroon.verify_signature(root_key.as_bytes())?;

        CaveatChecker::new(request.peer)
            .check_all(macaroon)
            .map_err(|reason| GatewayError::Unauthorized { reason })?;

        if let Some(missing) = missing_permission(&id.ops, request.required, request.full_method) {
            return Err(GatewayError::Unauthorized {
                reason: format!("permission denied: missing {missing}"),
            });
        }

        Ok(VerifiedCredential::from_macaroon(macaroon, request.raw))
    }
}

/// Delegates verification to the core daemon's signing authority.
pub struct CoreVerifier {
    authority: Arc<dyn SigningAuthority>,
}

impl CoreVerifier {
    /// Verifier calling `authority`.
    pub fn new(authority: Arc<dyn SigningAuthority>) -> Self {
        Self { authority }
    }
}

#[async_trait]
impl CredentialVerifier for CoreVerifier {
    async fn verify(
        &self,
        macaroon: &Macaroon,
        request: &VerifyRequest<'_>,
    ) -> Result<VerifiedCredential, GatewayError> {
        self.authority
            .check_macaroon(
                request.raw.to_vec(),
                request.required.to_vec(),
                request.full_method.to_string(),
            )
            .await?;
        Ok(VerifiedCredential::from_macaroon(macaroon, request.raw))
    }
}

/// Leaves the check to the backend that issued the credential.
///
/// The gateway cannot read an auxiliary daemon's root keys, so the
/// credential is forwarded unchanged and the daemon's own rejection is the
/// verdict. Only decoding happens here.
pub struct BackendVerifier {
    backend: BackendName,
}

impl BackendVerifier {
    /// Verifier deferring to `backend`.
    pub fn new(backend: BackendName) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl CredentialVerifier for BackendVerifier {
    async fn verify(
        &self,
        macaroon: &Macaroon,
        request: &VerifyRequest<'_>,
    ) -> Result<VerifiedCredential, GatewayError> {
        debug!(
            backend = %self.backend,
            method = request.full_method,
            "Credential check deferred to backend"
        );
        Ok(VerifiedCredential {
            delegated: true,
            ..VerifiedCredential::from_macaroon(macaroon, request.raw)
        })
    }
}

/// Answers whether a super macaroon root key has been revoked.
pub trait RevocationList: Send + Sync {
    /// Whether credentials under `root_key_id` must be refused.
    fn is_revoked(&self, root_key_id: RootKeyId) -> bool;
}

/// Routes super macaroons to the signing authority's verifier and every
/// other credential to the backend's own verifier.
pub struct NamespaceVerifier {
    backend: BackendName,
    native: Arc<dyn CredentialVerifier>,
    super_verifier: Arc<dyn CredentialVerifier>,
    revocations: Option<Arc<dyn RevocationList>>,
}

impl NamespaceVerifier {
    /// Router for `backend`.
    pub fn new(
        backend: BackendName,
        native: Arc<dyn CredentialVerifier>,
        super_verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            backend,
            native,
            super_verifier,
            revocations: None,
        }
    }

    /// Refuse super macaroons whose root key is revoked.
    #[must_use]
    pub fn with_revocations(mut self, revocations: Arc<dyn RevocationList>) -> Self {
        self.revocations = Some(revocations);
        self
    }
}

#[async_trait]
impl CredentialVerifier for NamespaceVerifier {
    async fn verify(
        &self,
        macaroon: &Macaroon,
        request: &VerifyRequest<'_>,
    ) -> Result<VerifiedCredential, GatewayError> {
        match macaroon.root_key_id() {
            Some(root_key_id) if root_key_id.is_super() => {
                if self
                    .revocations
                    .as_ref()
                    .is_some_and(|list| list.is_revoked(root_key_id))
                {
                    return Err(GatewayError::Unauthorized {
                        reason: "session revoked".to_string(),
                    });
                }
                debug!(
                    backend = %self.backend,
                    root_key_id = %root_key_id,
                    "Verifying super macaroon with signing authority"
                );
                self.super_verifier.verify(macaroon, request).await
            }
            _ => self.native.verify(macaroon, request).await,
        }
    }
}
