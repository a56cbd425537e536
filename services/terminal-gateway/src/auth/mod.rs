//! Authentication and authorization
//!
//! The [`Authorizer`] decides, for each call, whether the caller may reach
//! the method on the port it connected to. It combines the endpoint
//! registry, the policy table, the UI password and one credential verifier
//! per backend.

mod context;
mod password;
mod policy;
mod verifier;

pub use context::{AuthContext, MACAROON_HEADER};
pub use password::{BasicAuth, PasswordValidator};
pub use policy::{AuthMode, ListenerPort, PasswordRule, PolicyError, PolicyTable, PortRule};
pub use verifier::{
    BackendVerifier, CoreVerifier, CredentialVerifier, LocalVerifier, NamespaceVerifier,
    RevocationList, VerifiedCredential, VerifyRequest,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::endpoints::{BackendName, EndpointRegistry};
use crate::error::GatewayError;
use crate::macaroon::Macaroon;

/// Outcome of a successful authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// Authorized by the UI password
    Password,
    /// Authorized by a verified credential
    Credential(VerifiedCredential),
}

impl Grant {
    /// Auth mode that produced the grant.
    pub fn mode(&self) -> AuthMode {
        match self {
            Self::Password => AuthMode::Password,
            Self::Credential(_) => AuthMode::Credential,
        }
    }
}

/// Per-call authorization.
pub struct Authorizer {
    endpoints: Arc<EndpointRegistry>,
    policy: Arc<PolicyTable>,
    password: PasswordValidator,
    verifiers: HashMap<BackendName, Arc<dyn CredentialVerifier>>,
    deadline: Duration,
}

impl Authorizer {
    /// Authorizer without verifiers; add one per credential-accepting backend.
    pub fn new(
        endpoints: Arc<EndpointRegistry>,
        policy: Arc<PolicyTable>,
        password: PasswordValidator,
        deadline: Duration,
    ) -> Self {
        Self {
            endpoints,
            policy,
            password,
            verifiers: HashMap::new(),
            deadline,
        }
    }

    /// Register the verifier for `backend`.
    #[must_use]
    pub fn with_verifier(
        mut self,
        backend: BackendName,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        self.verifiers.insert(backend, verifier);
        self
    }

    /// Endpoint registry in use.
    pub fn endpoints(&self) -> &Arc<EndpointRegistry> {
        &self.endpoints
    }

    /// Authorize a call to `full_method` arriving on `port`.
    ///
    /// Order of evaluation:
    /// 1. Where the password substitutes for a credential, a correct password
    ///    grants the call. A wrong one is remembered but not yet reported.
    /// 2. Exactly one credential must be present.
    /// 3. Where credentials are verified, the credential decides: malformed,
    ///    unknown root key or unauthorized failures surface unchanged.
    /// 4. Otherwise the password decides.
    #[instrument(skip(self, context), fields(port = %port))]
    pub async fn authorize(
        &self,
        full_method: &str,
        port: ListenerPort,
        context: &AuthContext,
    ) -> Result<Grant, GatewayError> {
        let descriptor =
            self.endpoints
                .lookup(full_method)
                .ok_or_else(|| GatewayError::UnknownMethod {
                    method: full_method.to_string(),
                })?;

        let rule = self
            .policy
            .rule(descriptor.backend, port)
            .ok_or_else(|| GatewayError::Unauthenticated {
                reason: format!("{full_method} is not served on the {port} port"),
            })?;

        let password = match (rule.password, context.basic_auth()) {
            (PasswordRule::Rejected, _) | (_, None) => None,
            (_, Some(auth)) => Some(self.password.validate(auth)),
        };

        if rule.password == PasswordRule::Substitutes && matches!(password, Some(Ok(()))) {
            debug!(method = full_method, "Authorized by UI password");
            return Ok(Grant::Password);
        }

        let encoded = context.credential()?;

        if rule.credential {
            let raw = hex::decode(encoded.trim()).map_err(|e| GatewayError::MalformedCredential {
                reason: format!("invalid hex encoding: {e}"),
            })?;
            let macaroon = Macaroon::from_binary(&raw)?;
            let verifier = self.verifiers.get(&descriptor.backend).ok_or_else(|| {
                GatewayError::Unauthenticated {
                    reason: format!("no credential verifier for {}", descriptor.backend),
                }
            })?;

            let request = VerifyRequest {
                raw: &raw,
                full_method,
                required: &descriptor.permissions,
                peer: context.peer(),
            };
            let verified = tokio::time::timeout(self.deadline, verifier.verify(&macaroon, &request))
                .await
                .map_err(|_| GatewayError::Timeout {
                    operation: format!("{} credential check", descriptor.backend),
                    duration: self.deadline,
                })??;

            debug!(
                method = full_method,
                super_credential = verified.super_credential,
                "Authorized by credential"
            );
            return Ok(Grant::Credential(verified));
        }

        match (rule.password, password) {
            (PasswordRule::Rejected, _) => Err(GatewayError::Unauthenticated {
                reason: format!("no auth mode accepted for {full_method} on the {port} port"),
            }),
            (_, Some(Ok(()))) => Ok(Grant::Password),
            (_, Some(Err(err))) => Err(err),
            (_, None) => Err(GatewayError::Unauthenticated {
                reason: format!("basic auth required for {full_method}"),
            }),
        }
    }
}
