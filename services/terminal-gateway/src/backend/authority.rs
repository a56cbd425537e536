//! The core daemon's signing authority
//!
//! Super macaroons are minted and checked by the core daemon. The gateway
//! never holds the root keys; it asks over the daemon's own RPC surface,
//! authenticated with an admin credential.

use std::time::Duration;

use async_trait::async_trait;
use http::uri::PathAndQuery;
use tonic::codec::ProstCodec;
use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use tonic::{Code, Status};
use tracing::{debug, instrument};

use super::upstream_error;
use crate::auth::MACAROON_HEADER;
use crate::endpoints::BackendName;
use crate::error::GatewayError;
use crate::permission::Permission;
use crate::proto::lnrpc::{
    self, BakeMacaroonRequest, BakeMacaroonResponse, CheckMacPermRequest, CheckMacPermResponse,
    MacaroonPermission,
};
use crate::rootkey::RootKeyId;

/// Mints and checks macaroons under root keys the gateway cannot read.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SigningAuthority: Send + Sync {
    /// Mint a macaroon under `root_key_id` granting `permissions`.
    /// Returns the binary encoding.
    async fn bake_macaroon(
        &self,
        root_key_id: RootKeyId,
        permissions: Vec<Permission>,
    ) -> Result<Vec<u8>, GatewayError>;

    /// Check that `macaroon` is valid and grants `required` for `full_method`.
    async fn check_macaroon(
        &self,
        macaroon: Vec<u8>,
        required: Vec<Permission>,
        full_method: String,
    ) -> Result<(), GatewayError>;
}

/// The core node daemon as signing authority.
#[derive(Clone)]
pub struct LndSigningAuthority {
    channel: Channel,
    admin_macaroon: String,
    timeout: Duration,
}

impl LndSigningAuthority {
    /// Authority reached over `channel`, authenticated with `admin_macaroon`.
    pub fn new(channel: Channel, admin_macaroon: &[u8], timeout: Duration) -> Self {
        Self {
            channel,
            admin_macaroon: hex::encode(admin_macaroon),
            timeout,
        }
    }

    async fn unary<Req, Resp>(&self, path: &'static str, message: Req) -> Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.timeout);
        let credential = MetadataValue::try_from(self.admin_macaroon.as_str())
            .map_err(|e| Status::internal(format!("admin credential: {e}")))?;
        request.metadata_mut().insert(MACAROON_HEADER, credential);

        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(e.to_string()))?;
        let response = grpc
            .unary(
                request,
                PathAndQuery::from_static(path),
                ProstCodec::<Req, Resp>::default(),
            )
            .await?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl SigningAuthority for LndSigningAuthority {
    #[instrument(skip(self, permissions), fields(root_key_id = %root_key_id, permissions = permissions.len()))]
    async fn bake_macaroon(
        &self,
        root_key_id: RootKeyId,
        permissions: Vec<Permission>,
    ) -> Result<Vec<u8>, GatewayError> {
        let request = BakeMacaroonRequest {
            permissions: permissions.iter().map(MacaroonPermission::from).collect(),
            root_key_id: root_key_id.0,
            allow_external_permissions: true,
        };
        let response: BakeMacaroonResponse = self
            .unary(lnrpc::BAKE_MACAROON, request)
            .await
            .map_err(|status| upstream_error(BackendName::Lnd, status))?;

        hex::decode(&response.macaroon).map_err(|e| {
            GatewayError::Internal(anyhow::anyhow!("signing authority returned bad hex: {e}"))
        })
    }

    async fn check_macaroon(
        &self,
        macaroon: Vec<u8>,
        required: Vec<Permission>,
        full_method: String,
    ) -> Result<(), GatewayError> {
        let request = CheckMacPermRequest {
            macaroon,
            permissions: required.iter().map(MacaroonPermission::from).collect(),
            full_method,
        };
        let response: CheckMacPermResponse = self
            .unary(lnrpc::CHECK_MACAROON_PERMISSIONS, request)
            .await
            .map_err(classify_check_failure)?;

        if response.valid {
            debug!("Signing authority accepted credential");
            Ok(())
        } else {
            Err(GatewayError::Unauthorized {
                reason: "permission denied".to_string(),
            })
        }
    }
}

/// Map a failed permission check back onto the credential taxonomy.
///
/// The core daemon reports verification failures as plain errors whose
/// message carries the class; transport failures keep their gRPC code.
pub fn classify_check_failure(status: Status) -> GatewayError {
    if let Some(err) = credential_rejection(&status) {
        return err;
    }
    if status.code() == Code::Unknown {
        GatewayError::Unauthorized {
            reason: status.message().to_string(),
        }
    } else {
        upstream_error(BackendName::Lnd, status)
    }
}

/// A daemon's refusal of the credential it was handed, if `status` is one.
///
/// Daemons built on the same macaroon service word their refusals
/// identically, whichever RPC carried the credential.
pub fn credential_rejection(status: &Status) -> Option<GatewayError> {
    let message = status.message();
    let rest = |prefix: &str| {
        message
            .strip_prefix(prefix)
            .unwrap_or(message)
            .trim_start_matches(':')
            .trim()
            .to_string()
    };

    if message.starts_with("cannot get macaroon") {
        Some(GatewayError::UnknownRootKey {
            reason: rest("cannot get macaroon"),
        })
    } else if message.starts_with("unable to unmarshal macaroon") {
        Some(GatewayError::MalformedCredential {
            reason: rest("unable to unmarshal macaroon"),
        })
    } else if message.starts_with("verification failed") {
        Some(GatewayError::Unauthorized {
            reason: rest("verification failed"),
        })
    } else if message.starts_with("permission denied") {
        Some(GatewayError::Unauthorized {
            reason: message.to_string(),
        })
    } else {
        None
    }
}
