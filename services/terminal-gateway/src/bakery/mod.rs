//! Super macaroon baking
//!
//! A super macaroon carries the union of every backend's declared
//! permissions and is minted by the core daemon's signing authority under a
//! root key in the reserved super macaroon namespace. Baking is
//! all-or-nothing: any failure yields [`GatewayError::AggregationFailed`]
//! and no token.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{info, instrument};

use crate::backend::SigningAuthority;
use crate::endpoints::{BackendName, EndpointRegistry};
use crate::error::GatewayError;
use crate::macaroon::Macaroon;
use crate::observability::GatewayMetrics;
use crate::permission::PermissionSet;
use crate::rootkey::RootKeyId;

/// Supplies the permissions one backend grants.
#[async_trait]
pub trait PermissionSource: Send + Sync {
    /// Backend whose permissions these are.
    fn backend(&self) -> BackendName;

    /// Declared permissions; only reads when `read_only` is set.
    async fn permissions(&self, read_only: bool) -> Result<PermissionSet, GatewayError>;
}

/// Permissions as declared by the compiled-in endpoint table.
pub struct DeclaredPermissions {
    backend: BackendName,
    endpoints: Arc<EndpointRegistry>,
}

impl DeclaredPermissions {
    /// Source for `backend`.
    pub fn new(backend: BackendName, endpoints: Arc<EndpointRegistry>) -> Self {
        Self { backend, endpoints }
    }

    /// One source per backend, the session surface included.
    pub fn all(endpoints: &Arc<EndpointRegistry>) -> Vec<Arc<dyn PermissionSource>> {
        BackendName::ALL
            .into_iter()
            .map(|backend| {
                Arc::new(Self::new(backend, endpoints.clone())) as Arc<dyn PermissionSource>
            })
            .collect()
    }
}

#[async_trait]
impl PermissionSource for DeclaredPermissions {
    fn backend(&self) -> BackendName {
        self.backend
    }

    async fn permissions(&self, read_only: bool) -> Result<PermissionSet, GatewayError> {
        Ok(self.endpoints.permissions(self.backend, read_only))
    }
}

/// What to bake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakeRequest {
    /// Root key in the super macaroon namespace
    pub root_key_id: RootKeyId,
    /// Keep only read permissions
    pub read_only: bool,
    /// First-party caveats added after minting
    pub caveats: Vec<String>,
}

impl BakeRequest {
    /// Full-access request for `root_key_id`.
    pub fn new(root_key_id: RootKeyId) -> Self {
        Self {
            root_key_id,
            read_only: false,
            caveats: Vec::new(),
        }
    }

    /// Restrict to read permissions.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Add a first-party caveat.
    #[must_use]
    pub fn with_caveat(mut self, predicate: impl Into<String>) -> Self {
        self.caveats.push(predicate.into());
        self
    }
}

/// A baked super macaroon.
#[derive(Debug, Clone)]
pub struct SuperMacaroon {
    macaroon: Macaroon,
    permissions: PermissionSet,
}

impl SuperMacaroon {
    /// The token.
    pub fn macaroon(&self) -> &Macaroon {
        &self.macaroon
    }

    /// Root key it is signed under.
    pub fn root_key_id(&self) -> Option<RootKeyId> {
        self.macaroon.root_key_id()
    }

    /// Permissions it grants.
    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// Hex encoding, as sent in the `macaroon` header.
    pub fn to_hex(&self) -> String {
        self.macaroon.to_hex()
    }

    /// Write the hex encoding to `path`, readable by the owner only.
    pub fn write_to_file(&self, path: &Path) -> std::io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;

        // The mode above only applies when the file is created.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(self.to_hex().as_bytes())?;
        file.sync_all()
    }
}

/// Bakes super macaroons through the signing authority.
pub struct SuperMacaroonBaker {
    authority: Arc<dyn SigningAuthority>,
    sources: Vec<Arc<dyn PermissionSource>>,
    deadline: Duration,
    metrics: Option<GatewayMetrics>,
}

impl SuperMacaroonBaker {
    /// Baker over `sources`; every upstream step is bounded by `deadline`.
    pub fn new(
        authority: Arc<dyn SigningAuthority>,
        sources: Vec<Arc<dyn PermissionSource>>,
        deadline: Duration,
    ) -> Self {
        Self {
            authority,
            sources,
            deadline,
            metrics: None,
        }
    }

    /// Count baked tokens.
    #[must_use]
    pub fn with_metrics(mut self, metrics: GatewayMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Union of every source's permissions, in sorted order.
    pub async fn collect_permissions(&self, read_only: bool) -> Result<PermissionSet, GatewayError> {
        if self.sources.is_empty() {
            return Err(GatewayError::InvalidRequest {
                reason: "no permission sources registered".to_string(),
            });
        }

        let sets = tokio::time::timeout(
            self.deadline,
            try_join_all(self.sources.iter().map(|s| s.permissions(read_only))),
        )
        .await
        .map_err(|_| GatewayError::Timeout {
            operation: "permission collection".to_string(),
            duration: self.deadline,
        })??;

        Ok(sets.into_iter().flatten().collect())
    }

    /// Bake a super macaroon.
    #[instrument(skip(self, request), fields(root_key_id = %request.root_key_id, read_only = request.read_only))]
    pub async fn bake(&self, request: BakeRequest) -> Result<SuperMacaroon, GatewayError> {
        self.bake_inner(request).await.map_err(GatewayError::aggregation)
    }

    async fn bake_inner(&self, request: BakeRequest) -> Result<SuperMacaroon, GatewayError> {
        if !request.root_key_id.is_super() {
            return Err(GatewayError::InvalidRequest {
                reason: format!(
                    "root key {} is outside the super macaroon namespace",
                    request.root_key_id
                ),
            });
        }

        let permissions = self.collect_permissions(request.read_only).await?;

        let raw = tokio::time::timeout(
            self.deadline,
            self.authority
                .bake_macaroon(request.root_key_id, permissions.iter().cloned().collect()),
        )
        .await
        .map_err(|_| GatewayError::Timeout {
            operation: "macaroon signing".to_string(),
            duration: self.deadline,
        })??;

        let mut macaroon = Macaroon::from_binary(&raw)?;
        if macaroon.root_key_id() != Some(request.root_key_id) {
            return Err(GatewayError::Internal(anyhow::anyhow!(
                "signing authority minted under an unexpected root key"
            )));
        }
        for caveat in &request.caveats {
            macaroon.add_first_party_caveat(caveat.as_bytes());
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_bake(request.read_only);
        }
        info!(permissions = permissions.len(), "Baked super macaroon");

        Ok(SuperMacaroon {
            macaroon,
            permissions,
        })
    }
}
