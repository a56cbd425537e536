//! Gateway assembly and process lifecycle
//!
//! [`GatewayBuilder`] wires the endpoint registry, policy table, verifiers,
//! backends and session surface into one API service. [`run`] does the same
//! from a [`Config`] against real daemons and serves both listeners until a
//! shutdown signal arrives.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::auth::{
    Authorizer, BackendVerifier, CoreVerifier, CredentialVerifier, ListenerPort, NamespaceVerifier,
    PasswordValidator, PolicyTable, RevocationList,
};
use crate::backend::{
    Backend, BackendRouter, GrpcBackend, GrpcBackendConfig, LndSigningAuthority, SigningAuthority,
};
use crate::bakery::{DeclaredPermissions, SuperMacaroonBaker};
use crate::config::{BackendSettings, Config};
use crate::endpoints::{BackendName, EndpointRegistry};
use crate::error::GatewayError;
use crate::middleware::{build_api_stack, ApiService};
use crate::observability::{serve_metrics, GatewayMetrics};
use crate::server::{self, Mux, StaticUi, TlsIdentity};
use crate::session::{SessionService, SessionStore};
use crate::shutdown::{wait_for_signal, ShutdownCoordinator};

/// Default deadline for outbound calls.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Assembles a [`Gateway`].
pub struct GatewayBuilder {
    authority: Arc<dyn SigningAuthority>,
    password: PasswordValidator,
    endpoints: Arc<EndpointRegistry>,
    policy: PolicyTable,
    backends: Vec<Arc<dyn Backend>>,
    native_verifiers: HashMap<BackendName, Arc<dyn CredentialVerifier>>,
    ui: StaticUi,
    timeout: Duration,
    metrics: Option<GatewayMetrics>,
}

impl GatewayBuilder {
    /// Builder around the core daemon's signing authority and the UI password.
    pub fn new(authority: Arc<dyn SigningAuthority>, ui_password: &str) -> Self {
        Self {
            authority,
            password: PasswordValidator::new(ui_password),
            endpoints: Arc::new(EndpointRegistry::builtin()),
            policy: PolicyTable::builtin(),
            backends: Vec::new(),
            native_verifiers: HashMap::new(),
            ui: StaticUi::disabled(),
            timeout: DEFAULT_BACKEND_TIMEOUT,
            metrics: None,
        }
    }

    /// Route calls for the backend's methods to `backend`.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Verify `backend`'s own credentials with `verifier` instead of
    /// leaving the check to the backend itself.
    #[must_use]
    pub fn with_native_verifier(
        mut self,
        backend: BackendName,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        self.native_verifiers.insert(backend, verifier);
        self
    }

    /// Replace the auth policy.
    #[must_use]
    pub fn with_policy(mut self, policy: PolicyTable) -> Self {
        self.policy = policy;
        self
    }

    /// Serve the UI.
    #[must_use]
    pub fn with_ui(mut self, ui: StaticUi) -> Self {
        self.ui = ui;
        self
    }

    /// Deadline for every outbound call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: GatewayMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the policy and wire everything together.
    ///
    /// The core daemon checks its own credentials through the signing
    /// authority. Every other backend that verifies credentials needs either
    /// a native verifier or a registered backend to forward them to; a
    /// backend with neither fails the build.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        self.policy
            .validate()
            .map_err(|e| GatewayError::Internal(anyhow::anyhow!(e)))?;

        let sessions = Arc::new(SessionStore::new());
        let mut baker = SuperMacaroonBaker::new(
            self.authority.clone(),
            DeclaredPermissions::all(&self.endpoints),
            self.timeout,
        );
        if let Some(metrics) = &self.metrics {
            baker = baker.with_metrics(metrics.clone());
        }
        let baker = Arc::new(baker);

        let core: Arc<dyn CredentialVerifier> = Arc::new(CoreVerifier::new(self.authority.clone()));
        let revocations: Arc<dyn RevocationList> = sessions.clone();
        let registered: Vec<BackendName> = self.backends.iter().map(|b| b.name()).collect();
        let mut verifiers = Vec::new();
        for backend in BackendName::ALL {
            let native: Arc<dyn CredentialVerifier> = match self.native_verifiers.get(&backend) {
                Some(verifier) => verifier.clone(),
                None if backend == BackendName::Lnd => core.clone(),
                None if registered.contains(&backend) => Arc::new(BackendVerifier::new(backend)),
                None if !self.policy.verifies_credentials(backend) => continue,
                None => {
                    return Err(GatewayError::Internal(anyhow::anyhow!(
                        "{backend} credentials cannot be verified: no backend or verifier registered"
                    )))
                }
            };
            let verifier = NamespaceVerifier::new(backend, native, core.clone())
                .with_revocations(revocations.clone());
            verifiers.push((backend, verifier));
        }

        let mut authorizer = Authorizer::new(
            self.endpoints.clone(),
            Arc::new(self.policy),
            self.password,
            self.timeout,
        );
        for (backend, verifier) in verifiers {
            authorizer = authorizer.with_verifier(backend, Arc::new(verifier));
        }
        let authorizer = Arc::new(authorizer);

        let session_service: Arc<dyn Backend> =
            Arc::new(SessionService::new(sessions.clone(), baker.clone()));
        let router = BackendRouter::new(
            self.endpoints.clone(),
            self.backends.into_iter().chain([session_service]),
            self.metrics.clone(),
        );
        for backend in BackendName::ALL {
            if !router.has_backend(backend) {
                warn!(backend = %backend, "No backend configured; its calls will fail as unavailable");
            }
        }

        let api = build_api_stack(authorizer.clone(), router, self.timeout, self.metrics);

        Ok(Gateway {
            api,
            endpoints: self.endpoints,
            authorizer,
            sessions,
            baker,
            ui: self.ui,
        })
    }
}

/// A fully wired gateway, ready to be served.
pub struct Gateway {
    api: ApiService,
    endpoints: Arc<EndpointRegistry>,
    authorizer: Arc<Authorizer>,
    sessions: Arc<SessionStore>,
    baker: Arc<SuperMacaroonBaker>,
    ui: StaticUi,
}

impl Gateway {
    /// Request dispatcher for `port`.
    pub fn mux(&self, port: ListenerPort) -> Mux {
        Mux::new(self.api.clone(), self.endpoints.clone(), self.ui.clone(), port)
    }

    /// The API service stack shared by every adapter.
    pub fn api(&self) -> ApiService {
        self.api.clone()
    }

    /// Authorizer in front of every call.
    pub fn authorizer(&self) -> &Arc<Authorizer> {
        &self.authorizer
    }

    /// Sessions created through the session surface.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Super macaroon baker.
    pub fn baker(&self) -> &Arc<SuperMacaroonBaker> {
        &self.baker
    }
}

/// Connection settings for one configured daemon.
pub fn backend_config(
    settings: &BackendSettings,
    timeout: Duration,
) -> anyhow::Result<GrpcBackendConfig> {
    let mut config = GrpcBackendConfig::new(
        settings.name,
        settings.rpc_url.origin().ascii_serialization(),
    )
    .with_connect_timeout(timeout);
    if let Some(path) = &settings.tls_cert_path {
        config = config.with_tls_ca(read_file(path, "TLS certificate")?);
        if let Some(host) = settings.rpc_url.host_str() {
            config = config.with_tls_domain(host);
        }
    }
    if let Some(path) = &settings.macaroon_path {
        config = config.with_service_macaroon(read_file(path, "macaroon")?);
    }
    Ok(config)
}

fn read_file(path: &Path, what: &str) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("unable to read {what} {}", path.display()))
}

/// The core daemon's signing authority, authorized with its admin macaroon.
pub fn core_authority(config: &Config) -> anyhow::Result<(GrpcBackend, LndSigningAuthority)> {
    let settings = config
        .backend(BackendName::Lnd)
        .context("lnd backend not configured")?;
    let macaroon_path = settings
        .macaroon_path
        .as_deref()
        .context("LND_MACAROON_PATH is required")?;
    let admin = read_file(macaroon_path, "admin macaroon")?;

    let lnd = GrpcBackend::connect_lazy(backend_config(settings, config.backend_timeout)?)?;
    let authority = LndSigningAuthority::new(lnd.channel(), &admin, config.backend_timeout);
    Ok((lnd, authority))
}

/// Run the gateway until SIGINT/SIGTERM or until a listener fails.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let identity = TlsIdentity::load(&config.tls_cert_path, &config.tls_key_path)?;
    match identity.summary() {
        Ok(summary) => {
            info!(
                subject = %summary.subject,
                dns_names = ?summary.dns_names,
                not_after = %summary.not_after,
                "Loaded TLS certificate"
            );
            if !summary.is_valid_at(Utc::now()) {
                warn!("TLS certificate is outside its validity period");
            }
        }
        Err(e) => warn!(error = %e, "Unable to inspect TLS certificate"),
    }
    let acceptor = identity.acceptor()?;

    let metrics = GatewayMetrics::new()?;
    let (lnd, authority) = core_authority(&config)?;

    let mut builder = GatewayBuilder::new(Arc::new(authority), &config.ui_password)
        .with_timeout(config.backend_timeout)
        .with_metrics(metrics.clone())
        .with_backend(Arc::new(lnd));
    if let Some(dir) = &config.ui_dir {
        builder = builder.with_ui(StaticUi::new(dir));
    }
    for settings in config.backends.iter().filter(|b| b.name != BackendName::Lnd) {
        let backend = GrpcBackend::connect_lazy(backend_config(settings, config.backend_timeout)?)?;
        builder = builder.with_backend(Arc::new(backend));
    }
    let gateway = builder.build()?;

    let gateway_listener = TcpListener::bind(config.gateway_addr()?)
        .await
        .context("unable to bind gateway port")?;
    let core_listener = TcpListener::bind(config.core_addr()?)
        .await
        .context("unable to bind core port")?;

    let mut coordinator = ShutdownCoordinator::new();
    let gateway_mux = gateway.mux(ListenerPort::Gateway);
    let gateway_acceptor = acceptor.clone();
    coordinator.spawn("gateway-listener", move |signal| {
        server::serve(gateway_listener, gateway_acceptor, gateway_mux, signal)
    });
    let core_mux = gateway.mux(ListenerPort::Core);
    coordinator.spawn("core-listener", move |signal| {
        server::serve(core_listener, acceptor, core_mux, signal)
    });
    if let Some(addr) = config.metrics_addr {
        coordinator.spawn("metrics", move |signal| serve_metrics(addr, metrics, signal));
    }

    info!(
        gateway_port = config.gateway_port,
        core_port = config.core_port,
        "Terminal gateway started"
    );

    tokio::select! {
        () = wait_for_signal() => {}
        () = coordinator.any_task_exited() => warn!("A listener exited unexpectedly"),
    }

    coordinator.shutdown(config.shutdown_timeout).await;
    Ok(())
}
