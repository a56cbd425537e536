//! Shared fixtures: an in-process gateway over fake daemons.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Request, Response};
use http_body_util::{BodyExt, Full};
use parking_lot::Mutex;
use prost::Message;
use tempfile::TempDir;
use tonic::Status;
use tower::ServiceExt;

use terminal_gateway::auth::{
    BasicAuth, CredentialVerifier, Grant, ListenerPort, LocalVerifier, VerifyRequest,
};
use terminal_gateway::backend::{Backend, SigningAuthority};
use terminal_gateway::call::{GatewayCall, GatewayReply, Protocol};
use terminal_gateway::endpoints::{BackendName, EndpointRegistry};
use terminal_gateway::macaroon::Macaroon;
use terminal_gateway::permission::Permission;
use terminal_gateway::proto::{frdrpc, lnrpc, looprpc, poolrpc};
use terminal_gateway::rootkey::{MemoryRootKeyStore, RootKeyId};
use terminal_gateway::server::{GatewayBody, StaticUi};
use terminal_gateway::{Gateway, GatewayBuilder, GatewayError};

pub const UI_PASSWORD: &str = "correct horse battery";
pub const WRONG_PASSWORD: &str = "incorrect horse";
pub const UI_MARKER: &str = "terminal-ui-index-marker";
pub const NODE_PUBKEY: &str = "02f00dfeedface";
pub const SWAP_ID: &str = "swap-0001";

/// Root key absent from every store in the harness.
pub const FOREIGN_ROOT_KEY: RootKeyId = RootKeyId(0xdead);

/// Signing authority over an in-memory root-key store, standing in for the
/// core daemon.
pub struct FakeCore {
    pub keys: Arc<MemoryRootKeyStore>,
}

#[async_trait]
impl SigningAuthority for FakeCore {
    async fn bake_macaroon(
        &self,
        root_key_id: RootKeyId,
        permissions: Vec<Permission>,
    ) -> Result<Vec<u8>, GatewayError> {
        Ok(self.keys.mint(root_key_id, permissions, "lnd").to_binary())
    }

    async fn check_macaroon(
        &self,
        macaroon: Vec<u8>,
        required: Vec<Permission>,
        full_method: String,
    ) -> Result<(), GatewayError> {
        let decoded = Macaroon::from_binary(&macaroon)?;
        let request = VerifyRequest {
            raw: &macaroon,
            full_method: &full_method,
            required: &required,
            peer: None,
        };
        LocalVerifier::new(self.keys.clone())
            .verify(&decoded, &request)
            .await
            .map(|_| ())
    }
}

/// A daemon answering every method with a canned reply and recording the
/// grants it was called with. A daemon with its own root keys checks the
/// credentials it is handed, the way an auxiliary daemon does.
pub struct FakeDaemon {
    name: BackendName,
    replies: HashMap<&'static str, Bytes>,
    keys: Option<Arc<MemoryRootKeyStore>>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl FakeDaemon {
    fn new(name: BackendName, replies: impl IntoIterator<Item = (&'static str, Bytes)>) -> Self {
        Self {
            name,
            replies: replies.into_iter().collect(),
            keys: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_keys(mut self, keys: Arc<MemoryRootKeyStore>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Check a forwarded credential against this daemon's own root keys and
    /// refuse it the way a daemon does, with a plain error status.
    async fn check_credential(&self, call: &GatewayCall) -> Result<(), GatewayError> {
        let (Some(keys), Some(Grant::Credential(credential))) = (&self.keys, &call.grant) else {
            return Ok(());
        };
        if credential.super_credential {
            return Ok(());
        }
        let raw = hex::decode(&credential.encoded).unwrap();
        let macaroon = Macaroon::from_binary(&raw)?;
        let required = self.required_permissions(&call.full_method);
        let request = VerifyRequest {
            raw: &raw,
            full_method: &call.full_method,
            required: &required,
            peer: None,
        };
        LocalVerifier::new(keys.clone())
            .verify(&macaroon, &request)
            .await
            .map(|_| ())
            .map_err(|err| GatewayError::Upstream(Status::unknown(err.to_string())))
    }

    fn required_permissions(&self, full_method: &str) -> Vec<Permission> {
        EndpointRegistry::builtin()
            .lookup(full_method)
            .map(|descriptor| descriptor.permissions.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    pub fn last_grant(&self) -> Option<Grant> {
        self.calls.lock().last().and_then(|call| call.grant.clone())
    }
}

#[async_trait]
impl Backend for FakeDaemon {
    fn name(&self) -> BackendName {
        self.name
    }

    async fn call(&self, call: &GatewayCall) -> Result<GatewayReply, GatewayError> {
        self.calls.lock().push(call.clone());
        self.check_credential(call).await?;
        let message = self
            .replies
            .get(call.full_method.as_str())
            .cloned()
            .unwrap_or_default();
        let mut reply = GatewayReply::new(message);
        reply
            .metadata
            .insert("x-daemon", HeaderValue::from_static(self.name.as_str()));
        Ok(reply)
    }
}

fn encoded(message: impl Message) -> Bytes {
    Bytes::from(message.encode_to_vec())
}

/// Gateway wired to fake daemons, with each auxiliary daemon verifying its
/// own credentials from its own root-key store when calls reach it.
pub struct Harness {
    pub gateway: Gateway,
    pub endpoints: Arc<EndpointRegistry>,
    pub core_keys: Arc<MemoryRootKeyStore>,
    pub daemon_keys: HashMap<BackendName, Arc<MemoryRootKeyStore>>,
    pub daemons: HashMap<BackendName, Arc<FakeDaemon>>,
    _ui_dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let ui_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            ui_dir.path().join("index.html"),
            format!("<html><body>{UI_MARKER}</body></html>"),
        )
        .unwrap();
        std::fs::write(ui_dir.path().join("app.js"), "console.log('ui');").unwrap();

        let core_keys = Arc::new(MemoryRootKeyStore::new());
        let authority = Arc::new(FakeCore {
            keys: core_keys.clone(),
        });

        let daemon_keys: HashMap<BackendName, Arc<MemoryRootKeyStore>> =
            [BackendName::Faraday, BackendName::Loop, BackendName::Pool]
                .into_iter()
                .map(|backend| (backend, Arc::new(MemoryRootKeyStore::new())))
                .collect();

        let daemons: HashMap<BackendName, Arc<FakeDaemon>> = [
            FakeDaemon::new(
                BackendName::Lnd,
                [
                    (
                        lnrpc::GET_INFO,
                        encoded(lnrpc::GetInfoResponse {
                            identity_pubkey: NODE_PUBKEY.to_string(),
                            ..Default::default()
                        }),
                    ),
                    (
                        lnrpc::ADD_INVOICE,
                        encoded(lnrpc::AddInvoiceResponse {
                            payment_request: "lnbcrt1fake".to_string(),
                            add_index: 7,
                            ..Default::default()
                        }),
                    ),
                ],
            ),
            FakeDaemon::new(
                BackendName::Faraday,
                [(
                    frdrpc::REVENUE_REPORT,
                    encoded(frdrpc::RevenueReportResponse::default()),
                )],
            ),
            FakeDaemon::new(
                BackendName::Loop,
                [(
                    looprpc::LIST_SWAPS,
                    encoded(looprpc::ListSwapsResponse {
                        swaps: vec![looprpc::SwapStatus {
                            id: SWAP_ID.to_string(),
                            amt: 250_000,
                            ..Default::default()
                        }],
                    }),
                )],
            ),
            FakeDaemon::new(
                BackendName::Pool,
                [(
                    poolrpc::GET_INFO,
                    encoded(poolrpc::GetInfoResponse {
                        accounts_total: 3,
                        ..Default::default()
                    }),
                )],
            ),
        ]
        .into_iter()
        .map(|daemon| match daemon_keys.get(&daemon.name) {
            Some(keys) => daemon.with_keys(keys.clone()),
            None => daemon,
        })
        .map(|daemon| (daemon.name, Arc::new(daemon)))
        .collect();

        let mut builder = GatewayBuilder::new(authority, UI_PASSWORD)
            .with_ui(StaticUi::new(ui_dir.path()));
        for daemon in daemons.values() {
            builder = builder.with_backend(daemon.clone());
        }

        Self {
            gateway: builder.build().unwrap(),
            endpoints: Arc::new(EndpointRegistry::builtin()),
            core_keys,
            daemon_keys,
            daemons,
            _ui_dir: ui_dir,
        }
    }

    /// Root-key store of the daemon that verifies `backend`'s credentials.
    fn keys_for(&self, backend: BackendName) -> &Arc<MemoryRootKeyStore> {
        self.daemon_keys.get(&backend).unwrap_or(&self.core_keys)
    }

    /// A valid native credential for every method of `backend`.
    pub fn macaroon(&self, backend: BackendName) -> String {
        self.keys_for(backend)
            .mint(
                RootKeyId::DEFAULT,
                self.endpoints.permissions(backend, false),
                backend.as_str(),
            )
            .to_hex()
    }

    /// A well-formed credential signed under a root key nobody knows.
    pub fn foreign_macaroon(&self, backend: BackendName) -> String {
        MemoryRootKeyStore::new()
            .mint(
                FOREIGN_ROOT_KEY,
                self.endpoints.permissions(backend, false),
                backend.as_str(),
            )
            .to_hex()
    }

    pub fn daemon(&self, backend: BackendName) -> &Arc<FakeDaemon> {
        &self.daemons[&backend]
    }

    /// Run `method` through the API stack as a native gRPC call.
    pub async fn call(
        &self,
        port: ListenerPort,
        method: &str,
        headers: HeaderMap,
        message: Bytes,
    ) -> Result<GatewayReply, GatewayError> {
        let call = GatewayCall::new(method, Protocol::Grpc, port, headers, message);
        self.gateway.api().oneshot(call).await
    }

    /// Serve `request` on `port` through the full protocol multiplexer.
    pub async fn request(
        &self,
        port: ListenerPort,
        request: Request<Full<Bytes>>,
    ) -> Response<GatewayBody> {
        match self.gateway.mux(port).handle(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

/// Metadata carrying the given credential and Basic auth.
pub fn auth_headers(credential: Option<&str>, password: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(credential) = credential {
        headers.insert("macaroon", HeaderValue::from_str(credential).unwrap());
    }
    if let Some(password) = password {
        headers.insert("authorization", basic(password));
    }
    headers
}

/// `Authorization` value with `password` as both username and password.
pub fn basic(password: &str) -> HeaderValue {
    HeaderValue::from_str(&BasicAuth::new(password, password).header_value()).unwrap()
}

/// Hex credential that is not a macaroon.
pub fn dummy_credential() -> String {
    hex::encode(b"dummy")
}

/// Collected body data and trailers of a response.
pub async fn collect(response: Response<GatewayBody>) -> (Bytes, Option<HeaderMap>) {
    let collected = response.into_body().collect().await.unwrap();
    let trailers = collected.trailers().cloned();
    (collected.to_bytes(), trailers)
}
