//! `litrpc.Sessions` served in-process.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use prost::Message;
use tracing::info;

use super::store::{SessionId, SessionStore};
use crate::backend::Backend;
use crate::bakery::{BakeRequest, SuperMacaroonBaker};
use crate::call::{GatewayCall, GatewayReply};
use crate::endpoints::BackendName;
use crate::error::GatewayError;
use crate::macaroon::time_before_caveat;
use crate::proto::litrpc::{
    self, AddSessionRequest, AddSessionResponse, ListSessionsResponse, RevokeSessionRequest,
    RevokeSessionResponse, SessionType,
};

/// The sessions backend.
pub struct SessionService {
    store: Arc<SessionStore>,
    baker: Arc<SuperMacaroonBaker>,
}

impl SessionService {
    /// Service over `store`, baking session macaroons with `baker`.
    pub fn new(store: Arc<SessionStore>, baker: Arc<SuperMacaroonBaker>) -> Self {
        Self { store, baker }
    }

    /// Create a session and bake its macaroon.
    pub async fn add_session(
        &self,
        request: AddSessionRequest,
        now: DateTime<Utc>,
    ) -> Result<AddSessionResponse, GatewayError> {
        let session_type = SessionType::try_from(request.session_type).map_err(|_| {
            GatewayError::InvalidRequest {
                reason: format!("unknown session type {}", request.session_type),
            }
        })?;
        let expiry = i64::try_from(request.expiry_timestamp_seconds)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .filter(|expiry| *expiry > now)
            .ok_or_else(|| GatewayError::InvalidRequest {
                reason: "expiry must be in the future".to_string(),
            })?;

        let record = self.store.create(request.label, session_type, expiry, now);
        let bake = BakeRequest::new(record.id.root_key_id())
            .read_only(session_type == SessionType::TypeMacaroonReadonly)
            .with_caveat(time_before_caveat(expiry));

        let baked = match self.baker.bake(bake).await {
            Ok(baked) => baked,
            Err(err) => {
                self.store.discard(record.id);
                return Err(err);
            }
        };

        info!(session = %record.id, label = %record.label, "Session created");
        Ok(AddSessionResponse {
            session: Some(record.to_proto(now)),
            macaroon: baked.to_hex(),
        })
    }

    /// Every session.
    pub fn list_sessions(&self, now: DateTime<Utc>) -> ListSessionsResponse {
        ListSessionsResponse {
            sessions: self
                .store
                .list()
                .iter()
                .map(|record| record.to_proto(now))
                .collect(),
        }
    }

    /// Revoke a session; its macaroon stops verifying immediately.
    pub fn revoke_session(
        &self,
        request: RevokeSessionRequest,
        now: DateTime<Utc>,
    ) -> Result<RevokeSessionResponse, GatewayError> {
        let id = SessionId::from_slice(&request.id)?;
        self.store.revoke(id, now)?;
        info!(session = %id, "Session revoked");
        Ok(RevokeSessionResponse {})
    }
}

#[async_trait]
impl Backend for SessionService {
    fn name(&self) -> BackendName {
        BackendName::Lit
    }

    async fn call(&self, call: &GatewayCall) -> Result<GatewayReply, GatewayError> {
        let now = Utc::now();
        let message = call.message.as_ref();
        let reply = match call.full_method.as_str() {
            litrpc::ADD_SESSION => self
                .add_session(AddSessionRequest::decode(message)?, now)
                .await?
                .encode_to_vec(),
            litrpc::LIST_SESSIONS => self.list_sessions(now).encode_to_vec(),
            litrpc::REVOKE_SESSION => self
                .revoke_session(RevokeSessionRequest::decode(message)?, now)?
                .encode_to_vec(),
            other => {
                return Err(GatewayError::UnknownMethod {
                    method: other.to_string(),
                })
            }
        };
        Ok(GatewayReply::new(Bytes::from(reply)))
    }
}
