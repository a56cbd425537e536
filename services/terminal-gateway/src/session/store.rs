use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::RngCore;
use thiserror::Error;

use crate::auth::RevocationList;
use crate::error::GatewayError;
use crate::proto::litrpc::{self, SessionState, SessionType};
use crate::rootkey::RootKeyId;

/// Session identifier; also the suffix of the session's root key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub [u8; 4]);

impl SessionId {
    /// Parse the wire form.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SessionError> {
        <[u8; 4]>::try_from(bytes)
            .map(Self)
            .map_err(|_| SessionError::InvalidId { len: bytes.len() })
    }

    /// Root key the session's macaroon is baked under.
    pub fn root_key_id(self) -> RootKeyId {
        RootKeyId::new_super(self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Session store errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// No session with this ID
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// Wrong ID length
    #[error("invalid session id: expected 4 bytes, got {len}")]
    InvalidId {
        /// Length received
        len: usize,
    },
}

impl From<SessionError> for GatewayError {
    fn from(err: SessionError) -> Self {
        GatewayError::InvalidRequest {
            reason: err.to_string(),
        }
    }
}

/// One session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Identifier
    pub id: SessionId,
    /// Caller-chosen label
    pub label: String,
    /// Read-only or admin
    pub session_type: SessionType,
    /// Stored state; expiry is applied when reading
    pub state: SessionState,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// The macaroon stops working at this time
    pub expiry: DateTime<Utc>,
    /// Revocation time, if revoked
    pub revoked_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// State as seen at `now`.
    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        match self.state {
            SessionState::StateRevoked => SessionState::StateRevoked,
            _ if self.expiry <= now => SessionState::StateExpired,
            other => other,
        }
    }

    /// Wire form as seen at `now`.
    pub fn to_proto(&self, now: DateTime<Utc>) -> litrpc::Session {
        litrpc::Session {
            id: self.id.0.to_vec(),
            label: self.label.clone(),
            session_state: self.state_at(now) as i32,
            session_type: self.session_type as i32,
            expiry_timestamp_seconds: unix_seconds(self.expiry),
            created_at: unix_seconds(self.created_at),
            macaroon_root_key_id: self.id.root_key_id().0,
            revoked_at: self.revoked_at.map(unix_seconds).unwrap_or_default(),
        }
    }
}

fn unix_seconds(time: DateTime<Utc>) -> u64 {
    u64::try_from(time.timestamp()).unwrap_or_default()
}

/// In-memory session table.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<BTreeMap<SessionId, SessionRecord>>,
}

impl SessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with a fresh, unused ID.
    pub fn create(
        &self,
        label: String,
        session_type: SessionType,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> SessionRecord {
        let mut sessions = self.sessions.write();
        let id = loop {
            let mut bytes = [0u8; 4];
            rand::thread_rng().fill_bytes(&mut bytes);
            let id = SessionId(bytes);
            if !sessions.contains_key(&id) {
                break id;
            }
        };
        let record = SessionRecord {
            id,
            label,
            session_type,
            state: SessionState::StateCreated,
            created_at: now,
            expiry,
            revoked_at: None,
        };
        sessions.insert(id, record.clone());
        record
    }

    /// Drop a session that never became usable.
    pub fn discard(&self, id: SessionId) {
        self.sessions.write().remove(&id);
    }

    /// Session by ID.
    pub fn get(&self, id: SessionId) -> Option<SessionRecord> {
        self.sessions.read().get(&id).cloned()
    }

    /// Every session, ordered by ID.
    pub fn list(&self) -> Vec<SessionRecord> {
        self.sessions.read().values().cloned().collect()
    }

    /// Revoke a session. Revoking twice keeps the first revocation time.
    pub fn revoke(&self, id: SessionId, now: DateTime<Utc>) -> Result<SessionRecord, SessionError> {
        let mut sessions = self.sessions.write();
        let record = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        if record.state != SessionState::StateRevoked {
            record.state = SessionState::StateRevoked;
            record.revoked_at = Some(now);
        }
        Ok(record.clone())
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl RevocationList for SessionStore {
    fn is_revoked(&self, root_key_id: RootKeyId) -> bool {
        root_key_id
            .super_suffix()
            .and_then(|suffix| self.get(SessionId(suffix)))
            .is_some_and(|record| record.state == SessionState::StateRevoked)
    }
}
