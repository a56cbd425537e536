//! Macaroon identifiers.
//!
//! Version 3 identifiers are a version byte followed by a protobuf message
//! naming the root key (storage ID) and the operations the token grants.

use std::collections::BTreeMap;

use prost::Message;

use crate::permission::{Permission, PermissionSet};
use crate::proto::macaroonpb::{MacaroonId as IdentifierProto, Op as OpProto};
use crate::rootkey::{display_storage_id, RootKeyId};

/// Leading byte of a protobuf-encoded identifier.
pub const MACAROON_ID_VERSION: u8 = 3;

/// Decoded macaroon identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacaroonId {
    /// Random nonce making each identifier unique
    pub nonce: Vec<u8>,
    /// Root-key storage ID
    pub storage_id: Vec<u8>,
    /// Granted operations
    pub ops: PermissionSet,
}

impl MacaroonId {
    /// Identifier for a token under `root_key_id` granting `ops`.
    pub fn new(
        nonce: impl Into<Vec<u8>>,
        root_key_id: RootKeyId,
        ops: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            nonce: nonce.into(),
            storage_id: root_key_id.storage_id(),
            ops: ops.into_iter().collect(),
        }
    }

    /// Decode identifier bytes.
    ///
    /// Bytes that are not a version 3 identifier are taken as an opaque
    /// storage ID with no operations, so such a token fails later as an
    /// unknown root key rather than as malformed.
    pub fn decode(identifier: &[u8]) -> Self {
        if let Some((&MACAROON_ID_VERSION, rest)) = identifier.split_first() {
            if let Ok(proto) = IdentifierProto::decode(rest) {
                let ops = proto
                    .ops
                    .into_iter()
                    .flat_map(|op| {
                        let entity = op.entity;
                        op.actions
                            .into_iter()
                            .map(move |action| Permission::new(entity.clone(), action))
                    })
                    .collect();
                return Self {
                    nonce: proto.nonce,
                    storage_id: proto.storage_id,
                    ops,
                };
            }
        }

        Self {
            nonce: Vec::new(),
            storage_id: identifier.to_vec(),
            ops: PermissionSet::new(),
        }
    }

    /// Version byte plus protobuf body. Actions are grouped per entity.
    pub fn encode(&self) -> Vec<u8> {
        let mut grouped: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for op in &self.ops {
            grouped
                .entry(op.entity.as_str())
                .or_default()
                .push(op.action.clone());
        }

        let proto = IdentifierProto {
            nonce: self.nonce.clone(),
            storage_id: self.storage_id.clone(),
            ops: grouped
                .into_iter()
                .map(|(entity, actions)| OpProto {
                    entity: entity.to_string(),
                    actions,
                })
                .collect(),
        };

        let mut out = vec![MACAROON_ID_VERSION];
        out.extend(proto.encode_to_vec());
        out
    }

    /// Root key ID, when the storage ID is the decimal form of one.
    pub fn root_key_id(&self) -> Option<RootKeyId> {
        RootKeyId::from_storage_id(&self.storage_id)
    }

    /// Printable storage ID for error messages.
    pub fn storage_id_display(&self) -> String {
        display_storage_id(&self.storage_id)
    }
}
