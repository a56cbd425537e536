//! In-memory root key store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::RngCore;

use super::{display_storage_id, RootKey, RootKeyError, RootKeyId, RootKeyStore};
use crate::macaroon::{Macaroon, MacaroonId};
use crate::permission::Permission;

const NONCE_LEN: usize = 16;

/// Root keys held in process memory.
///
/// Backs in-process signing authorities: it can both verify macaroons and
/// mint new ones under any of its keys.
#[derive(Debug, Default)]
pub struct MemoryRootKeyStore {
    keys: RwLock<HashMap<Vec<u8>, RootKey>>,
}

impl MemoryRootKeyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `key` under `id`, replacing any previous key.
    pub fn insert(&self, id: RootKeyId, key: RootKey) {
        self.keys.write().insert(id.storage_id(), key);
    }

    /// Key under `id`, generating one on first use.
    pub fn get_or_generate(&self, id: RootKeyId) -> RootKey {
        self.keys
            .write()
            .entry(id.storage_id())
            .or_insert_with(RootKey::generate)
            .clone()
    }

    /// Drop the key under `id`. Tokens signed with it stop verifying.
    pub fn remove(&self, id: RootKeyId) -> bool {
        self.keys.write().remove(&id.storage_id()).is_some()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// Mint a macaroon under `id` granting `permissions`.
    pub fn mint(
        &self,
        id: RootKeyId,
        permissions: impl IntoIterator<Item = Permission>,
        location: &str,
    ) -> Macaroon {
        let key = self.get_or_generate(id);
        let mut nonce = vec![0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let identifier = MacaroonId::new(nonce, id, permissions).encode();
        Macaroon::new(key.as_bytes(), identifier, location)
    }
}

#[async_trait]
impl RootKeyStore for MemoryRootKeyStore {
    async fn get(&self, storage_id: &[u8]) -> Result<RootKey, RootKeyError> {
        self.keys
            .read()
            .get(storage_id)
            .cloned()
            .ok_or_else(|| RootKeyError::NotFound {
                id: display_storage_id(storage_id),
            })
    }
}
