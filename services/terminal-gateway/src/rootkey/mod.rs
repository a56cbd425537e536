//! Root keys and root-key storage
//!
//! Root keys are the secrets macaroons are signed with. They are addressed by
//! a 64-bit ID whose decimal text is the storage ID embedded in a macaroon
//! identifier. IDs whose upper four bytes carry the super macaroon prefix form
//! a reserved namespace owned by the gateway.

mod memory;

pub use memory::MemoryRootKeyStore;

use std::fmt;

use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

/// Upper four bytes of every root key ID in the super macaroon namespace.
pub const SUPER_MACAROON_ROOT_KEY_PREFIX: [u8; 4] = [0xFF, 0xEE, 0xDD, 0xCC];

/// Root key length generated by [`RootKey::generate`].
pub const ROOT_KEY_LEN: usize = 32;

/// Identifier of a root key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RootKeyId(pub u64);

impl RootKeyId {
    /// The default root key every backend bakes its own macaroons with.
    pub const DEFAULT: RootKeyId = RootKeyId(0);

    /// ID in the super macaroon namespace with `suffix` as its lower bytes.
    pub fn new_super(suffix: [u8; 4]) -> Self {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&SUPER_MACAROON_ROOT_KEY_PREFIX);
        bytes[4..].copy_from_slice(&suffix);
        Self(u64::from_be_bytes(bytes))
    }

    /// Whether the ID carries the super macaroon prefix.
    pub fn is_super(self) -> bool {
        self.0.to_be_bytes()[..4] == SUPER_MACAROON_ROOT_KEY_PREFIX
    }

    /// Lower four bytes of a super macaroon ID.
    pub fn super_suffix(self) -> Option<[u8; 4]> {
        if !self.is_super() {
            return None;
        }
        let bytes = self.0.to_be_bytes();
        Some([bytes[4], bytes[5], bytes[6], bytes[7]])
    }

    /// Storage ID as embedded in macaroon identifiers.
    pub fn storage_id(self) -> Vec<u8> {
        self.0.to_string().into_bytes()
    }

    /// Parse a storage ID back into a root key ID.
    pub fn from_storage_id(storage_id: &[u8]) -> Option<Self> {
        std::str::from_utf8(storage_id)
            .ok()?
            .parse()
            .ok()
            .map(Self)
    }
}

impl fmt::Display for RootKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Secret root key material, zeroized on drop.
#[derive(Clone)]
pub struct RootKey(Zeroizing<Vec<u8>>);

impl RootKey {
    /// Wrap existing key material.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Fresh random key.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; ROOT_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    /// Key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RootKey([REDACTED])")
    }
}

/// Root-key lookup errors.
#[derive(Error, Debug)]
pub enum RootKeyError {
    /// The store has no key under this storage ID
    #[error("root key with id {id} doesn't exist")]
    NotFound {
        /// Printable storage ID
        id: String,
    },

    /// The store could not be read
    #[error("root key store {store} unavailable: {reason}")]
    Unavailable {
        /// Store description
        store: String,
        /// Underlying failure
        reason: String,
    },
}

/// Source of root keys for local verification.
#[async_trait]
pub trait RootKeyStore: Send + Sync {
    /// Look up the key stored under `storage_id`.
    async fn get(&self, storage_id: &[u8]) -> Result<RootKey, RootKeyError>;
}

/// Storage IDs are usually decimal text; anything else is shown as hex.
pub fn display_storage_id(storage_id: &[u8]) -> String {
    match std::str::from_utf8(storage_id) {
        Ok(text) if text.chars().all(|c| c.is_ascii_graphic()) && !text.is_empty() => {
            text.to_string()
        }
        _ => hex::encode(storage_id),
    }
}
