//! Macaroon credentials
//!
//! Bearer tokens made of an identifier, a chain of caveats and an HMAC-SHA256
//! signature rooted in a secret root key. The gateway decodes and inspects
//! tokens, verifies them when it holds the root key, and mints them only on
//! behalf of an in-process signing authority.

mod caveat;
mod codec;
mod identifier;

pub use caveat::{time_before_caveat, CaveatChecker, CaveatCondition};
pub use codec::MacaroonError;
pub use identifier::{MacaroonId, MACAROON_ID_VERSION};

use ring::hmac;
use subtle::ConstantTimeEq;

use crate::rootkey::RootKeyId;

/// Length of a macaroon signature in bytes.
pub const SIGNATURE_LEN: usize = 32;

const KEY_GENERATOR: &[u8] = b"macaroons-key-generator";

/// A single caveat in a macaroon's chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caveat {
    /// Caveat identifier; the predicate text for first-party caveats
    pub id: Vec<u8>,
    /// Verification ID, present only on third-party caveats
    pub verification_id: Option<Vec<u8>>,
    /// Location hint, only meaningful for third-party caveats
    pub location: Option<String>,
}

impl Caveat {
    /// A first-party caveat carrying `predicate`.
    pub fn first_party(predicate: impl Into<Vec<u8>>) -> Self {
        Self {
            id: predicate.into(),
            verification_id: None,
            location: None,
        }
    }

    /// Whether the caveat is checked by the verifier itself.
    pub fn is_first_party(&self) -> bool {
        self.verification_id.is_none()
    }

    /// The predicate text, when the identifier is UTF-8.
    pub fn predicate(&self) -> Option<&str> {
        std::str::from_utf8(&self.id).ok()
    }
}

/// A decoded macaroon.
#[derive(Clone, PartialEq, Eq)]
pub struct Macaroon {
    location: Option<String>,
    identifier: Vec<u8>,
    caveats: Vec<Caveat>,
    signature: [u8; SIGNATURE_LEN],
}

impl Macaroon {
    /// Mint a fresh macaroon signed with `root_key`.
    pub fn new(root_key: &[u8], identifier: impl Into<Vec<u8>>, location: &str) -> Self {
        let identifier = identifier.into();
        let signature = keyed_hash(&derive_key(root_key), &identifier);
        Self {
            location: (!location.is_empty()).then(|| location.to_string()),
            identifier,
            caveats: Vec::new(),
            signature,
        }
    }

    pub(crate) fn from_parts(
        location: Option<String>,
        identifier: Vec<u8>,
        caveats: Vec<Caveat>,
        signature: [u8; SIGNATURE_LEN],
    ) -> Self {
        Self {
            location,
            identifier,
            caveats,
            signature,
        }
    }

    /// Append a first-party caveat and extend the signature chain.
    ///
    /// Caveats only ever narrow what a token grants; no root key is needed.
    pub fn add_first_party_caveat(&mut self, predicate: impl Into<Vec<u8>>) {
        let caveat = Caveat::first_party(predicate);
        self.signature = keyed_hash(&self.signature, &caveat.id);
        self.caveats.push(caveat);
    }

    /// Recompute the signature chain from `root_key` and compare it with the
    /// token's signature in constant time.
    pub fn verify_signature(&self, root_key: &[u8]) -> Result<(), MacaroonError> {
        let mut signature = keyed_hash(&derive_key(root_key), &self.identifier);
        for caveat in &self.caveats {
            signature = match &caveat.verification_id {
                None => keyed_hash(&signature, &caveat.id),
                Some(vid) => keyed_hash_pair(&signature, vid, &caveat.id),
            };
        }

        if bool::from(signature.ct_eq(&self.signature)) {
            Ok(())
        } else {
            Err(MacaroonError::SignatureMismatch)
        }
    }

    /// Location hint recorded by the minting service.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Raw identifier bytes.
    pub fn identifier(&self) -> &[u8] {
        &self.identifier
    }

    /// Decoded identifier. Never fails; see [`MacaroonId::decode`].
    pub fn id(&self) -> MacaroonId {
        MacaroonId::decode(&self.identifier)
    }

    /// Root key ID named by the identifier, if it is a numeric storage ID.
    pub fn root_key_id(&self) -> Option<RootKeyId> {
        self.id().root_key_id()
    }

    /// Caveat chain in signing order.
    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    /// Current signature.
    pub fn signature(&self) -> &[u8; SIGNATURE_LEN] {
        &self.signature
    }

    /// Decode from the hex text used in request metadata.
    pub fn from_hex(encoded: &str) -> Result<Self, MacaroonError> {
        let bytes = hex::decode(encoded.trim()).map_err(|e| MacaroonError::Hex(e.to_string()))?;
        Self::from_binary(&bytes)
    }

    /// Hex text of the V2 binary encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_binary())
    }
}

impl std::fmt::Debug for Macaroon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Macaroon")
            .field("location", &self.location)
            .field("id", &self.id())
            .field("caveats", &self.caveats.len())
            .field("signature", &"[REDACTED]")
            .finish()
    }
}

fn derive_key(root_key: &[u8]) -> [u8; SIGNATURE_LEN] {
    keyed_hash(KEY_GENERATOR, root_key)
}

fn keyed_hash(key: &[u8], data: &[u8]) -> [u8; SIGNATURE_LEN] {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    let tag = hmac::sign(&key, data);
    let mut out = [0u8; SIGNATURE_LEN];
    out.copy_from_slice(tag.as_ref());
    out
}

fn keyed_hash_pair(key: &[u8], first: &[u8], second: &[u8]) -> [u8; SIGNATURE_LEN] {
    let mut joined = Vec::with_capacity(SIGNATURE_LEN * 2);
    joined.extend_from_slice(&keyed_hash(key, first));
    joined.extend_from_slice(&keyed_hash(key, second));
    keyed_hash(key, &joined)
}
