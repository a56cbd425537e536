//! UI password checks over HTTP Basic auth.
//!
//! The configured secret is both the expected username and password.
//! Comparison runs over SHA-256 digests so the work done does not depend on
//! where the inputs differ or on their length.

use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::GatewayError;

/// A decoded Basic-auth pair.
#[derive(Clone)]
pub struct BasicAuth {
    username: Zeroizing<String>,
    password: Zeroizing<String>,
}

impl BasicAuth {
    /// Pair from plain values.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Zeroizing::new(username.into()),
            password: Zeroizing::new(password.into()),
        }
    }

    /// Parse an `Authorization: Basic <base64(user:pass)>` value.
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, encoded) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = Zeroizing::new(STANDARD.decode(encoded.trim()).ok()?);
        let text = std::str::from_utf8(&decoded).ok()?;
        let (username, password) = text.split_once(':')?;
        Some(Self::new(username, password))
    }

    /// `Authorization` header value for this pair.
    pub fn header_value(&self) -> String {
        let joined = Zeroizing::new(format!("{}:{}", *self.username, *self.password));
        format!("Basic {}", STANDARD.encode(joined.as_bytes()))
    }
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BasicAuth([REDACTED])")
    }
}

/// Validates Basic auth against the configured UI password.
#[derive(Clone)]
pub struct PasswordValidator {
    digest: [u8; 32],
}

impl PasswordValidator {
    /// Validator for `secret`.
    pub fn new(secret: &str) -> Self {
        Self {
            digest: digest(secret),
        }
    }

    /// Succeeds iff both username and password equal the secret.
    pub fn validate(&self, auth: &BasicAuth) -> Result<(), GatewayError> {
        let username_ok = digest(&auth.username).ct_eq(&self.digest);
        let password_ok = digest(&auth.password).ct_eq(&self.digest);
        if bool::from(username_ok & password_ok) {
            Ok(())
        } else {
            Err(GatewayError::InvalidPassword)
        }
    }
}

impl std::fmt::Debug for PasswordValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordValidator([REDACTED])")
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}
