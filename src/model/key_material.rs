//! Fixed-length key material crossing the hardware boundary
//!
//! Only public keys, digests and signatures are representable here. Private
//! keys exist solely inside a backend.

use std::fmt;

use p256::ecdsa::{Signature as P256Signature, VerifyingKey};
use thiserror::Error;

/// Length of a raw P-256 public key (X || Y)
pub const PUBLIC_KEY_LENGTH: usize = 64;

/// Length of a SHA-256 digest
pub const DIGEST_LENGTH: usize = 32;

/// Length of a raw P-256 ECDSA signature (r || s)
pub const SIGNATURE_LENGTH: usize = 64;

/// Uncompressed P-256 public key without the SEC1 `0x04` tag
///
/// Construction validates that the point lies on the curve.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LENGTH]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyMaterialError> {
        let raw: [u8; PUBLIC_KEY_LENGTH] =
            bytes
                .try_into()
                .map_err(|_| KeyMaterialError::InvalidLength {
                    kind: "public key",
                    expected: PUBLIC_KEY_LENGTH,
                    actual: bytes.len(),
                })?;
        let key = Self(raw);
        key.to_verifying_key()?;
        Ok(key)
    }

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        let mut raw = [0u8; PUBLIC_KEY_LENGTH];
        // skip the 0x04 uncompressed-point tag
        raw.copy_from_slice(&point.as_bytes()[1..]);
        Self(raw)
    }

    pub fn to_verifying_key(&self) -> Result<VerifyingKey, KeyMaterialError> {
        VerifyingKey::from_sec1_bytes(&self.to_sec1_bytes())
            .map_err(|_| KeyMaterialError::NotOnCurve)
    }

    pub fn to_sec1_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH + 1] {
        let mut sec1 = [0u8; PUBLIC_KEY_LENGTH + 1];
        sec1[0] = 0x04;
        sec1[1..].copy_from_slice(&self.0);
        sec1
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    pub fn len(&self) -> usize {
        PUBLIC_KEY_LENGTH
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl From<&VerifyingKey> for PublicKey {
    fn from(key: &VerifyingKey) -> Self {
        Self::from_verifying_key(key)
    }
}

/// SHA-256 digest of canonical bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_LENGTH]);

impl Digest {
    pub const fn new(bytes: [u8; DIGEST_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyMaterialError> {
        let raw = bytes
            .try_into()
            .map_err(|_| KeyMaterialError::InvalidLength {
                kind: "digest",
                expected: DIGEST_LENGTH,
                actual: bytes.len(),
            })?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(self.0))
    }
}

/// Raw ECDSA P-256 signature (r || s)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyMaterialError> {
        let raw: [u8; SIGNATURE_LENGTH] =
            bytes
                .try_into()
                .map_err(|_| KeyMaterialError::InvalidLength {
                    kind: "signature",
                    expected: SIGNATURE_LENGTH,
                    actual: bytes.len(),
                })?;
        let signature = Self(raw);
        signature.to_p256()?;
        Ok(signature)
    }

    pub fn from_p256(signature: &P256Signature) -> Self {
        let mut raw = [0u8; SIGNATURE_LENGTH];
        raw.copy_from_slice(&signature.to_bytes());
        Self(raw)
    }

    pub fn to_p256(&self) -> Result<P256Signature, KeyMaterialError> {
        P256Signature::from_slice(&self.0).map_err(|_| KeyMaterialError::InvalidSignature)
    }

    /// ASN.1 `Ecdsa-Sig-Value` encoding as embedded in X.509 structures
    pub fn to_der(&self) -> Result<Vec<u8>, KeyMaterialError> {
        Ok(self.to_p256()?.to_der().as_bytes().to_vec())
    }

    pub fn from_der(der: &[u8]) -> Result<Self, KeyMaterialError> {
        let signature =
            P256Signature::from_der(der).map_err(|_| KeyMaterialError::InvalidSignature)?;
        Ok(Self::from_p256(&signature))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterialError {
    #[error("Invalid {kind} length: expected {expected}, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Public key is not a point on P-256")]
    NotOnCurve,

    #[error("Signature is not a valid P-256 ECDSA signature")]
    InvalidSignature,
}
