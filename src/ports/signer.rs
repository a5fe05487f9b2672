//! Signer and Hasher traits

use crate::error::SeResult;
use crate::model::{Digest, KeySlot, PublicKey, Signature};

/// Capability to sign and verify digests
pub trait Signer {
    /// Sign a digest with the private key in `slot`
    ///
    /// # Arguments
    ///
    /// * `slot` - The slot containing the key to use
    /// * `digest` - SHA-256 digest of the message
    ///
    /// # Returns
    ///
    /// The raw r‖s signature
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// - No session is open
    /// - The slot holds no key
    /// - The signing operation fails
    fn ec_sign(&mut self, slot: KeySlot, digest: &Digest) -> SeResult<Signature>;

    /// Verify a detached signature over `digest`
    ///
    /// A signature that does not match yields `Ok(false)`; errors are
    /// reserved for session and transport failures.
    fn ecdsa_verify(
        &mut self,
        digest: &Digest,
        signature: &Signature,
        public_key: &PublicKey,
    ) -> SeResult<bool>;
}

/// Capability to compute SHA-256 digests
pub trait Hasher {
    fn sha256(&mut self, data: &[u8]) -> SeResult<Digest>;
}
