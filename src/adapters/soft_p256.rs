//! P-256 primitives shared by the in-process chip models
//!
//! Signing keys created here are handed straight to the owning adapter and
//! never returned to callers.

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature as P256Signature, SigningKey, VerifyingKey};
use rand::{rng, RngCore};
use sha2::{Digest as _, Sha256};

use crate::error::{CryptoError, SeResult};
use crate::model::{Digest, PublicKey, Signature};

/// Draws outside the scalar field are discarded; this bounds the retries
const MAX_KEY_ATTEMPTS: usize = 8;

pub(crate) fn mint_signing_key() -> SeResult<SigningKey> {
    for _ in 0..MAX_KEY_ATTEMPTS {
        let mut secret = [0u8; 32];
        rng().fill_bytes(&mut secret);
        if let Ok(key) = SigningKey::from_slice(&secret) {
            return Ok(key);
        }
    }
    Err(CryptoError::KeyGenerationFailed {
        reason: "no valid P-256 scalar drawn".to_string(),
    }
    .into())
}

pub(crate) fn public_key_of(key: &SigningKey) -> PublicKey {
    PublicKey::from_verifying_key(key.verifying_key())
}

pub(crate) fn sign_digest(key: &SigningKey, digest: &Digest) -> SeResult<Signature> {
    let signature: P256Signature =
        key.sign_prehash(digest.as_bytes())
            .map_err(|e| CryptoError::SignatureFailed {
                reason: e.to_string(),
            })?;
    Ok(Signature::from_p256(&signature))
}

pub(crate) fn verify_digest(
    digest: &Digest,
    signature: &Signature,
    public_key: &PublicKey,
) -> SeResult<bool> {
    let verifying_key: VerifyingKey =
        public_key
            .to_verifying_key()
            .map_err(|e| CryptoError::InvalidPublicKey {
                reason: e.to_string(),
            })?;
    let Ok(signature) = signature.to_p256() else {
        return Ok(false);
    };
    Ok(verifying_key
        .verify_prehash(digest.as_bytes(), &signature)
        .is_ok())
}

pub(crate) fn sha256(data: &[u8]) -> Digest {
    Digest::new(Sha256::digest(data).into())
}

pub(crate) fn fill_random(buffer: &mut [u8]) {
    rng().fill_bytes(buffer);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_keys_differ() {
        let first = mint_signing_key().unwrap();
        let second = mint_signing_key().unwrap();
        assert_ne!(public_key_of(&first), public_key_of(&second));
    }

    #[test]
    fn test_sign_then_verify() {
        let key = mint_signing_key().unwrap();
        let digest = sha256(b"payload");
        let signature = sign_digest(&key, &digest).unwrap();

        assert!(verify_digest(&digest, &signature, &public_key_of(&key)).unwrap());
        assert!(!verify_digest(&sha256(b"other"), &signature, &public_key_of(&key)).unwrap());
    }
}
