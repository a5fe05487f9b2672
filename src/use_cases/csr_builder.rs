//! Build CSR use case
//!
//! Provisions (or reuses) a key, assembles the request around its public key
//! and has the secure element sign the SHA-256 digest of the assembly.

use tracing::info;

use crate::error::SeResult;
use crate::facade::{ProvisionedKey, SecureElement};
use crate::model::{KeySlot, Signature};
use crate::ports::{CertificateModel, SecureElementBackend};

/// Produce a signed certificate signing request in `model`
///
/// This function orchestrates the complete CSR workflow:
/// 1. Mint a key in `key_slot`, or derive the public key already there
/// 2. Install the public key into the model
/// 3. Assemble the unsigned request
/// 4. Hash the assembled bytes on the device
/// 5. Sign the digest with the key in `key_slot`
/// 6. Attach the signature to the model
///
/// # Arguments
///
/// * `se` - Secure element with an open session
/// * `model` - Certificate model to fill in
/// * `key_slot` - Slot holding (or to hold) the private key
/// * `mint_new_key` - Generate a fresh key instead of reusing the stored one
///
/// # Returns
///
/// The provisioned key the request was signed with
///
/// # Errors
///
/// Returns the first failing step's error. A key minted in step 1 is not
/// rolled back, and `model` must be discarded.
pub fn build_csr<B, M>(
    se: &mut SecureElement<B>,
    model: &mut M,
    key_slot: KeySlot,
    mint_new_key: bool,
) -> SeResult<ProvisionedKey>
where
    B: SecureElementBackend,
    M: CertificateModel,
{
    let key = if mint_new_key {
        se.generate_private_key(key_slot)?
    } else {
        se.generate_public_key(key_slot)?
    };

    model.set_public_key(key.public_key())?;
    model.build_csr()?;

    let signature = sign_assembled(se, model, &key)?;
    model.sign_csr(&signature)?;

    info!(
        "Built signed CSR ({} bytes) with {}",
        model.length(),
        key.slot()
    );
    Ok(key)
}

/// Hash the model's current bytes and sign the digest with `key`
pub(super) fn sign_assembled<B, M>(
    se: &mut SecureElement<B>,
    model: &M,
    key: &ProvisionedKey,
) -> SeResult<Signature>
where
    B: SecureElementBackend,
    M: CertificateModel,
{
    let digest = se.sha256(model.bytes())?;
    se.ec_sign(key, &digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fake_secure_element::{FailOn, FakeSecureElement};
    use crate::error::ErrorKind;
    use crate::model::{DistinguishedName, Ecp256Certificate};
    use sha2::{Digest as _, Sha256};
    use x509_cert::der::{Decode, Encode};
    use x509_cert::request::CertReq;

    fn opened(backend: FakeSecureElement) -> SecureElement<FakeSecureElement> {
        let mut se = SecureElement::new(backend);
        se.begin().unwrap();
        se
    }

    fn model() -> Ecp256Certificate {
        Ecp256Certificate::new(DistinguishedName::with_common_name("0123ABCDEF010203EE"))
    }

    #[test]
    fn test_build_csr_signs_digest_of_request_info() {
        let mut se = opened(FakeSecureElement::new());
        let mut csr = model();

        let key = build_csr(&mut se, &mut csr, KeySlot::new(0), true).unwrap();

        let request = CertReq::from_der(csr.bytes()).unwrap();
        let info = request.info.to_der().unwrap();
        let expected: [u8; 32] = Sha256::digest(&info).into();
        assert_eq!(se.backend().signed_digests.len(), 1);
        assert_eq!(se.backend().signed_digests[0].as_bytes(), &expected);

        let digest = se.sha256(&info).unwrap();
        let signature = *csr.signature().unwrap();
        assert!(se
            .ecdsa_verify(&digest, &signature, key.public_key())
            .unwrap());
        assert_eq!(csr.public_key(), Some(key.public_key()));
    }

    #[test]
    fn test_build_csr_reuses_existing_key() {
        let mut se = opened(FakeSecureElement::new());
        let minted = se.generate_private_key(KeySlot::new(1)).unwrap();

        let mut csr = model();
        let key = build_csr(&mut se, &mut csr, KeySlot::new(1), false).unwrap();

        assert_eq!(key.public_key(), minted.public_key());
        assert_eq!(se.backend().keys.len(), 1);
        assert!(csr.is_signed());
    }

    #[test]
    fn test_key_generation_failure_leaves_public_key_unset() {
        let mut se = opened(FakeSecureElement::failing_on(FailOn::GeneratePrivateKey));
        let mut csr = model();

        let err = build_csr(&mut se, &mut csr, KeySlot::new(0), true).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::HardwareCommunicationFailure);
        assert!(csr.public_key().is_none());
        assert!(csr.bytes().is_empty());
        assert!(se.backend().signed_digests.is_empty());
    }

    #[test]
    fn test_derive_from_empty_slot_leaves_public_key_unset() {
        let mut se = opened(FakeSecureElement::new());
        let mut csr = model();

        let err = build_csr(&mut se, &mut csr, KeySlot::new(3), false).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::KeySlotStateError);
        assert!(csr.public_key().is_none());
    }

    #[test]
    fn test_minting_twice_fails() {
        let mut se = opened(FakeSecureElement::new());
        build_csr(&mut se, &mut model(), KeySlot::new(0), true).unwrap();

        let err = build_csr(&mut se, &mut model(), KeySlot::new(0), true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeySlotStateError);
    }

    #[test]
    fn test_sign_failure_keeps_minted_key() {
        let mut se = opened(FakeSecureElement::failing_on(FailOn::Sign));
        let mut csr = model();

        assert!(build_csr(&mut se, &mut csr, KeySlot::new(0), true).is_err());

        assert!(!csr.is_signed());
        assert!(se.backend().keys.contains_key(&KeySlot::new(0)));
    }

    #[test]
    fn test_hash_failure_aborts_before_signing() {
        let mut se = opened(FakeSecureElement::failing_on(FailOn::Hash));
        let mut csr = model();

        assert!(build_csr(&mut se, &mut csr, KeySlot::new(0), true).is_err());
        assert!(se.backend().signed_digests.is_empty());
        assert!(csr.signature().is_none());
    }

    #[test]
    fn test_invalid_subject_is_an_encoding_failure() {
        let mut se = opened(FakeSecureElement::new());
        let mut csr = Ecp256Certificate::new(DistinguishedName::default());

        let err = build_csr(&mut se, &mut csr, KeySlot::new(0), true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingFailure);
        // the key was minted before the model rejected the subject
        assert_eq!(se.backend().keys.len(), 1);
    }
}
