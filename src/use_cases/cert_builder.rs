//! Build device certificate use case

use tracing::info;

use super::csr_builder::sign_assembled;
use crate::error::SeResult;
use crate::facade::{ProvisionedKey, SecureElement};
use crate::model::KeySlot;
use crate::ports::{CertificateModel, SecureElementBackend};

/// Produce a signed device certificate in `model`
///
/// Certificates are issued against a key that is already trusted, so this
/// never mints: the public key is always derived from `key_slot`. Identity,
/// serial number and validity must already be set on `model`.
///
/// # Errors
///
/// Returns errors if:
/// - `key_slot` holds no key (`KeySlotError::Empty`)
/// - The model is missing fields or rejects them
/// - Hashing or signing fails on the device
pub fn build_cert<B, M>(
    se: &mut SecureElement<B>,
    model: &mut M,
    key_slot: KeySlot,
) -> SeResult<ProvisionedKey>
where
    B: SecureElementBackend,
    M: CertificateModel,
{
    let key = se.generate_public_key(key_slot)?;

    model.set_public_key(key.public_key())?;
    model.build_cert()?;

    let signature = sign_assembled(se, model, &key)?;
    model.sign_cert(&signature)?;

    info!(
        "Built signed certificate ({} bytes) with {}",
        model.length(),
        key.slot()
    );
    Ok(key)
}
