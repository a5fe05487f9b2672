//! Certificate storage use cases

use tracing::{debug, info, warn};

use crate::error::{EncodingError, SeResult, StorageError};
use crate::facade::SecureElement;
use crate::model::CertSlot;
use crate::ports::{CertificateModel, SecureElementBackend};

/// Persist a signed certificate or CSR into `slot`
///
/// The length is checked against the slot before anything is written, so a
/// certificate that does not fit leaves the previous contents readable.
///
/// # Errors
///
/// Returns errors if:
/// - `model` is not signed (`EncodingError::InvalidState`)
/// - The encoding is larger than the slot (`StorageError::CapacityExceeded`)
/// - The write itself fails; the slot contents are then undefined
pub fn write_cert<B, M>(se: &mut SecureElement<B>, model: &M, slot: CertSlot) -> SeResult<()>
where
    B: SecureElementBackend,
    M: CertificateModel,
{
    if !model.is_signed() {
        return Err(EncodingError::InvalidState {
            expected: "signed certificate or CSR".to_string(),
        }
        .into());
    }

    let capacity = se.slot_capacity(slot)?;
    let length = model.length();
    if length > capacity {
        warn!("{} byte certificate does not fit {} ({} bytes)", length, slot, capacity);
        return Err(StorageError::CapacityExceeded {
            slot: slot.index(),
            length,
            capacity,
        }
        .into());
    }

    se.write_slot(slot, model.bytes())?;
    info!("Stored {} byte certificate in {}", length, slot);
    Ok(())
}

/// Reconstruct `model` from the bytes stored in `slot`
///
/// # Errors
///
/// Returns `EncodingError` if the slot is empty or does not hold a
/// certificate or CSR.
pub fn read_cert<B, M>(se: &mut SecureElement<B>, slot: CertSlot, model: &mut M) -> SeResult<()>
where
    B: SecureElementBackend,
    M: CertificateModel,
{
    let capacity = se.slot_capacity(slot)?;
    let mut buffer = vec![0u8; capacity];
    se.read_slot(slot, &mut buffer)?;
    debug!("Read {} bytes from {}", capacity, slot);

    model.load(&buffer)?;
    info!("Loaded {} byte certificate from {}", model.length(), slot);
    Ok(())
}
