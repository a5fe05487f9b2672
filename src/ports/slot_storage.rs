//! SlotStorage trait - raw persistent byte storage

use crate::error::SeResult;
use crate::model::CertSlot;

/// Capability to read and write raw bytes in data slots
pub trait SlotStorage {
    /// Number of bytes `slot` can hold
    fn slot_capacity(&self, slot: CertSlot) -> SeResult<usize>;

    /// Fill `buffer` from the start of `slot`
    ///
    /// # Errors
    ///
    /// Returns `StorageError::CapacityExceeded` if `buffer` is larger than
    /// the slot.
    fn read_slot(&mut self, slot: CertSlot, buffer: &mut [u8]) -> SeResult<()>;

    /// Replace the contents of `slot` with `data`
    ///
    /// # Errors
    ///
    /// Returns `StorageError::CapacityExceeded` if `data` does not fit.
    /// The slot is left untouched in that case.
    fn write_slot(&mut self, slot: CertSlot, data: &[u8]) -> SeResult<()>;
}
