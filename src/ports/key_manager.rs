//! KeyManager trait - capability to mint and derive P-256 keys

use crate::error::SeResult;
use crate::model::{KeySlot, PublicKey};

/// Capability to manage private keys held inside the secure element
///
/// Only slot indices go in and only public keys come out.
pub trait KeyManager {
    /// Generate a new P-256 key pair in `slot`
    ///
    /// # Arguments
    ///
    /// * `slot` - The key slot to provision
    ///
    /// # Returns
    ///
    /// The public key of the new key pair
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// - No session is open
    /// - The slot is already provisioned or locked (`KeySlotError`)
    /// - The slot cannot hold a private key
    ///
    /// Provisioning is irreversible; callers must not retry blindly.
    fn generate_private_key(&mut self, slot: KeySlot) -> SeResult<PublicKey>;

    /// Derive the public key of the key already stored in `slot`
    ///
    /// # Errors
    ///
    /// Returns `KeySlotError::Empty` if the slot holds no key.
    fn generate_public_key(&mut self, slot: KeySlot) -> SeResult<PublicKey>;
}
