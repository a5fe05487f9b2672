//! Secure element facade
//!
//! [`SecureElement`] owns exactly one injected backend and exposes the same
//! capability surface whatever the chip family. On top of the backend it
//! tracks the two irreversible transitions (key minted, device locked) so an
//! illegal sequence is refused before it reaches the hardware.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::{KeySlotError, SeResult};
use crate::model::{CertSlot, ConfigurationTable, Digest, KeySlot, PublicKey, Signature};
use crate::ports::{CertificateModel, SecureElementBackend};
use crate::use_cases;

/// Proof that a key slot holds a private key
///
/// Only [`SecureElement::generate_private_key`] and
/// [`SecureElement::generate_public_key`] produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedKey {
    slot: KeySlot,
    public_key: PublicKey,
}

impl ProvisionedKey {
    pub fn slot(&self) -> KeySlot {
        self.slot
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

/// Uniform front end over one secure element backend
///
/// Not `Sync`-shared: callers serialise access by holding `&mut`.
#[derive(Debug)]
pub struct SecureElement<B> {
    backend: B,
    minted: HashSet<KeySlot>,
    lock_observed: bool,
}

impl<B: SecureElementBackend> SecureElement<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            minted: HashSet::new(),
            lock_observed: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(test)]
    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_inner(self) -> B {
        self.backend
    }

    pub fn begin(&mut self) -> SeResult<()> {
        self.backend.begin()
    }

    pub fn end(&mut self) -> SeResult<()> {
        self.backend.end()
    }

    /// Device identifier as uppercase hex, suitable as a subject common name
    pub fn serial_number(&mut self) -> SeResult<String> {
        Ok(hex::encode_upper(self.backend.serial_number()?))
    }

    pub fn random_bytes(&mut self, buffer: &mut [u8]) -> SeResult<()> {
        self.backend.random_bytes(buffer)
    }

    /// Uniform draw from `[min, max)`; returns `min` when the range is empty
    pub fn random_range(&mut self, min: i64, max: i64) -> SeResult<i64> {
        if min >= max {
            return Ok(min);
        }
        let span = max.abs_diff(min);
        // Reject the tail that would bias the modulo
        let zone = u64::MAX - (u64::MAX % span);
        loop {
            let mut bytes = [0u8; 8];
            self.backend.random_bytes(&mut bytes)?;
            let draw = u64::from_le_bytes(bytes);
            if draw < zone {
                return Ok(min.wrapping_add_unsigned(draw % span));
            }
        }
    }

    pub fn random(&mut self, max: i64) -> SeResult<i64> {
        self.random_range(0, max)
    }

    /// Mint a new key pair in `slot`. Irreversible.
    ///
    /// # Errors
    ///
    /// Returns `KeySlotError::AlreadyProvisioned` without touching the
    /// hardware if this facade already minted a key in `slot`; otherwise
    /// whatever the backend reports.
    pub fn generate_private_key(&mut self, slot: KeySlot) -> SeResult<ProvisionedKey> {
        if self.minted.contains(&slot) {
            warn!("Refusing to mint a second key in {}", slot);
            return Err(KeySlotError::AlreadyProvisioned { slot: slot.index() }.into());
        }
        let public_key = self.backend.generate_private_key(slot)?;
        self.minted.insert(slot);
        info!("Minted P-256 key in {}", slot);
        Ok(ProvisionedKey { slot, public_key })
    }

    /// Recover the public key of the key already held in `slot`
    pub fn generate_public_key(&mut self, slot: KeySlot) -> SeResult<ProvisionedKey> {
        let public_key = self.backend.generate_public_key(slot)?;
        debug!("Derived public key from {}", slot);
        Ok(ProvisionedKey { slot, public_key })
    }

    pub fn ecdsa_verify(
        &mut self,
        digest: &Digest,
        signature: &Signature,
        public_key: &PublicKey,
    ) -> SeResult<bool> {
        self.backend.ecdsa_verify(digest, signature, public_key)
    }

    pub fn ec_sign(&mut self, key: &ProvisionedKey, digest: &Digest) -> SeResult<Signature> {
        debug!("Signing digest with {}", key.slot);
        self.backend.ec_sign(key.slot, digest)
    }

    pub fn sha256(&mut self, data: &[u8]) -> SeResult<Digest> {
        self.backend.sha256(data)
    }

    pub fn slot_capacity(&self, slot: CertSlot) -> SeResult<usize> {
        self.backend.slot_capacity(slot)
    }

    pub fn read_slot(&mut self, slot: CertSlot, buffer: &mut [u8]) -> SeResult<()> {
        self.backend.read_slot(slot, buffer)
    }

    pub fn write_slot(&mut self, slot: CertSlot, data: &[u8]) -> SeResult<()> {
        self.backend.write_slot(slot, data)
    }

    pub fn locked(&mut self) -> SeResult<bool> {
        let locked = self.backend.locked()?;
        self.lock_observed |= locked;
        Ok(locked)
    }

    /// Irreversibly lock the device configuration
    pub fn lock(&mut self) -> SeResult<()> {
        if self.lock_observed {
            warn!("Device already locked");
            return Err(KeySlotError::DeviceLocked.into());
        }
        self.backend.lock()?;
        self.lock_observed = true;
        info!("Device configuration locked");
        Ok(())
    }

    pub fn write_configuration(&mut self, config: &ConfigurationTable) -> SeResult<()> {
        if self.lock_observed {
            warn!("Refusing configuration write on a locked device");
            return Err(KeySlotError::DeviceLocked.into());
        }
        self.backend.write_configuration(config)?;
        debug!("Wrote {} byte configuration table", config.len());
        Ok(())
    }

    pub fn default_configuration(&self) -> ConfigurationTable {
        self.backend.default_configuration()
    }

    /// Borrow the device in its unlocked state
    ///
    /// # Errors
    ///
    /// Returns `KeySlotError::DeviceLocked` if the device reports locked.
    pub fn unlocked(&mut self) -> SeResult<UnlockedDevice<'_, B>> {
        if self.locked()? {
            warn!("Device is locked; configuration is no longer writable");
            return Err(KeySlotError::DeviceLocked.into());
        }
        Ok(UnlockedDevice { device: self })
    }

    pub fn build_csr<M: CertificateModel>(
        &mut self,
        model: &mut M,
        slot: KeySlot,
        mint_new_key: bool,
    ) -> SeResult<ProvisionedKey> {
        use_cases::build_csr(self, model, slot, mint_new_key)
    }

    pub fn build_cert<M: CertificateModel>(
        &mut self,
        model: &mut M,
        slot: KeySlot,
    ) -> SeResult<ProvisionedKey> {
        use_cases::build_cert(self, model, slot)
    }

    pub fn write_cert<M: CertificateModel>(&mut self, model: &M, slot: CertSlot) -> SeResult<()> {
        use_cases::write_cert(self, model, slot)
    }

    pub fn read_cert<M: CertificateModel>(&mut self, slot: CertSlot, model: &mut M) -> SeResult<()> {
        use_cases::read_cert(self, slot, model)
    }
}

/// A device known to be unlocked
///
/// [`lock`](UnlockedDevice::lock) consumes the value, so configuration can
/// no longer be written through it afterwards.
#[derive(Debug)]
pub struct UnlockedDevice<'a, B: SecureElementBackend> {
    device: &'a mut SecureElement<B>,
}

impl<B: SecureElementBackend> UnlockedDevice<'_, B> {
    pub fn write_configuration(&mut self, config: &ConfigurationTable) -> SeResult<()> {
        self.device.write_configuration(config)
    }

    pub fn lock(self) -> SeResult<()> {
        self.device.lock()
    }
}
