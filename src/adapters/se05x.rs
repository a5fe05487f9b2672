//! NXP SE050 / SE051 family
//!
//! Keys and binary files share one secure-object namespace. Slot `n` maps to
//! object id `SE05X_OBJECT_ID_BASE + n` for both kinds, so a slot holds
//! either a key or data, never both.

use std::collections::HashMap;

use p256::ecdsa::SigningKey;
use tracing::{debug, info};

use super::soft_p256;
use crate::error::{DeviceError, KeySlotError, SeResult, StorageError};
use crate::model::{CertSlot, ConfigurationTable, Digest, KeySlot, PublicKey, Signature};
use crate::ports::{
    Configurator, DeviceIdentity, Hasher, KeyManager, RandomSource, Session, Signer, SlotStorage,
};

pub const SE05X_OBJECT_ID_BASE: u32 = 0x0010_0000;
pub const SE05X_BINARY_OBJECT_CAPACITY: usize = 1024;
pub const SE05X_UNIQUE_ID_LENGTH: usize = 18;

#[derive(Debug)]
enum SecureObject {
    EcKeyPair(SigningKey),
    Binary(Vec<u8>),
}

/// SE05X secure element
#[derive(Debug)]
pub struct Se05x {
    present: bool,
    session: bool,
    unique_id: [u8; SE05X_UNIQUE_ID_LENGTH],
    objects: HashMap<u32, SecureObject>,
    configuration: Option<ConfigurationTable>,
    locked: bool,
}

impl Default for Se05x {
    fn default() -> Self {
        Self::new()
    }
}

impl Se05x {
    pub fn new() -> Self {
        let mut unique_id = [0u8; SE05X_UNIQUE_ID_LENGTH];
        soft_p256::fill_random(&mut unique_id);
        // NXP IC type prefix
        unique_id[0] = 0x04;
        unique_id[1] = 0x00;
        Self::with_unique_id(unique_id)
    }

    pub fn with_unique_id(unique_id: [u8; SE05X_UNIQUE_ID_LENGTH]) -> Self {
        Self {
            present: true,
            session: false,
            unique_id,
            objects: HashMap::new(),
            configuration: None,
            locked: false,
        }
    }

    /// Chip that never answers the applet select
    pub fn disconnected() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    pub fn object_id(slot: u16) -> u32 {
        SE05X_OBJECT_ID_BASE + u32::from(slot)
    }

    /// Configuration table accepted before the lock
    pub fn configuration(&self) -> Option<&ConfigurationTable> {
        self.configuration.as_ref()
    }

    fn ensure_session(&self) -> SeResult<()> {
        if !self.session {
            return Err(DeviceError::SessionNotStarted.into());
        }
        Ok(())
    }

    fn key(&self, slot: KeySlot) -> SeResult<&SigningKey> {
        self.ensure_session()?;
        match self.objects.get(&Self::object_id(slot.index())) {
            Some(SecureObject::EcKeyPair(key)) => Ok(key),
            _ => Err(KeySlotError::Empty { slot: slot.index() }.into()),
        }
    }
}

impl Session for Se05x {
    fn begin(&mut self) -> SeResult<()> {
        if !self.present {
            return Err(DeviceError::Unreachable {
                reason: "SE05X applet select failed".to_string(),
            }
            .into());
        }
        if !self.session {
            debug!("SE05X session opened");
        }
        self.session = true;
        Ok(())
    }

    fn end(&mut self) -> SeResult<()> {
        if self.session {
            debug!("SE05X session closed");
        }
        self.session = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.session
    }
}

impl DeviceIdentity for Se05x {
    fn serial_number(&mut self) -> SeResult<Vec<u8>> {
        self.ensure_session()?;
        Ok(self.unique_id.to_vec())
    }
}

impl RandomSource for Se05x {
    fn random_bytes(&mut self, buffer: &mut [u8]) -> SeResult<()> {
        self.ensure_session()?;
        soft_p256::fill_random(buffer);
        Ok(())
    }
}

impl KeyManager for Se05x {
    fn generate_private_key(&mut self, slot: KeySlot) -> SeResult<PublicKey> {
        self.ensure_session()?;
        let id = Self::object_id(slot.index());
        if self.objects.contains_key(&id) {
            return Err(KeySlotError::AlreadyProvisioned { slot: slot.index() }.into());
        }

        let key = soft_p256::mint_signing_key()?;
        let public_key = soft_p256::public_key_of(&key);
        self.objects.insert(id, SecureObject::EcKeyPair(key));
        info!("SE05X created EC key pair object {:#010x}", id);
        Ok(public_key)
    }

    fn generate_public_key(&mut self, slot: KeySlot) -> SeResult<PublicKey> {
        Ok(soft_p256::public_key_of(self.key(slot)?))
    }
}

impl Signer for Se05x {
    fn ec_sign(&mut self, slot: KeySlot, digest: &Digest) -> SeResult<Signature> {
        let key = self.key(slot)?;
        debug!("SE05X ECDSA sign with object {:#010x}", Self::object_id(slot.index()));
        soft_p256::sign_digest(key, digest)
    }

    fn ecdsa_verify(
        &mut self,
        digest: &Digest,
        signature: &Signature,
        public_key: &PublicKey,
    ) -> SeResult<bool> {
        self.ensure_session()?;
        soft_p256::verify_digest(digest, signature, public_key)
    }
}

impl Hasher for Se05x {
    fn sha256(&mut self, data: &[u8]) -> SeResult<Digest> {
        self.ensure_session()?;
        Ok(soft_p256::sha256(data))
    }
}

impl SlotStorage for Se05x {
    fn slot_capacity(&self, _slot: CertSlot) -> SeResult<usize> {
        Ok(SE05X_BINARY_OBJECT_CAPACITY)
    }

    fn read_slot(&mut self, slot: CertSlot, buffer: &mut [u8]) -> SeResult<()> {
        self.ensure_session()?;
        if buffer.len() > SE05X_BINARY_OBJECT_CAPACITY {
            return Err(StorageError::CapacityExceeded {
                slot: slot.index(),
                length: buffer.len(),
                capacity: SE05X_BINARY_OBJECT_CAPACITY,
            }
            .into());
        }

        // Missing objects read back as zeros, past the end of a file too
        buffer.fill(0);
        match self.objects.get(&Self::object_id(slot.index())) {
            Some(SecureObject::Binary(stored)) => {
                let n = buffer.len().min(stored.len());
                buffer[..n].copy_from_slice(&stored[..n]);
                Ok(())
            }
            Some(SecureObject::EcKeyPair(_)) => Err(DeviceError::CommandFailed {
                command: "ReadObject".to_string(),
                reason: format!("object {:#010x} is a key", Self::object_id(slot.index())),
            }
            .into()),
            None => Ok(()),
        }
    }

    fn write_slot(&mut self, slot: CertSlot, data: &[u8]) -> SeResult<()> {
        self.ensure_session()?;
        if data.len() > SE05X_BINARY_OBJECT_CAPACITY {
            return Err(StorageError::CapacityExceeded {
                slot: slot.index(),
                length: data.len(),
                capacity: SE05X_BINARY_OBJECT_CAPACITY,
            }
            .into());
        }

        let id = Self::object_id(slot.index());
        if let Some(SecureObject::EcKeyPair(_)) = self.objects.get(&id) {
            return Err(DeviceError::CommandFailed {
                command: "WriteBinary".to_string(),
                reason: format!("object {:#010x} is a key", id),
            }
            .into());
        }

        // A binary file cannot be resized: delete then recreate
        self.objects.insert(id, SecureObject::Binary(data.to_vec()));
        debug!("SE05X wrote {} bytes to binary object {:#010x}", data.len(), id);
        Ok(())
    }
}

impl Configurator for Se05x {
    fn locked(&mut self) -> SeResult<bool> {
        self.ensure_session()?;
        Ok(self.locked)
    }

    fn lock(&mut self) -> SeResult<()> {
        self.ensure_session()?;
        if self.locked {
            return Err(KeySlotError::DeviceLocked.into());
        }
        self.locked = true;
        info!("SE05X configuration locked");
        Ok(())
    }

    fn write_configuration(&mut self, config: &ConfigurationTable) -> SeResult<()> {
        self.ensure_session()?;
        if self.locked {
            return Err(KeySlotError::DeviceLocked.into());
        }
        if config.len() > SE05X_BINARY_OBJECT_CAPACITY {
            return Err(StorageError::ConfigurationTooLarge {
                length: config.len(),
                capacity: SE05X_BINARY_OBJECT_CAPACITY,
            }
            .into());
        }
        self.configuration = Some(config.clone());
        debug!("SE05X configuration stored ({} bytes)", config.len());
        Ok(())
    }

    /// SE05X ships with its applet configured; nothing to write
    fn default_configuration(&self) -> ConfigurationTable {
        ConfigurationTable::empty()
    }
}
