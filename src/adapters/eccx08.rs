//! Microchip ATECC508A / ATECC608 family
//!
//! Behavioural model of the chip's observable contract: sixteen slots whose
//! role is decided by the configuration zone, fixed data-slot sizes, word
//! aligned writes and a one-shot configuration lock.

use std::collections::HashMap;

use p256::ecdsa::SigningKey;
use tracing::{debug, info};

use super::soft_p256;
use crate::error::{DeviceError, KeySlotError, SeResult, StorageError};
use crate::model::{
    CertSlot, ConfigurationTable, Digest, KeySlot, PublicKey, Signature,
    ECCX08_CONFIG_ZONE_LENGTH, ECCX08_KEY_CONFIG_OFFSET,
};
use crate::ports::{
    Configurator, DeviceIdentity, Hasher, KeyManager, RandomSource, Session, Signer, SlotStorage,
};

pub const ECCX08_SLOT_COUNT: u16 = 16;
pub const ECCX08_SERIAL_LENGTH: usize = 9;

/// Leading bytes of the configuration zone (serial number, revision) that
/// cannot be written
const READ_ONLY_CONFIG_BYTES: usize = 16;
const LOCK_VALUE_OFFSET: usize = 86;
const LOCK_CONFIG_OFFSET: usize = 87;
const SLOT_LOCKED_OFFSET: usize = 88;
const UNLOCKED: u8 = 0x55;
const LOCKED: u8 = 0x00;
const WORD: usize = 4;
const P256_KEY_TYPE: u8 = 4;

fn data_slot_capacity(slot: u16) -> Option<usize> {
    match slot {
        0..=7 => Some(36),
        8 => Some(416),
        9..=15 => Some(72),
        _ => None,
    }
}

/// ECCX08 secure element
#[derive(Debug)]
pub struct Eccx08 {
    present: bool,
    session: bool,
    config_zone: [u8; ECCX08_CONFIG_ZONE_LENGTH],
    keys: HashMap<u16, SigningKey>,
    data: HashMap<u16, Vec<u8>>,
}

impl Default for Eccx08 {
    fn default() -> Self {
        Self::new()
    }
}

impl Eccx08 {
    /// Factory-fresh chip carrying the default TLS slot layout, unlocked
    pub fn new() -> Self {
        let mut serial = [0u8; ECCX08_SERIAL_LENGTH];
        soft_p256::fill_random(&mut serial);
        // Microchip fixes SN[0..2] and SN[8]
        serial[0] = 0x01;
        serial[1] = 0x23;
        serial[8] = 0xEE;
        Self::with_serial(serial)
    }

    pub fn with_serial(serial: [u8; ECCX08_SERIAL_LENGTH]) -> Self {
        let mut config_zone = [0u8; ECCX08_CONFIG_ZONE_LENGTH];
        config_zone.copy_from_slice(ConfigurationTable::eccx08_default_tls().as_bytes());
        config_zone[0..4].copy_from_slice(&serial[0..4]);
        config_zone[8..13].copy_from_slice(&serial[4..9]);

        Self {
            present: true,
            session: false,
            config_zone,
            keys: HashMap::new(),
            data: HashMap::new(),
        }
    }

    /// Chip that never answers on the bus
    pub fn disconnected() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    /// Clear the SlotLocked bit of `slot`, refusing further key generation there
    pub fn lock_slot(&mut self, slot: KeySlot) -> SeResult<()> {
        let index = slot.check_range(ECCX08_SLOT_COUNT)?.index();
        let byte = SLOT_LOCKED_OFFSET + usize::from(index / 8);
        self.config_zone[byte] &= !(1 << (index % 8));
        Ok(())
    }

    fn ensure_session(&self) -> SeResult<()> {
        if !self.session {
            return Err(DeviceError::SessionNotStarted.into());
        }
        Ok(())
    }

    fn is_config_locked(&self) -> bool {
        self.config_zone[LOCK_CONFIG_OFFSET] != UNLOCKED
    }

    fn is_slot_locked(&self, index: u16) -> bool {
        let byte = SLOT_LOCKED_OFFSET + usize::from(index / 8);
        self.config_zone[byte] & (1 << (index % 8)) == 0
    }

    /// KeyConfig bit 0 marks a private key, bits 2..=4 the key type
    fn holds_private_key(&self, index: u16) -> bool {
        let key_config = self.config_zone[ECCX08_KEY_CONFIG_OFFSET + usize::from(index) * 2];
        key_config & 0x01 == 0x01 && (key_config >> 2) & 0x07 == P256_KEY_TYPE
    }

    fn key_slot(&self, slot: KeySlot) -> SeResult<u16> {
        self.ensure_session()?;
        let index = slot.check_range(ECCX08_SLOT_COUNT)?.index();
        if !self.holds_private_key(index) {
            return Err(KeySlotError::NotAKeySlot { slot: index }.into());
        }
        Ok(index)
    }

    fn data_slot(&self, slot: CertSlot) -> SeResult<(u16, usize)> {
        let index = slot.check_range(ECCX08_SLOT_COUNT)?.index();
        let capacity = data_slot_capacity(index).ok_or(StorageError::CapacityExceeded {
            slot: index,
            length: 0,
            capacity: 0,
        })?;
        Ok((index, capacity))
    }
}

impl Session for Eccx08 {
    fn begin(&mut self) -> SeResult<()> {
        if !self.present {
            return Err(DeviceError::Unreachable {
                reason: "ECCX08 did not acknowledge wake-up".to_string(),
            }
            .into());
        }
        if !self.session {
            debug!("ECCX08 session opened");
        }
        self.session = true;
        Ok(())
    }

    fn end(&mut self) -> SeResult<()> {
        if self.session {
            debug!("ECCX08 put to sleep");
        }
        self.session = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.session
    }
}

impl DeviceIdentity for Eccx08 {
    fn serial_number(&mut self) -> SeResult<Vec<u8>> {
        self.ensure_session()?;
        let mut serial = Vec::with_capacity(ECCX08_SERIAL_LENGTH);
        serial.extend_from_slice(&self.config_zone[0..4]);
        serial.extend_from_slice(&self.config_zone[8..13]);
        Ok(serial)
    }
}

impl RandomSource for Eccx08 {
    fn random_bytes(&mut self, buffer: &mut [u8]) -> SeResult<()> {
        self.ensure_session()?;
        soft_p256::fill_random(buffer);
        Ok(())
    }
}

impl KeyManager for Eccx08 {
    fn generate_private_key(&mut self, slot: KeySlot) -> SeResult<PublicKey> {
        let index = self.key_slot(slot)?;
        if self.is_slot_locked(index) {
            return Err(KeySlotError::Locked { slot: index }.into());
        }
        if self.keys.contains_key(&index) {
            return Err(KeySlotError::AlreadyProvisioned { slot: index }.into());
        }

        let key = soft_p256::mint_signing_key()?;
        let public_key = soft_p256::public_key_of(&key);
        self.keys.insert(index, key);
        info!("ECCX08 GenKey stored a new private key in slot {}", index);
        Ok(public_key)
    }

    fn generate_public_key(&mut self, slot: KeySlot) -> SeResult<PublicKey> {
        let index = self.key_slot(slot)?;
        let key = self
            .keys
            .get(&index)
            .ok_or(KeySlotError::Empty { slot: index })?;
        Ok(soft_p256::public_key_of(key))
    }
}

impl Signer for Eccx08 {
    fn ec_sign(&mut self, slot: KeySlot, digest: &Digest) -> SeResult<Signature> {
        let index = self.key_slot(slot)?;
        let key = self
            .keys
            .get(&index)
            .ok_or(KeySlotError::Empty { slot: index })?;
        debug!("ECCX08 Sign with slot {}", index);
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

impl Hasher for Eccx08 {
    fn sha256(&mut self, data: &[u8]) -> SeResult<Digest> {
        self.ensure_session()?;
        Ok(soft_p256::sha256(data))
    }
}

impl SlotStorage for Eccx08 {
    fn slot_capacity(&self, slot: CertSlot) -> SeResult<usize> {
        Ok(self.data_slot(slot)?.1)
    }

    fn read_slot(&mut self, slot: CertSlot, buffer: &mut [u8]) -> SeResult<()> {
        self.ensure_session()?;
        let (index, capacity) = self.data_slot(slot)?;
        if buffer.len() > capacity {
            return Err(StorageError::CapacityExceeded {
                slot: index,
                length: buffer.len(),
                capacity,
            }
            .into());
        }

        // Never-written slots read back as zeros
        buffer.fill(0);
        if let Some(stored) = self.data.get(&index) {
            let n = buffer.len().min(stored.len());
            buffer[..n].copy_from_slice(&stored[..n]);
        }
        Ok(())
    }

    fn write_slot(&mut self, slot: CertSlot, data: &[u8]) -> SeResult<()> {
        self.ensure_session()?;
        let (index, capacity) = self.data_slot(slot)?;
        let padded_length = data.len().div_ceil(WORD) * WORD;
        if padded_length > capacity {
            return Err(StorageError::CapacityExceeded {
                slot: index,
                length: data.len(),
                capacity,
            }
            .into());
        }
        if self.holds_private_key(index) {
            return Err(DeviceError::CommandFailed {
                command: "Write".to_string(),
                reason: format!("slot {} holds a private key", index),
            }
            .into());
        }

        let mut stored = vec![0u8; capacity];
        stored[..data.len()].copy_from_slice(data);
        self.data.insert(index, stored);
        debug!(
            "ECCX08 wrote {} bytes ({} words) to slot {}",
            data.len(),
            padded_length / WORD,
            index
        );
        Ok(())
    }
}

impl Configurator for Eccx08 {
    fn locked(&mut self) -> SeResult<bool> {
        self.ensure_session()?;
        Ok(self.is_config_locked())
    }

    fn lock(&mut self) -> SeResult<()> {
        self.ensure_session()?;
        if self.is_config_locked() {
            return Err(KeySlotError::DeviceLocked.into());
        }
        self.config_zone[LOCK_CONFIG_OFFSET] = LOCKED;
        self.config_zone[LOCK_VALUE_OFFSET] = LOCKED;
        info!("ECCX08 configuration and data zones locked");
        Ok(())
    }

    fn write_configuration(&mut self, config: &ConfigurationTable) -> SeResult<()> {
        self.ensure_session()?;
        if self.is_config_locked() {
            return Err(KeySlotError::DeviceLocked.into());
        }
        if config.len() > ECCX08_CONFIG_ZONE_LENGTH {
            return Err(StorageError::ConfigurationTooLarge {
                length: config.len(),
                capacity: ECCX08_CONFIG_ZONE_LENGTH,
            }
            .into());
        }

        // Lock bytes only change through lock()
        let lock_bytes = [
            self.config_zone[LOCK_VALUE_OFFSET],
            self.config_zone[LOCK_CONFIG_OFFSET],
        ];
        for (offset, byte) in config
            .as_bytes()
            .iter()
            .enumerate()
            .skip(READ_ONLY_CONFIG_BYTES)
        {
            self.config_zone[offset] = *byte;
        }
        self.config_zone[LOCK_VALUE_OFFSET] = lock_bytes[0];
        self.config_zone[LOCK_CONFIG_OFFSET] = lock_bytes[1];
        debug!("ECCX08 configuration zone written ({} bytes)", config.len());
        Ok(())
    }

    fn default_configuration(&self) -> ConfigurationTable {
        ConfigurationTable::eccx08_default_tls()
    }
}
