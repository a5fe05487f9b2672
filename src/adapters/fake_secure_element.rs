use std::collections::HashMap;

use p256::ecdsa::SigningKey;

use super::soft_p256;
use crate::error::{DeviceError, KeySlotError, SeError, SeResult, StorageError};
use crate::model::{CertSlot, ConfigurationTable, Digest, KeySlot, PublicKey, Signature};
use crate::ports::{
    Configurator, DeviceIdentity, Hasher, KeyManager, RandomSource, Session, Signer, SlotStorage,
};

/// Operation the fake can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    GeneratePrivateKey,
    GeneratePublicKey,
    Sign,
    Hash,
    WriteSlot,
    ReadSlot,
}

#[derive(Debug)]
pub struct FakeSecureElement {
    pub present: bool,
    pub session: bool,
    pub serial: Vec<u8>,
    pub keys: HashMap<KeySlot, SigningKey>,
    pub slots: HashMap<CertSlot, Vec<u8>>,
    pub capacity: usize,
    pub configuration: Option<ConfigurationTable>,
    pub locked: bool,
    pub fail_on: Option<FailOn>,
    /// Every digest handed to `ec_sign`, in call order
    pub signed_digests: Vec<Digest>,
    pub configuration_writes: usize,
}

impl Default for FakeSecureElement {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSecureElement {
    pub fn new() -> Self {
        Self {
            present: true,
            session: false,
            serial: vec![0x01, 0x23, 0xAB, 0xCD, 0xEF, 0x01, 0x02, 0x03, 0xEE],
            keys: HashMap::new(),
            slots: HashMap::new(),
            capacity: 1024,
            configuration: None,
            locked: false,
            fail_on: None,
            signed_digests: Vec::new(),
            configuration_writes: 0,
        }
    }

    pub fn failing_on(operation: FailOn) -> Self {
        Self {
            fail_on: Some(operation),
            ..Self::new()
        }
    }

    fn ensure_session(&self) -> SeResult<()> {
        if !self.session {
            return Err(DeviceError::SessionNotStarted.into());
        }
        Ok(())
    }

    fn check(&self, operation: FailOn) -> SeResult<()> {
        self.ensure_session()?;
        if self.fail_on == Some(operation) {
            return Err(SeError::Device(DeviceError::CommandFailed {
                command: format!("{:?}", operation),
                reason: "injected failure".to_string(),
            }));
        }
        Ok(())
    }
}

impl Session for FakeSecureElement {
    fn begin(&mut self) -> SeResult<()> {
        if !self.present {
            return Err(DeviceError::Unreachable {
                reason: "fake device absent".to_string(),
            }
            .into());
        }
        self.session = true;
        Ok(())
    }

    fn end(&mut self) -> SeResult<()> {
        self.session = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.session
    }
}

impl DeviceIdentity for FakeSecureElement {
    fn serial_number(&mut self) -> SeResult<Vec<u8>> {
        self.ensure_session()?;
        Ok(self.serial.clone())
    }
}

impl RandomSource for FakeSecureElement {
    fn random_bytes(&mut self, buffer: &mut [u8]) -> SeResult<()> {
        self.ensure_session()?;
        soft_p256::fill_random(buffer);
        Ok(())
    }
}

impl KeyManager for FakeSecureElement {
    fn generate_private_key(&mut self, slot: KeySlot) -> SeResult<PublicKey> {
        self.check(FailOn::GeneratePrivateKey)?;
        if self.keys.contains_key(&slot) {
            return Err(KeySlotError::AlreadyProvisioned { slot: slot.index() }.into());
        }
        let key = soft_p256::mint_signing_key()?;
        let public_key = soft_p256::public_key_of(&key);
        self.keys.insert(slot, key);
        Ok(public_key)
    }

    fn generate_public_key(&mut self, slot: KeySlot) -> SeResult<PublicKey> {
        self.check(FailOn::GeneratePublicKey)?;
        let key = self
            .keys
            .get(&slot)
            .ok_or(KeySlotError::Empty { slot: slot.index() })?;
        Ok(soft_p256::public_key_of(key))
    }
}

impl Signer for FakeSecureElement {
    fn ec_sign(&mut self, slot: KeySlot, digest: &Digest) -> SeResult<Signature> {
        self.check(FailOn::Sign)?;
        let key = self
            .keys
            .get(&slot)
            .ok_or(KeySlotError::Empty { slot: slot.index() })?;
        let signature = soft_p256::sign_digest(key, digest)?;
        self.signed_digests.push(*digest);
        Ok(signature)
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

impl Hasher for FakeSecureElement {
    fn sha256(&mut self, data: &[u8]) -> SeResult<Digest> {
        self.check(FailOn::Hash)?;
        Ok(soft_p256::sha256(data))
    }
}

impl SlotStorage for FakeSecureElement {
    fn slot_capacity(&self, _slot: CertSlot) -> SeResult<usize> {
        Ok(self.capacity)
    }

    fn read_slot(&mut self, slot: CertSlot, buffer: &mut [u8]) -> SeResult<()> {
        self.check(FailOn::ReadSlot)?;
        if buffer.len() > self.capacity {
            return Err(StorageError::CapacityExceeded {
                slot: slot.index(),
                length: buffer.len(),
                capacity: self.capacity,
            }
            .into());
        }
        buffer.fill(0);
        if let Some(stored) = self.slots.get(&slot) {
            let n = buffer.len().min(stored.len());
            buffer[..n].copy_from_slice(&stored[..n]);
        }
        Ok(())
    }

    fn write_slot(&mut self, slot: CertSlot, data: &[u8]) -> SeResult<()> {
        self.check(FailOn::WriteSlot)?;
        if data.len() > self.capacity {
            return Err(StorageError::CapacityExceeded {
                slot: slot.index(),
                length: data.len(),
                capacity: self.capacity,
            }
            .into());
        }
        self.slots.insert(slot, data.to_vec());
        Ok(())
    }
}

impl Configurator for FakeSecureElement {
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
        Ok(())
    }

    fn write_configuration(&mut self, config: &ConfigurationTable) -> SeResult<()> {
        self.ensure_session()?;
        if self.locked {
            return Err(KeySlotError::DeviceLocked.into());
        }
        self.configuration_writes += 1;
        self.configuration = Some(config.clone());
        Ok(())
    }

    fn default_configuration(&self) -> ConfigurationTable {
        ConfigurationTable::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract_tests_for;
    use crate::ports::contract_tests::secure_element_contract;

    contract_tests_for!(
        fake_secure_element_contract,
        make = FakeSecureElement::new,
        tests = {
            test_operations_require_session => secure_element_contract::test_operations_require_session,
            test_session_is_idempotent => secure_element_contract::test_session_is_idempotent,
            test_serial_number_is_stable => secure_element_contract::test_serial_number_is_stable,
            test_random_bytes_fill => secure_element_contract::test_random_bytes_fill,
            test_sha256_known_vector => secure_element_contract::test_sha256_known_vector,
            test_generate_private_key_twice_fails => secure_element_contract::test_generate_private_key_twice_fails,
            test_generate_public_key_empty_slot_fails => secure_element_contract::test_generate_public_key_empty_slot_fails,
            test_generate_public_key_matches_minted => secure_element_contract::test_generate_public_key_matches_minted,
            test_sign_and_verify => secure_element_contract::test_sign_and_verify,
            test_sign_empty_slot_fails => secure_element_contract::test_sign_empty_slot_fails,
            test_write_read_slot_round_trip => secure_element_contract::test_write_read_slot_round_trip,
            test_write_slot_over_capacity_preserves_contents => secure_element_contract::test_write_slot_over_capacity_preserves_contents,
            test_lock_blocks_write_configuration => secure_element_contract::test_lock_blocks_write_configuration,
        }
    );

    #[test]
    fn test_injected_failure() {
        let mut device = FakeSecureElement::failing_on(FailOn::Hash);
        device.begin().unwrap();
        assert!(matches!(
            device.sha256(b"abc"),
            Err(SeError::Device(DeviceError::CommandFailed { .. }))
        ));
        assert!(device.generate_private_key(KeySlot::new(0)).is_ok());
    }

    #[test]
    fn test_signed_digests_are_recorded() {
        let mut device = FakeSecureElement::new();
        device.begin().unwrap();
        device.generate_private_key(KeySlot::new(0)).unwrap();
        let digest = Digest::new([5u8; 32]);
        device.ec_sign(KeySlot::new(0), &digest).unwrap();
        assert_eq!(device.signed_digests, vec![digest]);
    }
}
