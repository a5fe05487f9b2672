use thiserror::Error;

/// Size of the ECCX08 configuration zone
pub const ECCX08_CONFIG_ZONE_LENGTH: usize = 128;

/// Offset of the per-slot KeyConfig words in the ECCX08 configuration zone
pub const ECCX08_KEY_CONFIG_OFFSET: usize = 96;

/// Offset of the per-slot SlotConfig words in the ECCX08 configuration zone
pub const ECCX08_SLOT_CONFIG_OFFSET: usize = 20;

/// One-time chip configuration written while the device is unlocked
///
/// The byte layout is family specific; each backend interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationTable(Vec<u8>);

impl ConfigurationTable {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Empty table, for families that ship fully configured
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn from_hex(text: &str) -> Result<Self, ConfigurationError> {
        let bytes = hex::decode(text.trim()).map_err(|e| ConfigurationError::InvalidHex {
            reason: e.to_string(),
        })?;
        Ok(Self(bytes))
    }

    /// ECCX08 TLS layout: slots 0-4 hold P-256 private keys, 5-15 hold data
    pub fn eccx08_default_tls() -> Self {
        let mut zone = vec![0u8; ECCX08_CONFIG_ZONE_LENGTH];
        // I2C address, OTP mode, chip mode
        zone[16] = 0xC0;
        zone[18] = 0xAA;
        zone[19] = 0x00;

        for slot in 0..16 {
            let slot_config = ECCX08_SLOT_CONFIG_OFFSET + slot * 2;
            let key_config = ECCX08_KEY_CONFIG_OFFSET + slot * 2;
            let (slot_word, key_word) = match slot {
                0..=4 => ([0x83, 0x20], [0x33, 0x00]),
                5..=7 => ([0x87, 0x20], [0x1C, 0x00]),
                _ => ([0x0F, 0x0F], [0x3C, 0x00]),
            };
            zone[slot_config..slot_config + 2].copy_from_slice(&slot_word);
            zone[key_config..key_config + 2].copy_from_slice(&key_word);
        }

        // LockValue / LockConfig stay unlocked until lock()
        zone[86] = 0x55;
        zone[87] = 0x55;
        // SlotLocked: a cleared bit locks the slot
        zone[88] = 0xFF;
        zone[89] = 0xFF;
        Self(zone)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Configuration is not valid hex: {reason}")]
    InvalidHex { reason: String },
}
