use std::fmt;
use thiserror::Error;

/// Index of a persistent key storage unit inside the secure element
///
/// Only the index ever crosses the hardware boundary, never the key itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeySlot(u16);

impl KeySlot {
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    pub fn default_signing() -> Self {
        Self(0)
    }

    pub fn index(self) -> u16 {
        self.0
    }

    /// Check the index against a device with `count` slots
    pub fn check_range(self, count: u16) -> Result<Self, SlotError> {
        check_range(self.0, count).map(|_| self)
    }
}

impl From<u16> for KeySlot {
    fn from(index: u16) -> Self {
        Self(index)
    }
}

impl fmt::Display for KeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key slot {}", self.0)
    }
}

/// Index of a persistent data storage unit holding certificate bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CertSlot(u16);

impl CertSlot {
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    pub fn index(self) -> u16 {
        self.0
    }

    pub fn check_range(self, count: u16) -> Result<Self, SlotError> {
        check_range(self.0, count).map(|_| self)
    }
}

impl From<u16> for CertSlot {
    fn from(index: u16) -> Self {
        Self(index)
    }
}

impl fmt::Display for CertSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cert slot {}", self.0)
    }
}

fn check_range(index: u16, count: u16) -> Result<(), SlotError> {
    if index >= count {
        return Err(SlotError::OutOfRange {
            slot: index,
            max: count.saturating_sub(1),
        });
    }
    Ok(())
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("Slot {slot} out of range (max {max})")]
    OutOfRange { slot: u16, max: u16 },
}
