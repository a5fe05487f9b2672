//! Error types for seprov
//!
//! This module defines the error hierarchy for all secure element operations.
//! Errors are organized hierarchically and use thiserror for implementation.
//! [`SeError::kind`] collapses the hierarchy back into the four failure
//! classes a provisioning caller has to react to.

use thiserror::Error;

/// Result type alias for seprov operations
pub type SeResult<T> = Result<T, SeError>;

/// Top-level error type for all seprov operations
#[derive(Error, Debug)]
pub enum SeError {
    /// Transport or session errors
    #[error("Hardware communication failure: {0}")]
    Device(#[from] DeviceError),

    /// Key slot or device lock state errors
    #[error("Key slot state error: {0}")]
    KeySlot(#[from] KeySlotError),

    /// Certificate model rejected its input or stored bytes could not be parsed
    #[error("Encoding failure: {0}")]
    Encoding(#[from] EncodingError),

    /// Slot storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Cryptographic operation errors
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// Domain validation errors
    #[error("Domain validation error: {0}")]
    Domain(#[from] DomainError),
}

/// Coarse failure class of an [`SeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    HardwareCommunicationFailure,
    KeySlotStateError,
    EncodingFailure,
    StorageCapacityExceeded,
    CryptoFailure,
    InvalidInput,
}

impl SeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SeError::Device(_) => ErrorKind::HardwareCommunicationFailure,
            SeError::KeySlot(_) => ErrorKind::KeySlotStateError,
            SeError::Encoding(_) => ErrorKind::EncodingFailure,
            SeError::Storage(_) => ErrorKind::StorageCapacityExceeded,
            SeError::Crypto(_) => ErrorKind::CryptoFailure,
            SeError::Domain(_) => ErrorKind::InvalidInput,
        }
    }
}

/// Transport and session errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device did not answer on its bus
    #[error("Secure element unreachable: {reason}")]
    Unreachable { reason: String },

    /// An operation was issued before `begin()` or after `end()`
    #[error("No open session with the secure element")]
    SessionNotStarted,

    /// The device answered with an error status
    #[error("Command {command} failed: {reason}")]
    CommandFailed { command: String, reason: String },
}

/// Key slot and lock state errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeySlotError {
    /// No key has been generated in the slot
    #[error("No key found in slot: {slot}")]
    Empty { slot: u16 },

    /// Slot already holds a key
    #[error("Slot already contains a key: {slot}")]
    AlreadyProvisioned { slot: u16 },

    /// Slot is locked against key generation
    #[error("Slot is locked: {slot}")]
    Locked { slot: u16 },

    /// Slot is not configured to hold a P-256 private key
    #[error("Slot {slot} cannot hold a private key")]
    NotAKeySlot { slot: u16 },

    /// Device configuration is locked
    #[error("Device configuration is locked")]
    DeviceLocked,
}

/// Certificate encoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Certificate model rejected a value
    #[error("Certificate model rejected input: {reason}")]
    Rejected { reason: String },

    /// Bytes could not be parsed as a certificate or CSR
    #[error("Malformed certificate bytes: {reason}")]
    Malformed { reason: String },

    /// Slot did not contain any certificate
    #[error("No certificate present")]
    Absent,

    /// Operation issued in the wrong build phase
    #[error("Certificate model is not ready: expected {expected}")]
    InvalidState { expected: String },

    /// Encoded certificate is larger than the certificate buffer
    #[error("Encoded certificate is {length} bytes, limit is {limit}")]
    TooLarge { length: usize, limit: usize },
}

/// Slot storage errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Data larger than the slot
    #[error("{length} bytes do not fit slot {slot} (capacity {capacity})")]
    CapacityExceeded {
        slot: u16,
        length: usize,
        capacity: usize,
    },

    /// Configuration table larger than the configuration zone
    #[error("Configuration of {length} bytes exceeds {capacity} bytes")]
    ConfigurationTooLarge { length: usize, capacity: usize },
}

/// Cryptographic operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Signature generation failed
    #[error("Failed to generate signature: {reason}")]
    SignatureFailed { reason: String },

    /// Key generation failed
    #[error("Failed to generate key: {reason}")]
    KeyGenerationFailed { reason: String },

    /// Bytes are not a valid P-256 public key
    #[error("Invalid public key: {reason}")]
    InvalidPublicKey { reason: String },

    /// Bytes are not a valid P-256 signature
    #[error("Invalid signature encoding: {reason}")]
    InvalidSignature { reason: String },
}

/// Domain validation errors
#[derive(Error, Debug)]
pub enum DomainError {
    /// Slot error
    #[error("Slot error: {0}")]
    Slot(#[from] crate::model::SlotError),

    /// Key material error
    #[error("Key material error: {0}")]
    KeyMaterial(#[from] crate::model::KeyMaterialError),

    /// Identity error
    #[error("Identity error: {0}")]
    Identity(#[from] crate::model::IdentityError),

    /// Configuration table error
    #[error("Configuration error: {0}")]
    Configuration(#[from] crate::model::ConfigurationError),
}

impl From<crate::model::SlotError> for SeError {
    fn from(err: crate::model::SlotError) -> Self {
        SeError::Domain(DomainError::Slot(err))
    }
}

impl From<crate::model::KeyMaterialError> for SeError {
    fn from(err: crate::model::KeyMaterialError) -> Self {
        SeError::Domain(DomainError::KeyMaterial(err))
    }
}

impl From<crate::model::IdentityError> for SeError {
    fn from(err: crate::model::IdentityError) -> Self {
        SeError::Domain(DomainError::Identity(err))
    }
}

impl From<crate::model::ConfigurationError> for SeError {
    fn from(err: crate::model::ConfigurationError) -> Self {
        SeError::Domain(DomainError::Configuration(err))
    }
}

/// DER errors always come from the certificate model
impl From<x509_cert::der::Error> for SeError {
    fn from(err: x509_cert::der::Error) -> Self {
        SeError::Encoding(EncodingError::Malformed {
            reason: err.to_string(),
        })
    }
}
