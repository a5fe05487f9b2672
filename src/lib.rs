//! Certificate provisioning on P-256 secure elements
//!
//! Keys never leave the secure element. This crate sequences key
//! provisioning, certificate assembly, hashing and signing across that
//! boundary, over two interchangeable chip families (ECCX08 and SE05X).

mod adapters;
pub mod api;
pub mod error;
mod facade;
pub mod model;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use error::{ErrorKind, SeError, SeResult};
pub use facade::{ProvisionedKey, SecureElement, UnlockedDevice};

// Re-export backends
pub use adapters::{
    Eccx08, Se05x, ECCX08_SERIAL_LENGTH, ECCX08_SLOT_COUNT, SE05X_BINARY_OBJECT_CAPACITY,
    SE05X_OBJECT_ID_BASE, SE05X_UNIQUE_ID_LENGTH,
};

// Re-export public API
pub use api::{provision, provision_device, BackendFamily, ProvisioningConfig, ProvisioningReport};

/// Size of a SHA-256 digest buffer
pub const SHA256_BUFFER_LENGTH: usize = model::DIGEST_LENGTH;

pub use model::CERT_BUFFER_LENGTH;
