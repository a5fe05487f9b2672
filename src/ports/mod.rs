//! Ports (traits) for secure element operations
//!
//! These traits define the capabilities a hardware backend must offer.
//! The orchestration code depends on these abstractions, never on a concrete
//! chip family; `Eccx08` and `Se05x` are interchangeable implementations.

mod certificate_model;
mod configurator;
mod key_manager;
mod random_source;
mod session;
mod signer;
mod slot_storage;


pub use certificate_model::CertificateModel;
pub use configurator::Configurator;
pub use key_manager::KeyManager;
pub use random_source::RandomSource;
pub use session::{DeviceIdentity, Session};
pub use signer::{Hasher, Signer};
pub use slot_storage::SlotStorage;

/// Combined trait for all secure element operations
///
/// A hardware backend implements every capability trait and gets this one
/// for free.
pub trait SecureElementBackend:
    Session + DeviceIdentity + RandomSource + KeyManager + Signer + Hasher + SlotStorage + Configurator
{
}

// Blanket implementation for types that implement all operation traits
impl<T> SecureElementBackend for T where
    T: Session
        + DeviceIdentity
        + RandomSource
        + KeyManager
        + Signer
        + Hasher
        + SlotStorage
        + Configurator
{
}
