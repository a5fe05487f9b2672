//! Adapters - concrete implementations of ports (traits)

mod eccx08;
mod se05x;
mod soft_p256;

#[cfg(test)]
pub mod fake_secure_element;

// Re-export for convenience
pub use eccx08::{Eccx08, ECCX08_SERIAL_LENGTH, ECCX08_SLOT_COUNT};
pub use se05x::{Se05x, SE05X_BINARY_OBJECT_CAPACITY, SE05X_OBJECT_ID_BASE, SE05X_UNIQUE_ID_LENGTH};
