mod certificate;
mod configuration;
mod identity;
mod key_material;
mod slot;

pub use certificate::{Ecp256Certificate, CERT_BUFFER_LENGTH};
pub use configuration::{
    ConfigurationError, ConfigurationTable, ECCX08_CONFIG_ZONE_LENGTH, ECCX08_KEY_CONFIG_OFFSET,
    ECCX08_SLOT_CONFIG_OFFSET,
};
pub use identity::{
    CertificateSerial, DistinguishedName, IdentityError, ValidityPeriod, MAX_SERIAL_LENGTH,
};
pub use key_material::{
    Digest, KeyMaterialError, PublicKey, Signature, DIGEST_LENGTH, PUBLIC_KEY_LENGTH,
    SIGNATURE_LENGTH,
};
pub use slot::{CertSlot, KeySlot, SlotError};
