//! High-level provisioning entry points

use std::fmt;

use tracing::{info, warn};

use crate::adapters::{Eccx08, Se05x};
use crate::error::{EncodingError, SeResult};
use crate::facade::SecureElement;
use crate::ports::{CertificateModel, SecureElementBackend};

pub use crate::model::*;

/// Random serial number length used when the caller supplies none
const GENERATED_SERIAL_LENGTH: usize = 16;

/// Secure element family to drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BackendFamily {
    #[default]
    Eccx08,
    Se05x,
}

impl fmt::Display for BackendFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendFamily::Eccx08 => write!(f, "ECCX08"),
            BackendFamily::Se05x => write!(f, "SE05X"),
        }
    }
}

/// Everything `provision_device` needs to take a device from factory state
/// to a stored device certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningConfig {
    pub family: BackendFamily,
    /// Slot holding the device key
    pub key_slot: KeySlot,
    /// Slot receiving the device certificate
    pub cert_slot: CertSlot,
    /// Generate a fresh key instead of reusing the one in `key_slot`
    pub mint_new_key: bool,
    /// Subject name; `None` uses the device serial number as common name
    pub subject: Option<DistinguishedName>,
    /// Issuer name; `None` issues a self-signed certificate
    pub issuer: Option<DistinguishedName>,
    /// Certificate serial number; `None` draws one from the device RNG
    pub serial: Option<Vec<u8>>,
    pub validity: ValidityPeriod,
    /// One-time configuration; `None` uses the family default
    pub configuration: Option<ConfigurationTable>,
    /// Lock the device configuration after writing it
    pub lock_device: bool,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            family: BackendFamily::default(),
            key_slot: KeySlot::default_signing(),
            cert_slot: CertSlot::new(8),
            mint_new_key: true,
            subject: None,
            issuer: None,
            serial: None,
            validity: ValidityPeriod::default(),
            configuration: None,
            lock_device: false,
        }
    }
}

/// Outcome of a successful provisioning run
#[derive(Debug, Clone)]
pub struct ProvisioningReport {
    pub serial_number: String,
    pub public_key: PublicKey,
    pub csr_pem: String,
    pub certificate_pem: String,
    pub locked: bool,
}

/// Provision a fresh in-process device of `config.family`
pub fn provision(config: &ProvisioningConfig) -> SeResult<ProvisioningReport> {
    match config.family {
        BackendFamily::Eccx08 => provision_device(&mut SecureElement::new(Eccx08::new()), config),
        BackendFamily::Se05x => provision_device(&mut SecureElement::new(Se05x::new()), config),
    }
}

/// Run the full provisioning sequence against `se`
///
/// 1. Write the configuration table (and lock, if asked) unless already locked
/// 2. Build and sign a CSR, minting the key if configured
/// 3. Build and sign the device certificate against the same key
/// 4. Store the certificate and read it back
///
/// The session is closed again whether or not the sequence succeeds.
///
/// # Errors
///
/// Stops at the first failing step. Keys minted or locks applied before the
/// failure are permanent.
pub fn provision_device<B: SecureElementBackend>(
    se: &mut SecureElement<B>,
    config: &ProvisioningConfig,
) -> SeResult<ProvisioningReport> {
    se.begin()?;
    let result = run_provisioning(se, config);
    let ended = se.end();
    let report = result?;
    ended?;
    info!("Provisioning of {} complete", report.serial_number);
    Ok(report)
}

fn run_provisioning<B: SecureElementBackend>(
    se: &mut SecureElement<B>,
    config: &ProvisioningConfig,
) -> SeResult<ProvisioningReport> {
    let serial_number = se.serial_number()?;
    info!("Provisioning {} device {}", config.family, serial_number);

    if se.locked()? {
        warn!("Device {} already locked; keeping its configuration", serial_number);
    } else {
        let table = config
            .configuration
            .clone()
            .unwrap_or_else(|| se.default_configuration());
        let mut unlocked = se.unlocked()?;
        unlocked.write_configuration(&table)?;
        if config.lock_device {
            unlocked.lock()?;
        }
    }

    let subject = config
        .subject
        .clone()
        .unwrap_or_else(|| DistinguishedName::with_common_name(serial_number.clone()));

    let mut csr = Ecp256Certificate::new(subject.clone());
    let key = se.build_csr(&mut csr, config.key_slot, config.mint_new_key)?;

    let serial = match &config.serial {
        Some(serial) => CertificateSerial::new(serial)?,
        None => {
            let mut bytes = [0u8; GENERATED_SERIAL_LENGTH];
            se.random_bytes(&mut bytes)?;
            CertificateSerial::new(&bytes)?
        }
    };
    let mut certificate = Ecp256Certificate::new(subject);
    if let Some(issuer) = &config.issuer {
        certificate.set_issuer(issuer.clone());
    }
    certificate.set_serial_number(serial);
    certificate.set_validity(config.validity);
    se.build_cert(&mut certificate, key.slot())?;

    se.write_cert(&certificate, config.cert_slot)?;
    let mut stored = Ecp256Certificate::default();
    se.read_cert(config.cert_slot, &mut stored)?;
    if stored.bytes() != certificate.bytes() {
        return Err(EncodingError::Malformed {
            reason: format!("read-back of {} differs from written certificate", config.cert_slot),
        }
        .into());
    }

    Ok(ProvisioningReport {
        serial_number,
        public_key: *key.public_key(),
        csr_pem: csr.to_pem()?,
        certificate_pem: stored.to_pem()?,
        locked: se.locked()?,
    })
}
