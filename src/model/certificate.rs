//! In-memory ECDSA P-256 certificate / CSR model
//!
//! `Ecp256Certificate` is filled in incrementally: identity fields first, then
//! the public key, then the to-be-signed structure is assembled, and finally
//! the signature produced by the secure element is attached. Until signed,
//! [`CertificateModel::bytes`] returns the to-be-signed DER; afterwards it
//! returns the complete DER.

use sha2::{Digest as _, Sha256};
use tracing::debug;
use x509_cert::der::asn1::{BitString, ObjectIdentifier, OctetString, SetOfVec};
use x509_cert::der::pem::LineEnding;
use x509_cert::der::{Decode, Encode, EncodePem, Header, SliceReader};
use x509_cert::ext::pkix::{AuthorityKeyIdentifier, SubjectKeyIdentifier};
use x509_cert::ext::Extension;
use x509_cert::request::{CertReq, CertReqInfo, Version as CsrVersion};
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::{Certificate, TbsCertificate};

use crate::error::{EncodingError, SeError, SeResult};
use crate::model::{
    CertificateSerial, DistinguishedName, PublicKey, Signature, ValidityPeriod,
};
use crate::ports::CertificateModel;

/// Upper bound on an encoded certificate or CSR
pub const CERT_BUFFER_LENGTH: usize = 1024;

const ECDSA_WITH_SHA_256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ID_CE_SUBJECT_KEY_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.14");
const ID_CE_AUTHORITY_KEY_IDENTIFIER: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.5.29.35");

/// Length of a key identifier (RFC 7093 method 1)
const KEY_IDENTIFIER_LENGTH: usize = 20;

#[derive(Debug, Clone)]
enum Stage {
    Empty,
    CsrTbs(CertReqInfo),
    CertTbs(TbsCertificate),
    SignedCsr(CertReq),
    SignedCert(Certificate),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Empty => "empty",
            Stage::CsrTbs(_) => "unsigned CSR",
            Stage::CertTbs(_) => "unsigned certificate",
            Stage::SignedCsr(_) => "signed CSR",
            Stage::SignedCert(_) => "signed certificate",
        }
    }
}

/// P-256 certificate or certificate signing request under construction
#[derive(Debug, Clone)]
pub struct Ecp256Certificate {
    subject: DistinguishedName,
    issuer: Option<DistinguishedName>,
    serial: Option<CertificateSerial>,
    validity: ValidityPeriod,
    authority_key_id: Option<Vec<u8>>,
    public_key: Option<PublicKey>,
    signature: Option<Signature>,
    stage: Stage,
    bytes: Vec<u8>,
}

impl Default for Ecp256Certificate {
    fn default() -> Self {
        Self::new(DistinguishedName::default())
    }
}

impl Ecp256Certificate {
    pub fn new(subject: DistinguishedName) -> Self {
        Self {
            subject,
            issuer: None,
            serial: None,
            validity: ValidityPeriod::default(),
            authority_key_id: None,
            public_key: None,
            signature: None,
            stage: Stage::Empty,
            bytes: Vec::new(),
        }
    }

    pub fn subject(&self) -> &DistinguishedName {
        &self.subject
    }

    pub fn set_subject(&mut self, subject: DistinguishedName) {
        self.subject = subject;
    }

    /// Issuer name; when unset the certificate is self-issued
    pub fn issuer(&self) -> &DistinguishedName {
        self.issuer.as_ref().unwrap_or(&self.subject)
    }

    pub fn set_issuer(&mut self, issuer: DistinguishedName) {
        self.issuer = Some(issuer);
    }

    pub fn serial_number(&self) -> Option<&CertificateSerial> {
        self.serial.as_ref()
    }

    pub fn set_serial_number(&mut self, serial: CertificateSerial) {
        self.serial = Some(serial);
    }

    pub fn validity(&self) -> &ValidityPeriod {
        &self.validity
    }

    pub fn set_validity(&mut self, validity: ValidityPeriod) {
        self.validity = validity;
    }

    /// Key identifier of the issuing key; defaults to the subject key identifier
    pub fn set_authority_key_identifier(&mut self, key_id: Vec<u8>) {
        self.authority_key_id = Some(key_id);
    }

    pub fn is_csr(&self) -> bool {
        matches!(self.stage, Stage::CsrTbs(_) | Stage::SignedCsr(_))
    }

    pub fn to_pem(&self) -> SeResult<String> {
        let pem = match &self.stage {
            Stage::SignedCsr(request) => request.to_pem(LineEnding::LF)?,
            Stage::SignedCert(certificate) => certificate.to_pem(LineEnding::LF)?,
            other => {
                return Err(EncodingError::InvalidState {
                    expected: format!("signed structure, model is {}", other.name()),
                }
                .into())
            }
        };
        Ok(pem)
    }

    fn require_public_key(&self) -> SeResult<PublicKey> {
        self.public_key.ok_or_else(|| {
            EncodingError::InvalidState {
                expected: "public key to be set".to_string(),
            }
            .into()
        })
    }

    fn store(&mut self, bytes: Vec<u8>, stage: Stage) -> SeResult<()> {
        if bytes.len() > CERT_BUFFER_LENGTH {
            return Err(EncodingError::TooLarge {
                length: bytes.len(),
                limit: CERT_BUFFER_LENGTH,
            }
            .into());
        }
        debug!("Certificate model now holds {} ({} bytes)", stage.name(), bytes.len());
        self.bytes = bytes;
        self.stage = stage;
        Ok(())
    }

    fn extensions(&self, public_key: &PublicKey) -> SeResult<Vec<Extension>> {
        let subject_key_id = key_identifier(public_key);
        let authority_key_id = self
            .authority_key_id
            .clone()
            .unwrap_or_else(|| subject_key_id.clone());

        let ski = SubjectKeyIdentifier(OctetString::new(subject_key_id)?);
        let aki = AuthorityKeyIdentifier {
            key_identifier: Some(OctetString::new(authority_key_id)?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };

        Ok(vec![
            extension(ID_CE_SUBJECT_KEY_IDENTIFIER, false, ski.to_der()?)?,
            extension(ID_CE_AUTHORITY_KEY_IDENTIFIER, false, aki.to_der()?)?,
        ])
    }

    fn load_certificate(&mut self, certificate: Certificate, bytes: Vec<u8>) -> SeResult<()> {
        let tbs = &certificate.tbs_certificate;
        let public_key = public_key_from_spki(&tbs.subject_public_key_info)?;
        let signature = Signature::from_der(certificate.signature.raw_bytes())
            .map_err(rejected)?;
        let serial = CertificateSerial::new(tbs.serial_number.as_bytes())
            .map_err(rejected)?;

        let mut loaded = Self::new(DistinguishedName::from_x509(&tbs.subject));
        loaded.issuer = Some(DistinguishedName::from_x509(&tbs.issuer));
        loaded.validity = ValidityPeriod::from_x509(&tbs.validity);
        loaded.serial = Some(serial);
        loaded.authority_key_id = authority_key_id(tbs)?;
        loaded.public_key = Some(public_key);
        loaded.signature = Some(signature);
        loaded.store(bytes, Stage::SignedCert(certificate))?;
        *self = loaded;
        Ok(())
    }

    fn load_request(&mut self, request: CertReq, bytes: Vec<u8>) -> SeResult<()> {
        let public_key = public_key_from_spki(&request.info.public_key)?;
        let signature = Signature::from_der(request.signature.raw_bytes())
            .map_err(rejected)?;

        let mut loaded = Self::new(DistinguishedName::from_x509(&request.info.subject));
        loaded.public_key = Some(public_key);
        loaded.signature = Some(signature);
        loaded.store(bytes, Stage::SignedCsr(request))?;
        *self = loaded;
        Ok(())
    }
}

impl CertificateModel for Ecp256Certificate {
    fn set_public_key(&mut self, key: &PublicKey) -> SeResult<()> {
        // Backend output is re-checked against the curve
        PublicKey::from_bytes(key.as_bytes()).map_err(rejected)?;
        self.public_key = Some(*key);
        Ok(())
    }

    fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    fn build_csr(&mut self) -> SeResult<()> {
        let public_key = self.require_public_key()?;
        let info = CertReqInfo {
            version: CsrVersion::V1,
            subject: self.subject.to_x509().map_err(rejected)?,
            public_key: spki(&public_key)?,
            attributes: SetOfVec::new(),
        };
        let bytes = info.to_der()?;
        self.signature = None;
        self.store(bytes, Stage::CsrTbs(info))
    }

    fn build_cert(&mut self) -> SeResult<()> {
        let public_key = self.require_public_key()?;
        let serial = self.serial.as_ref().ok_or_else(|| EncodingError::InvalidState {
            expected: "serial number to be set".to_string(),
        })?;

        let tbs = TbsCertificate {
            version: x509_cert::Version::V3,
            serial_number: serial.to_x509().map_err(rejected)?,
            signature: ecdsa_with_sha256(),
            issuer: self.issuer().to_x509().map_err(rejected)?,
            validity: self.validity.to_x509().map_err(rejected)?,
            subject: self.subject.to_x509().map_err(rejected)?,
            subject_public_key_info: spki(&public_key)?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(self.extensions(&public_key)?),
        };
        let bytes = tbs.to_der()?;
        self.signature = None;
        self.store(bytes, Stage::CertTbs(tbs))
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn sign_csr(&mut self, signature: &Signature) -> SeResult<()> {
        let Stage::CsrTbs(info) = &self.stage else {
            return Err(EncodingError::InvalidState {
                expected: format!("unsigned CSR, model is {}", self.stage.name()),
            }
            .into());
        };
        let signature_der = signature.to_der().map_err(rejected)?;
        let request = CertReq {
            info: info.clone(),
            algorithm: ecdsa_with_sha256(),
            signature: BitString::from_bytes(&signature_der)?,
        };
        let bytes = request.to_der()?;
        self.store(bytes, Stage::SignedCsr(request))?;
        self.signature = Some(*signature);
        Ok(())
    }

    fn sign_cert(&mut self, signature: &Signature) -> SeResult<()> {
        let Stage::CertTbs(tbs) = &self.stage else {
            return Err(EncodingError::InvalidState {
                expected: format!("unsigned certificate, model is {}", self.stage.name()),
            }
            .into());
        };
        let signature_der = signature.to_der().map_err(rejected)?;
        let certificate = Certificate {
            tbs_certificate: tbs.clone(),
            signature_algorithm: ecdsa_with_sha256(),
            signature: BitString::from_bytes(&signature_der)?,
        };
        let bytes = certificate.to_der()?;
        self.store(bytes, Stage::SignedCert(certificate))?;
        self.signature = Some(*signature);
        Ok(())
    }

    fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    fn is_signed(&self) -> bool {
        matches!(self.stage, Stage::SignedCsr(_) | Stage::SignedCert(_))
    }

    fn load(&mut self, bytes: &[u8]) -> SeResult<()> {
        if bytes.iter().all(|b| *b == 0x00) || bytes.iter().all(|b| *b == 0xFF) {
            return Err(EncodingError::Absent.into());
        }
        let frame = der_frame(bytes)?;

        match Certificate::from_der(frame) {
            Ok(certificate) => self.load_certificate(certificate, frame.to_vec()),
            Err(certificate_err) => match CertReq::from_der(frame) {
                Ok(request) => self.load_request(request, frame.to_vec()),
                Err(_) => Err(EncodingError::Malformed {
                    reason: certificate_err.to_string(),
                }
                .into()),
            },
        }
    }
}

fn rejected(err: impl std::fmt::Display) -> SeError {
    EncodingError::Rejected {
        reason: err.to_string(),
    }
    .into()
}

fn ecdsa_with_sha256() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: ECDSA_WITH_SHA_256,
        parameters: None,
    }
}

fn spki(public_key: &PublicKey) -> SeResult<SubjectPublicKeyInfoOwned> {
    use p256::pkcs8::EncodePublicKey;

    let key = p256::PublicKey::from_sec1_bytes(&public_key.to_sec1_bytes())
        .map_err(rejected)?;
    let document = key
        .to_public_key_der()
        .map_err(rejected)?;
    Ok(SubjectPublicKeyInfoOwned::from_der(document.as_bytes())?)
}

fn public_key_from_spki(spki: &SubjectPublicKeyInfoOwned) -> SeResult<PublicKey> {
    let raw = spki.subject_public_key.raw_bytes();
    match raw.split_first() {
        Some((0x04, point)) => PublicKey::from_bytes(point).map_err(rejected),
        _ => Err(rejected(
            "only uncompressed P-256 public keys are supported".to_string(),
        )),
    }
}

fn key_identifier(public_key: &PublicKey) -> Vec<u8> {
    let hash = Sha256::digest(public_key.to_sec1_bytes());
    hash[..KEY_IDENTIFIER_LENGTH].to_vec()
}

fn authority_key_id(tbs: &TbsCertificate) -> SeResult<Option<Vec<u8>>> {
    let Some(extension) = tbs
        .extensions
        .iter()
        .flatten()
        .find(|e| e.extn_id == ID_CE_AUTHORITY_KEY_IDENTIFIER)
    else {
        return Ok(None);
    };
    let aki = AuthorityKeyIdentifier::from_der(extension.extn_value.as_bytes())?;
    Ok(aki.key_identifier.map(|id| id.as_bytes().to_vec()))
}

fn extension(oid: ObjectIdentifier, critical: bool, value: Vec<u8>) -> SeResult<Extension> {
    Ok(Extension {
        extn_id: oid,
        critical,
        extn_value: OctetString::new(value)?,
    })
}

/// Slice the first DER element out of `bytes`, dropping slot padding
fn der_frame(bytes: &[u8]) -> SeResult<&[u8]> {
    let mut reader = SliceReader::new(bytes)?;
    let header = Header::decode(&mut reader)?;
    let total = (header.encoded_len()? + header.length)?;
    let total = usize::try_from(total)?;
    bytes.get(..total).ok_or_else(|| {
        EncodingError::Malformed {
            reason: format!("element of {} bytes truncated to {}", total, bytes.len()),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use p256::ecdsa::signature::{hazmat::PrehashSigner, Verifier};
    use p256::ecdsa::{SigningKey, VerifyingKey};
    use sha2::Digest as _;

    fn signing_key() -> SigningKey {
        SigningKey::from_slice(&[0x42u8; 32]).unwrap()
    }

    fn public_key() -> PublicKey {
        PublicKey::from_verifying_key(&VerifyingKey::from(&signing_key()))
    }

    fn sign(bytes: &[u8]) -> Signature {
        let digest = Sha256::digest(bytes);
        let signature: p256::ecdsa::Signature = signing_key().sign_prehash(&digest).unwrap();
        Signature::from_p256(&signature)
    }

    fn signed_csr() -> Ecp256Certificate {
        let mut cert = Ecp256Certificate::new(
            DistinguishedName::with_common_name("01233A4B5C6D7E8F90").organization("Acme"),
        );
        cert.set_public_key(&public_key()).unwrap();
        cert.build_csr().unwrap();
        let signature = sign(cert.bytes());
        cert.sign_csr(&signature).unwrap();
        cert
    }

    fn signed_cert() -> Ecp256Certificate {
        let mut cert = Ecp256Certificate::new(DistinguishedName::with_common_name("device-01"));
        cert.set_issuer(DistinguishedName::with_common_name("Acme Device CA").country("US"));
        cert.set_serial_number(CertificateSerial::new(&[0x01, 0x02, 0x03]).unwrap());
        cert.set_public_key(&public_key()).unwrap();
        cert.build_cert().unwrap();
        let signature = sign(cert.bytes());
        cert.sign_cert(&signature).unwrap();
        cert
    }

    #[test]
    fn test_build_csr_requires_public_key() {
        let mut cert = Ecp256Certificate::new(DistinguishedName::with_common_name("device"));
        let err = cert.build_csr().unwrap_err();
        assert!(matches!(
            err,
            SeError::Encoding(EncodingError::InvalidState { .. })
        ));
        assert!(cert.bytes().is_empty());
    }

    #[test]
    fn test_build_cert_requires_serial() {
        let mut cert = Ecp256Certificate::new(DistinguishedName::with_common_name("device"));
        cert.set_public_key(&public_key()).unwrap();
        assert!(matches!(
            cert.build_cert(),
            Err(SeError::Encoding(EncodingError::InvalidState { .. }))
        ));
    }

    #[test]
    fn test_signed_csr_verifies_independently() {
        let cert = signed_csr();
        let request = CertReq::from_der(cert.bytes()).unwrap();

        let tbs = request.info.to_der().unwrap();
        let signature =
            p256::ecdsa::Signature::from_der(request.signature.raw_bytes()).unwrap();
        VerifyingKey::from(&signing_key())
            .verify(&tbs, &signature)
            .expect("CSR signature must verify over the TBS bytes");
        assert_eq!(request.algorithm.oid, ECDSA_WITH_SHA_256);
    }

    #[test]
    fn test_signed_cert_carries_identity_and_extensions() {
        let cert = signed_cert();
        let parsed = Certificate::from_der(cert.bytes()).unwrap();
        let tbs = &parsed.tbs_certificate;

        assert_eq!(
            DistinguishedName::from_x509(&tbs.issuer).common_name,
            "Acme Device CA"
        );
        assert_eq!(tbs.serial_number.as_bytes(), &[0x01, 0x02, 0x03]);
        let extensions = tbs.extensions.as_ref().unwrap();
        assert_eq!(extensions.len(), 2);
        assert_eq!(extensions[0].extn_id, ID_CE_SUBJECT_KEY_IDENTIFIER);
        assert!(extensions.iter().all(|e| !e.critical));
    }

    #[test]
    fn test_sign_csr_in_wrong_stage_fails() {
        let mut cert = Ecp256Certificate::new(DistinguishedName::with_common_name("device"));
        let signature = sign(b"anything");
        assert!(matches!(
            cert.sign_csr(&signature),
            Err(SeError::Encoding(EncodingError::InvalidState { .. }))
        ));
        assert!(cert.signature().is_none());
    }

    #[test]
    fn test_load_ignores_trailing_slot_padding() {
        let original = signed_cert();
        let mut slot = original.bytes().to_vec();
        slot.resize(CERT_BUFFER_LENGTH, 0x00);

        let mut loaded = Ecp256Certificate::default();
        loaded.load(&slot).unwrap();

        assert_eq!(loaded.bytes(), original.bytes());
        assert_eq!(loaded.subject(), original.subject());
        assert_eq!(loaded.public_key(), original.public_key());
        assert_eq!(loaded.signature(), original.signature());
        assert!(loaded.is_signed());
        assert!(!loaded.is_csr());
    }

    #[test]
    fn test_load_accepts_csr() {
        let original = signed_csr();
        let mut loaded = Ecp256Certificate::default();
        loaded.load(original.bytes()).unwrap();
        assert!(loaded.is_csr());
        assert_eq!(loaded.subject().organization.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_load_csr_clears_certificate_fields() {
        let mut model = signed_cert();
        model.load(signed_csr().bytes()).unwrap();

        assert!(model.is_csr());
        assert!(model.serial_number().is_none());
        assert_eq!(model.validity(), &ValidityPeriod::default());
        assert_eq!(model.issuer(), model.subject());
        assert!(model.authority_key_id.is_none());
    }

    #[test]
    fn test_load_certificate_replaces_authority_key_identifier() {
        let mut model = Ecp256Certificate::default();
        model.set_authority_key_identifier(vec![0xAA; KEY_IDENTIFIER_LENGTH]);
        model.load(signed_cert().bytes()).unwrap();

        assert_eq!(model.authority_key_id, Some(key_identifier(&public_key())));
    }

    fn csr_tbs_with_common_name(length: usize) -> SeResult<Ecp256Certificate> {
        let subject = DistinguishedName::with_common_name("x".repeat(length));
        let mut cert = Ecp256Certificate::new(subject);
        cert.set_public_key(&public_key())?;
        cert.build_csr()?;
        Ok(cert)
    }

    #[test]
    fn test_encoding_limit_is_1024_bytes() {
        let length = (700..1000)
            .find(|n| {
                csr_tbs_with_common_name(*n).map(|c| c.length()).ok() == Some(CERT_BUFFER_LENGTH)
            })
            .expect("a common name yielding exactly 1024 bytes");

        let err = csr_tbs_with_common_name(length + 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingFailure);
        assert!(matches!(
            err,
            SeError::Encoding(EncodingError::TooLarge { length: 1025, limit: 1024 })
        ));
    }

    #[test]
    fn test_load_erased_slot_is_absent() {
        let mut cert = Ecp256Certificate::default();
        assert!(matches!(
            cert.load(&[0xFF; 72]),
            Err(SeError::Encoding(EncodingError::Absent))
        ));
        assert!(matches!(
            cert.load(&[]),
            Err(SeError::Encoding(EncodingError::Absent))
        ));
    }

    #[test]
    fn test_load_garbage_is_malformed() {
        let mut cert = Ecp256Certificate::default();
        let err = cert.load(&[0x30, 0x03, 0x02, 0x01]).unwrap_err();
        assert!(matches!(err, SeError::Encoding(_)));
    }

    #[test]
    fn test_pem_export() {
        assert!(signed_csr()
            .to_pem()
            .unwrap()
            .starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
        assert!(signed_cert()
            .to_pem()
            .unwrap()
            .starts_with("-----BEGIN CERTIFICATE-----"));
    }
}
