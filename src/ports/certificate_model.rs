//! CertificateModel trait - the encoding collaborator of the builders

use crate::error::SeResult;
use crate::model::{PublicKey, Signature};

/// In-memory CSR or certificate filled in step by step by the builders
///
/// Before a `sign_*` call, [`bytes`](CertificateModel::bytes) is the
/// to-be-signed structure whose SHA-256 digest gets signed; afterwards it is
/// the complete encoding.
pub trait CertificateModel {
    fn set_public_key(&mut self, key: &PublicKey) -> SeResult<()>;

    fn public_key(&self) -> Option<&PublicKey>;

    /// Assemble the unsigned certificate signing request
    fn build_csr(&mut self) -> SeResult<()>;

    /// Assemble the unsigned device certificate
    fn build_cert(&mut self) -> SeResult<()>;

    fn bytes(&self) -> &[u8];

    fn length(&self) -> usize {
        self.bytes().len()
    }

    fn sign_csr(&mut self, signature: &Signature) -> SeResult<()>;

    fn sign_cert(&mut self, signature: &Signature) -> SeResult<()>;

    fn signature(&self) -> Option<&Signature>;

    fn is_signed(&self) -> bool;

    /// Reconstruct the model from bytes read out of a storage slot
    ///
    /// # Errors
    ///
    /// Returns `EncodingError` if the bytes are absent or malformed.
    fn load(&mut self, bytes: &[u8]) -> SeResult<()>;
}
