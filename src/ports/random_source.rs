use crate::error::SeResult;

/// Capability to draw bytes from the hardware RNG
pub trait RandomSource {
    fn random_bytes(&mut self, buffer: &mut [u8]) -> SeResult<()>;
}
