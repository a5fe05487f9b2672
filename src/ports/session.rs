//! Session and identity capabilities

use crate::error::SeResult;

/// Capability to open and close the hardware session
///
/// Every other backend operation fails with
/// [`DeviceError::SessionNotStarted`](crate::error::DeviceError::SessionNotStarted)
/// while no session is open.
pub trait Session {
    /// Open the session; calling it on an open session is a no-op
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Unreachable` if the device does not answer.
    fn begin(&mut self) -> SeResult<()>;

    /// Close the session; calling it on a closed session is a no-op
    fn end(&mut self) -> SeResult<()>;

    fn is_active(&self) -> bool;
}

/// Capability to report the device's unique identifier
pub trait DeviceIdentity {
    /// Raw unique identifier (9 bytes on ECCX08, 18 bytes on SE05X)
    fn serial_number(&mut self) -> SeResult<Vec<u8>>;
}
