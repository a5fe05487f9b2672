use crate::error::SeResult;
use crate::model::ConfigurationTable;

/// Capability to configure and lock the device
///
/// Lock state is `Unlocked -> Locked` and never goes back.
pub trait Configurator {
    fn locked(&mut self) -> SeResult<bool>;

    /// Irreversibly lock the device configuration
    ///
    /// # Errors
    ///
    /// Returns `KeySlotError::DeviceLocked` if the device is already locked.
    fn lock(&mut self) -> SeResult<()>;

    /// Write the one-time configuration table
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// - The device is locked (`KeySlotError::DeviceLocked`)
    /// - The table is larger than the configuration zone
    fn write_configuration(&mut self, config: &ConfigurationTable) -> SeResult<()>;

    /// Configuration table this family is provisioned with when the caller
    /// supplies none
    fn default_configuration(&self) -> ConfigurationTable;
}
