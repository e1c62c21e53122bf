use async_trait::async_trait;

use crate::error::BmcError;
use crate::model::Asset;

use super::types::{BootDevice, PowerAction, PowerState};

/// A stateful session with one server's management controller.
///
/// Callers open before anything else and close exactly once. Implementations
/// answer with [`BmcError::NotOpen`] before `open` and [`BmcError::Closed`]
/// after `close`.
#[async_trait]
pub trait BmcSession: Send {
    fn name(&self) -> &str;

    async fn open(&mut self) -> Result<(), BmcError>;
    async fn close(&mut self) -> Result<(), BmcError>;

    async fn get_power_state(&mut self) -> Result<PowerState, BmcError>;
    async fn set_power_state(&mut self, action: PowerAction) -> Result<(), BmcError>;

    async fn get_boot_device(&mut self) -> Result<BootDevice, BmcError>;
    async fn set_boot_device(
        &mut self,
        device: &str,
        persistent: bool,
        efi_boot: bool,
    ) -> Result<(), BmcError>;

    async fn power_cycle_bmc(&mut self) -> Result<(), BmcError>;
    async fn host_booted(&mut self) -> Result<bool, BmcError>;

    async fn reset_bios_config(&mut self) -> Result<(), BmcError>;
    async fn set_bios_config_from_file(&mut self, content: &str) -> Result<(), BmcError>;
}

/// Builds one fresh session per task.
pub trait BmcSessionFactory: Send + Sync {
    fn name(&self) -> &str;
    fn session_for(&self, asset: &Asset) -> Result<Box<dyn BmcSession>, BmcError>;
}
