use async_trait::async_trait;
use thiserror::Error;

use crate::bmc::{BmcSession, PowerState};
use crate::error::BmcError;

use super::source::FetchError;

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Bmc(#[from] BmcError),
    #[error("missing {0} from an earlier step")]
    MissingData(&'static str),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{0}")]
    Config(String),
}

/// Values steps hand to later steps within one run. Created empty for every
/// run and dropped with it.
#[derive(Debug, Default, Clone)]
pub struct StepContext {
    pub power_state: Option<PowerState>,
    pub bios_config: Option<String>,
}

impl StepContext {
    pub fn power_state(&self) -> Result<&PowerState, StepError> {
        self.power_state
            .as_ref()
            .ok_or(StepError::MissingData("power state"))
    }

    pub fn bios_config(&self) -> Result<&str, StepError> {
        self.bios_config
            .as_deref()
            .ok_or(StepError::MissingData("bios config"))
    }
}

/// One unit of work inside a task plan. Returns a human readable detail line
/// on success.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;
    async fn run(
        &self,
        session: &mut dyn BmcSession,
        ctx: &mut StepContext,
    ) -> Result<String, StepError>;
}
