use std::sync::Arc;

use crate::error::WorkerError;
use crate::model::{Action, BiosControlParameters};

use super::source::BiosConfigSource;
use super::step::Step;
use super::steps::{BiosReset, FetchBiosConfig, GetServerPowerState, ServerReboot, SetBiosConfig};

pub const RESET_PLAN: &str = "BiosResetSettings";
pub const SET_CONFIG_PLAN: &str = "BiosSetConfig";

/// Named, ordered list of steps selected by the task action.
pub struct TaskPlan {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl TaskPlan {
    pub fn new(name: impl Into<String>, steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn reset_config() -> Self {
        Self::new(
            RESET_PLAN,
            vec![
                Box::new(GetServerPowerState),
                Box::new(BiosReset),
                Box::new(ServerReboot),
            ],
        )
    }

    pub fn set_config(source: Arc<dyn BiosConfigSource>, url: Option<String>) -> Self {
        Self::new(
            SET_CONFIG_PLAN,
            vec![
                Box::new(FetchBiosConfig::new(source, url)),
                Box::new(SetBiosConfig),
            ],
        )
    }

    pub fn for_parameters(
        params: &BiosControlParameters,
        source: Arc<dyn BiosConfigSource>,
    ) -> Result<Self, WorkerError> {
        match &params.action {
            Action::ResetConfig => Ok(Self::reset_config()),
            Action::SetConfig => Ok(Self::set_config(source, params.bios_config_url.clone())),
            Action::Other(other) => Err(WorkerError::UnsupportedAction(other.clone())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Box<dyn Step>] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }
}
