//! The concrete steps bios control plans are built from.

use std::sync::Arc;

use async_trait::async_trait;

use crate::bmc::{BmcSession, PowerAction};

use super::source::BiosConfigSource;
use super::step::{Step, StepContext, StepError};

/// Reads the host power state and remembers it for [`ServerReboot`].
pub struct GetServerPowerState;

#[async_trait]
impl Step for GetServerPowerState {
    fn name(&self) -> &str {
        "GetServerPowerState"
    }

    async fn run(
        &self,
        session: &mut dyn BmcSession,
        ctx: &mut StepContext,
    ) -> Result<String, StepError> {
        let state = session.get_power_state().await?;
        let details = format!("Current power state: {state}");
        ctx.power_state = Some(state);
        Ok(details)
    }
}

pub struct BiosReset;

#[async_trait]
impl Step for BiosReset {
    fn name(&self) -> &str {
        "BiosReset"
    }

    async fn run(
        &self,
        session: &mut dyn BmcSession,
        _ctx: &mut StepContext,
    ) -> Result<String, StepError> {
        session.reset_bios_config().await?;
        Ok("BIOS settings reset".to_string())
    }
}

/// Reboots the host only if it was on before the plan started.
pub struct ServerReboot;

#[async_trait]
impl Step for ServerReboot {
    fn name(&self) -> &str {
        "ServerReboot"
    }

    async fn run(
        &self,
        session: &mut dyn BmcSession,
        ctx: &mut StepContext,
    ) -> Result<String, StepError> {
        let state = ctx.power_state()?.clone();
        if state.is_on() {
            tracing::info!(target: "bioscfg.runner", power_state = %state, "rebooting server");
            session.set_power_state(PowerAction::Reset).await?;
            Ok("Rebooting server".to_string())
        } else {
            tracing::info!(target: "bioscfg.runner", power_state = %state, "skipping server reboot");
            Ok("Reboot not required".to_string())
        }
    }
}

pub struct FetchBiosConfig {
    source: Arc<dyn BiosConfigSource>,
    url: Option<String>,
}

impl FetchBiosConfig {
    pub fn new(source: Arc<dyn BiosConfigSource>, url: Option<String>) -> Self {
        Self { source, url }
    }
}

#[async_trait]
impl Step for FetchBiosConfig {
    fn name(&self) -> &str {
        "FetchBiosConfig"
    }

    async fn run(
        &self,
        _session: &mut dyn BmcSession,
        ctx: &mut StepContext,
    ) -> Result<String, StepError> {
        let url = match self.url.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => u,
            _ => return Err(StepError::Config("no BIOS config URL was found".to_string())),
        };

        let body = self.source.fetch(url).await?;
        tracing::debug!(
            target: "bioscfg.runner",
            source = self.source.name(),
            bytes = body.len(),
            "fetched bios config"
        );
        ctx.bios_config = Some(body);
        Ok("got bios config from url".to_string())
    }
}

/// Applies the body fetched by [`FetchBiosConfig`] verbatim.
pub struct SetBiosConfig;

#[async_trait]
impl Step for SetBiosConfig {
    fn name(&self) -> &str {
        "SetBiosConfig"
    }

    async fn run(
        &self,
        session: &mut dyn BmcSession,
        ctx: &mut StepContext,
    ) -> Result<String, StepError> {
        let content = ctx.bios_config()?;
        session.set_bios_config_from_file(content).await?;
        Ok("BIOS config set".to_string())
    }
}
