//! One task against a private simulator, printing what the server looks like
//! afterwards.

use std::sync::Arc;

use bioscfg_core::bmc::{DryRunFactory, DryRunRegistry, ManualClock, PowerState, SimulatedServer};
use bioscfg_core::config::AppConfig;
use bioscfg_core::error::CliError;
use bioscfg_core::inventory::InMemoryRepository;
use bioscfg_core::model::{Asset, BiosControlParameters, GenericTask, State, BIOS_CONTROL_KIND};
use bioscfg_core::runner::Cancellation;
use bioscfg_core::{Services, TaskHandler};
use bioscfg_plugins::factory;
use serde::Serialize;
use uuid::Uuid;

use crate::commands::cli::{SimulateAction, SimulateArgs};

#[derive(Debug, Serialize)]
pub struct SimulationOutcome {
    pub task: GenericTask,
    pub status: serde_json::Value,
    pub server: Option<SimulatedServer>,
}

fn parameters(args: &SimulateArgs, asset_id: Uuid) -> Result<BiosControlParameters, CliError> {
    match args.action {
        SimulateAction::ResetConfig => Ok(BiosControlParameters::reset_config(asset_id)),
        SimulateAction::SetConfig => {
            let url = args
                .url
                .as_deref()
                .ok_or_else(|| CliError::Config("--url is required for set-config".into()))?;
            Ok(BiosControlParameters::set_config(asset_id, url))
        }
    }
}

pub async fn simulate(args: &SimulateArgs, cfg: &AppConfig) -> Result<SimulationOutcome, CliError> {
    let asset = Asset {
        bmc_address: "simulator".into(),
        facility_code: cfg.facility_code.clone(),
        ..Asset::new(args.asset.unwrap_or_else(Uuid::new_v4))
    };

    let clock = Arc::new(ManualClock::default());
    let registry = Arc::new(DryRunRegistry::new(clock.clone()));
    let server = registry.ensure(asset.id);
    if args.power_off {
        let mut server = server.lock().unwrap_or_else(|p| p.into_inner());
        server.power_state = PowerState::Off;
    }

    let services = Services {
        repository: Arc::new(InMemoryRepository::new([asset.clone()])),
        bmc: Arc::new(DryRunFactory::new(registry.clone())),
        publisher: factory::build_publisher(cfg).await?,
        config_source: factory::build_config_source(cfg)?,
    };
    let handler = TaskHandler::from_config(services, cfg).with_worker_id("bioscfg-simulate");

    let params = parameters(args, asset.id)?;
    let value = serde_json::to_value(&params).map_err(|e| CliError::Anyhow(e.into()))?;
    let mut envelope = GenericTask::new(BIOS_CONTROL_KIND, value);
    envelope.facility_code = cfg.facility_code.clone();

    let report = handler
        .handle_task(&envelope, &Cancellation::never())
        .await?;

    if args.elapsed_secs > 0 {
        clock.advance(chrono::Duration::seconds(args.elapsed_secs));
    }

    let task = report
        .task
        .to_generic()
        .map_err(CliError::Worker)?;
    Ok(SimulationOutcome {
        task,
        status: serde_json::to_value(&report.status).map_err(|e| CliError::Anyhow(e.into()))?,
        server: registry.snapshot(asset.id),
    })
}

pub async fn simulate_cmd(args: SimulateArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    let outcome = simulate(&args, cfg).await?;
    let out = serde_json::to_string_pretty(&outcome).map_err(|e| CliError::Anyhow(e.into()))?;
    println!("{out}");
    Ok(if outcome.task.state == State::Succeeded { 0 } else { 1 })
}
