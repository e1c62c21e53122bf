//! Builds the handler's collaborators from configuration, for the CLI.
use async_trait::async_trait;
use bioscfg_core::config::AppConfig;
use bioscfg_core::context::{Services, ServicesFactory};
use bioscfg_core::WorkerError;

use crate::factory;

#[derive(Debug, Default, Clone, Copy)]
pub struct PluginServicesFactory;

fn config_error(err: anyhow::Error) -> WorkerError {
    WorkerError::Config(format!("{err:#}"))
}

#[async_trait]
impl ServicesFactory for PluginServicesFactory {
    async fn build_services(&self, cfg: &AppConfig) -> Result<Services, WorkerError> {
        let repository = factory::build_repository(cfg).map_err(config_error)?;
        let bmc = factory::build_bmc(cfg).map_err(config_error)?;
        let publisher = factory::build_publisher(cfg).await.map_err(config_error)?;
        let config_source = factory::build_config_source(cfg).map_err(config_error)?;

        tracing::debug!(
            target: "bioscfg.services",
            repository = repository.name(),
            bmc = bmc.name(),
            publisher = publisher.name(),
            config_source = config_source.name(),
            "services built"
        );

        Ok(Services {
            repository,
            bmc,
            publisher,
            config_source,
        })
    }
}
