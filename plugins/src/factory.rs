use std::sync::Arc;

use anyhow::Result;

use bioscfg_core::bmc::{BmcSessionFactory, DryRunFactory};
use bioscfg_core::config::{AppConfig, InventoryProvider};
use bioscfg_core::inventory::{AssetRepository, InMemoryRepository};
use bioscfg_core::runner::{BiosConfigSource, StatusPublisher};

use crate::bmc::RedfishFactory;
use crate::fetch::HttpConfigSource;
use crate::inventory::FleetDbRepository;
use crate::publish::{JsonlPublisher, LogPublisher, LOG_SINK};

pub fn build_repository(cfg: &AppConfig) -> Result<Arc<dyn AssetRepository>> {
    match &cfg.inventory.provider {
        InventoryProvider::FleetDb(fleetdb) => Ok(Arc::new(FleetDbRepository::new(fleetdb)?)),
        InventoryProvider::Static(assets) => {
            Ok(Arc::new(InMemoryRepository::new(assets.assets.clone())))
        }
    }
}

/// Dry-run sessions share the process-wide simulator registry.
pub fn build_bmc(cfg: &AppConfig) -> Result<Arc<dyn BmcSessionFactory>> {
    if cfg.dry_run {
        return Ok(Arc::new(DryRunFactory::default()));
    }
    Ok(Arc::new(RedfishFactory::new(&cfg.bmc)?))
}

pub async fn build_publisher(cfg: &AppConfig) -> Result<Arc<dyn StatusPublisher>> {
    let sink = cfg.publish.sink.trim();
    if sink == LOG_SINK {
        return Ok(Arc::new(LogPublisher));
    }
    Ok(Arc::new(
        JsonlPublisher::start(sink, cfg.publish.channel_capacity).await?,
    ))
}

pub fn build_config_source(cfg: &AppConfig) -> Result<Arc<dyn BiosConfigSource>> {
    Ok(Arc::new(HttpConfigSource::new(&cfg.fetch)?))
}
