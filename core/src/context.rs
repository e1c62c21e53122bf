use std::sync::Arc;

use crate::bmc::BmcSessionFactory;
use crate::config::AppConfig;
use crate::error::WorkerError;
use crate::inventory::AssetRepository;
use crate::runner::{BiosConfigSource, StatusPublisher};

/// External collaborators a task handler needs.
#[derive(Clone)]
pub struct Services {
    pub repository: Arc<dyn AssetRepository>,
    pub bmc: Arc<dyn BmcSessionFactory>,
    pub publisher: Arc<dyn StatusPublisher>,
    pub config_source: Arc<dyn BiosConfigSource>,
}

#[async_trait::async_trait]
pub trait ServicesFactory: Send + Sync {
    async fn build_services(&self, cfg: &AppConfig) -> Result<Services, WorkerError>;
}

#[derive(Clone)]
pub struct AppContext {
    cfg: AppConfig,
    services_factory: Option<Arc<dyn ServicesFactory>>,
}

impl AppContext {
    pub fn new(cfg: AppConfig, services_factory: Option<Arc<dyn ServicesFactory>>) -> Self {
        Self {
            cfg,
            services_factory,
        }
    }

    pub fn cfg(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn with_config(&self, cfg: AppConfig) -> Self {
        Self {
            cfg,
            services_factory: self.services_factory.clone(),
        }
    }

    pub async fn build_services(&self) -> Result<Services, WorkerError> {
        let Some(factory) = self.services_factory.as_ref() else {
            return Err(WorkerError::Config(
                "services_factory missing (cannot build plugins/services)".into(),
            ));
        };
        factory.build_services(&self.cfg).await
    }
}
