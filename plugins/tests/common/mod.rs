#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bioscfg_core::bmc::{DryRunFactory, DryRunRegistry, ManualClock};
use bioscfg_core::config::FetchConfig;
use bioscfg_core::inventory::InMemoryRepository;
use bioscfg_core::model::{Asset, BiosControlParameters, GenericTask, BIOS_CONTROL_KIND};
use bioscfg_core::runner::{PublishPolicy, StatusPublisher, StatusUpdate};
use bioscfg_core::{Services, TaskHandler};
use bioscfg_plugins::fetch::HttpConfigSource;
use uuid::Uuid;

#[derive(Default)]
pub struct RecordingPublisher {
    updates: Mutex<Vec<StatusUpdate>>,
}

impl RecordingPublisher {
    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusPublisher for RecordingPublisher {
    fn name(&self) -> &str {
        "recording"
    }

    async fn publish(&self, update: &StatusUpdate) -> anyhow::Result<()> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

pub fn asset() -> Asset {
    Asset {
        bmc_address: "10.10.0.5".into(),
        bmc_username: "root".into(),
        bmc_password: "calvin".into(),
        facility_code: "sandbox".into(),
        ..Asset::new(Uuid::new_v4())
    }
}

pub struct Rig {
    pub asset: Asset,
    pub registry: Arc<DryRunRegistry>,
    pub handler: TaskHandler,
}

/// Dry-run BMC with a real HTTP config source.
pub fn rig(publisher: Arc<dyn StatusPublisher>) -> Rig {
    let asset = asset();
    let registry = Arc::new(DryRunRegistry::new(Arc::new(ManualClock::default())));
    let source = HttpConfigSource::new(&FetchConfig {
        timeout_ms: 2_000,
        max_bytes: 64 * 1024,
    })
    .unwrap();

    let services = Services {
        repository: Arc::new(InMemoryRepository::new([asset.clone()])),
        bmc: Arc::new(DryRunFactory::new(registry.clone())),
        publisher,
        config_source: Arc::new(source),
    };

    Rig {
        asset,
        registry,
        handler: TaskHandler::new(services, PublishPolicy::new(2, 0)),
    }
}

pub fn envelope(params: &BiosControlParameters) -> GenericTask {
    let mut task = GenericTask::new(BIOS_CONTROL_KIND, serde_json::to_value(params).unwrap());
    task.facility_code = "sandbox".into();
    task
}
