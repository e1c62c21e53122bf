#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bioscfg_core::bmc::{DryRunFactory, DryRunRegistry, ManualClock};
use bioscfg_core::inventory::InMemoryRepository;
use bioscfg_core::model::{Asset, BiosControlParameters, GenericTask, State, BIOS_CONTROL_KIND};
use bioscfg_core::runner::{BiosConfigSource, FetchError, PublishPolicy, StatusPublisher, StatusUpdate};
use bioscfg_core::{Services, TaskHandler};
use uuid::Uuid;

#[derive(Default)]
pub struct RecordingPublisher {
    updates: Mutex<Vec<StatusUpdate>>,
}

impl RecordingPublisher {
    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.lock().unwrap().clone()
    }

    /// (state, newest status log line) for every publish, in order.
    pub fn trail(&self) -> Vec<(State, String)> {
        self.updates()
            .iter()
            .map(|u| {
                (
                    u.state,
                    u.task.status.last().unwrap_or_default().to_string(),
                )
            })
            .collect()
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

pub struct StaticSource(pub Result<String, FetchError>);

#[async_trait]
impl BiosConfigSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        self.0.clone()
    }
}

pub struct Harness {
    pub asset: Asset,
    pub clock: Arc<ManualClock>,
    pub registry: Arc<DryRunRegistry>,
    pub publisher: Arc<RecordingPublisher>,
    pub handler: TaskHandler,
}

pub fn asset() -> Asset {
    Asset {
        bmc_address: "10.10.0.5".into(),
        bmc_username: "root".into(),
        bmc_password: "calvin".into(),
        vendor: "dell".into(),
        model: "r6515".into(),
        serial: "F00BA7".into(),
        facility_code: "sandbox".into(),
        ..Asset::new(Uuid::new_v4())
    }
}

pub fn harness(source: StaticSource) -> Harness {
    let asset = asset();
    let clock = Arc::new(ManualClock::default());
    let registry = Arc::new(DryRunRegistry::new(clock.clone()));
    let publisher = Arc::new(RecordingPublisher::default());

    let services = Services {
        repository: Arc::new(InMemoryRepository::new([asset.clone()])),
        bmc: Arc::new(DryRunFactory::new(registry.clone())),
        publisher: publisher.clone(),
        config_source: Arc::new(source),
    };

    Harness {
        asset,
        clock,
        registry,
        publisher,
        handler: TaskHandler::new(services, PublishPolicy::new(2, 0)),
    }
}

pub fn envelope(params: &BiosControlParameters) -> GenericTask {
    let mut task = GenericTask::new(BIOS_CONTROL_KIND, serde_json::to_value(params).unwrap());
    task.facility_code = "sandbox".into();
    task
}
