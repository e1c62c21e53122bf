//! Deterministic in-memory management controller used for dry runs and tests.
//!
//! Every simulated server lives in a process-wide registry keyed by asset id.
//! Records are created lazily with factory defaults and never removed. The
//! registry map and each record have their own lock, and every operation does
//! its read-resolve-write under the record lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use serde::Serialize;
use uuid::Uuid;

use crate::error::BmcError;
use crate::model::Asset;

use super::clock::{Clock, SystemClock};
use super::traits::{BmcSession, BmcSessionFactory};
use super::types::{BootDevice, PowerAction, PowerState};

/// Time a soft reset takes before the host reports `on` again.
pub const RESET_DURATION_SECS: i64 = 30;
/// Time a hard power cycle takes before the host reports `on` again.
pub const CYCLE_DURATION_SECS: i64 = 20;

const DEFAULT_BOOT_DEVICE: &str = "disk";

lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<DryRunRegistry> =
        Arc::new(DryRunRegistry::new(Arc::new(SystemClock)));
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulatedServer {
    pub power_state: PowerState,
    pub boot_device: String,
    pub previous_boot_device: String,
    pub persistent: bool,
    pub efi_boot: bool,
    /// When an in-flight reset or cycle completes.
    pub transition_due: DateTime<Utc>,
}

impl SimulatedServer {
    fn defaults(now: DateTime<Utc>) -> Self {
        Self {
            power_state: PowerState::On,
            boot_device: DEFAULT_BOOT_DEVICE.to_string(),
            previous_boot_device: DEFAULT_BOOT_DEVICE.to_string(),
            persistent: true,
            efi_boot: false,
            transition_due: now,
        }
    }

    fn resolve(&mut self, now: DateTime<Utc>) {
        let in_flight = matches!(self.power_state, PowerState::Resetting | PowerState::Cycling);
        if in_flight && now > self.transition_due {
            self.power_state = PowerState::On;
            if !self.persistent {
                self.boot_device = self.previous_boot_device.clone();
            }
        }
    }

    fn apply_power(&mut self, action: PowerAction, now: DateTime<Utc>) {
        match action {
            PowerAction::Reset => {
                self.power_state = PowerState::Resetting;
                self.transition_due = now + Duration::seconds(RESET_DURATION_SECS);
            }
            PowerAction::Cycle => {
                self.power_state = PowerState::Cycling;
                self.transition_due = now + Duration::seconds(CYCLE_DURATION_SECS);
            }
            PowerAction::On => self.power_state = PowerState::On,
            PowerAction::Off | PowerAction::Soft => self.power_state = PowerState::Off,
        }
    }
}

pub struct DryRunRegistry {
    clock: Arc<dyn Clock>,
    servers: Mutex<HashMap<Uuid, Arc<Mutex<SimulatedServer>>>>,
}

impl DryRunRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            servers: Mutex::new(HashMap::new()),
        }
    }

    /// Registry shared by every dry-run session in the process.
    pub fn global() -> Arc<DryRunRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns the record for `id`, creating it with defaults on first use.
    pub fn ensure(&self, id: Uuid) -> Arc<Mutex<SimulatedServer>> {
        let mut servers = lock(&self.servers);
        servers
            .entry(id)
            .or_insert_with(|| {
                tracing::debug!(target: "bioscfg.dryrun", asset_id = %id, "registering simulated server");
                Arc::new(Mutex::new(SimulatedServer::defaults(self.clock.now())))
            })
            .clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<Mutex<SimulatedServer>>> {
        lock(&self.servers).get(&id).cloned()
    }

    /// Seeds a record, replacing whatever was there.
    pub fn insert(&self, id: Uuid, server: SimulatedServer) {
        lock(&self.servers).insert(id, Arc::new(Mutex::new(server)));
    }

    /// Resolved view of a record. Resolution is written back, same as a read
    /// through a session.
    pub fn snapshot(&self, id: Uuid) -> Option<SimulatedServer> {
        let record = self.get(id)?;
        let mut server = lock(&record);
        server.resolve(self.clock.now());
        Some(server.clone())
    }

    pub fn len(&self) -> usize {
        lock(&self.servers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Open,
    Closed,
}

/// Simulated session for one asset.
pub struct DryRunBmc {
    registry: Arc<DryRunRegistry>,
    asset_id: Uuid,
    phase: Phase,
}

impl DryRunBmc {
    pub fn new(registry: Arc<DryRunRegistry>, asset_id: Uuid) -> Self {
        Self {
            registry,
            asset_id,
            phase: Phase::Created,
        }
    }

    fn guard(&self) -> Result<(), BmcError> {
        match self.phase {
            Phase::Open => Ok(()),
            Phase::Created => Err(BmcError::NotOpen),
            Phase::Closed => Err(BmcError::Closed),
        }
    }

    /// Runs `f` on the resolved record under its lock.
    fn with_server<R>(
        &self,
        f: impl FnOnce(&mut SimulatedServer, DateTime<Utc>) -> Result<R, BmcError>,
    ) -> Result<R, BmcError> {
        self.guard()?;
        let record = self
            .registry
            .get(self.asset_id)
            .ok_or_else(|| BmcError::UnknownAsset(self.asset_id.to_string()))?;
        let mut server = lock(&record);
        let now = self.registry.now();
        server.resolve(now);
        f(&mut server, now)
    }
}

#[async_trait]
impl BmcSession for DryRunBmc {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn open(&mut self) -> Result<(), BmcError> {
        match self.phase {
            Phase::Created => {}
            Phase::Open => return Ok(()),
            Phase::Closed => return Err(BmcError::Closed),
        }
        if self.registry.get(self.asset_id).is_none() {
            return Err(BmcError::UnknownAsset(self.asset_id.to_string()));
        }
        self.phase = Phase::Open;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BmcError> {
        self.guard()?;
        self.phase = Phase::Closed;
        Ok(())
    }

    async fn get_power_state(&mut self) -> Result<PowerState, BmcError> {
        self.with_server(|server, _| Ok(server.power_state.clone()))
    }

    async fn set_power_state(&mut self, action: PowerAction) -> Result<(), BmcError> {
        self.with_server(|server, now| {
            server.apply_power(action, now);
            tracing::debug!(
                target: "bioscfg.dryrun",
                action = %action,
                power_state = %server.power_state,
                "simulated power change"
            );
            Ok(())
        })
    }

    async fn get_boot_device(&mut self) -> Result<BootDevice, BmcError> {
        self.with_server(|server, _| {
            if !server.power_state.is_on() {
                return Err(BmcError::Offline);
            }
            Ok(BootDevice::new(
                server.boot_device.clone(),
                server.persistent,
                server.efi_boot,
            ))
        })
    }

    async fn set_boot_device(
        &mut self,
        device: &str,
        persistent: bool,
        efi_boot: bool,
    ) -> Result<(), BmcError> {
        self.with_server(|server, _| {
            if !server.power_state.is_on() {
                return Err(BmcError::Offline);
            }
            server.previous_boot_device = std::mem::replace(&mut server.boot_device, device.to_string());
            server.persistent = persistent;
            server.efi_boot = efi_boot;
            Ok(())
        })
    }

    async fn power_cycle_bmc(&mut self) -> Result<(), BmcError> {
        self.guard()
    }

    async fn host_booted(&mut self) -> Result<bool, BmcError> {
        self.with_server(|server, _| Ok(server.power_state.is_on()))
    }

    async fn reset_bios_config(&mut self) -> Result<(), BmcError> {
        self.with_server(|server, now| {
            *server = SimulatedServer::defaults(now);
            server.apply_power(PowerAction::Cycle, now);
            Ok(())
        })
    }

    async fn set_bios_config_from_file(&mut self, content: &str) -> Result<(), BmcError> {
        self.with_server(|_, _| {
            tracing::debug!(target: "bioscfg.dryrun", bytes = content.len(), "simulated bios config applied");
            Ok(())
        })
    }
}

/// Hands out simulated sessions, registering unseen assets with defaults.
pub struct DryRunFactory {
    registry: Arc<DryRunRegistry>,
}

impl DryRunFactory {
    pub fn new(registry: Arc<DryRunRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<DryRunRegistry> {
        &self.registry
    }
}

impl Default for DryRunFactory {
    fn default() -> Self {
        Self::new(DryRunRegistry::global())
    }
}

impl BmcSessionFactory for DryRunFactory {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn session_for(&self, asset: &Asset) -> Result<Box<dyn BmcSession>, BmcError> {
        self.registry.ensure(asset.id);
        Ok(Box::new(DryRunBmc::new(self.registry.clone(), asset.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bmc::clock::ManualClock;
    use pretty_assertions::assert_eq;

    fn setup() -> (Arc<ManualClock>, Arc<DryRunRegistry>, Uuid) {
        let clock = Arc::new(ManualClock::default());
        let registry = Arc::new(DryRunRegistry::new(clock.clone()));
        let id = Uuid::new_v4();
        registry.ensure(id);
        (clock, registry, id)
    }

    async fn open(registry: &Arc<DryRunRegistry>, id: Uuid) -> DryRunBmc {
        let mut bmc = DryRunBmc::new(registry.clone(), id);
        bmc.open().await.unwrap();
        bmc
    }

    #[tokio::test]
    async fn new_servers_start_with_defaults() {
        let (_clock, registry, id) = setup();
        let mut bmc = open(&registry, id).await;
        assert_eq!(bmc.get_power_state().await.unwrap(), PowerState::On);
        assert_eq!(
            bmc.get_boot_device().await.unwrap(),
            BootDevice::new("disk", true, false)
        );
    }

    #[tokio::test]
    async fn reset_resolves_after_thirty_seconds_and_reverts_boot_device() {
        let (clock, registry, id) = setup();
        let mut bmc = open(&registry, id).await;

        bmc.set_boot_device("pxe", false, true).await.unwrap();
        bmc.set_power_state(PowerAction::Reset).await.unwrap();

        clock.advance(Duration::seconds(10));
        assert_eq!(bmc.get_power_state().await.unwrap(), PowerState::Resetting);
        assert_eq!(bmc.get_boot_device().await, Err(BmcError::Offline));

        clock.advance(Duration::seconds(21));
        assert_eq!(bmc.get_power_state().await.unwrap(), PowerState::On);
        assert_eq!(
            bmc.get_boot_device().await.unwrap(),
            BootDevice::new("disk", false, true)
        );

        // resolution was written back
        let snap = registry.snapshot(id).unwrap();
        assert_eq!(snap.power_state, PowerState::On);
        assert_eq!(snap.boot_device, "disk");
    }

    #[tokio::test]
    async fn persistent_boot_device_survives_cycle() {
        let (clock, registry, id) = setup();
        let mut bmc = open(&registry, id).await;

        bmc.set_boot_device("cdrom", true, false).await.unwrap();
        bmc.set_power_state(PowerAction::Cycle).await.unwrap();

        clock.advance(Duration::seconds(19));
        assert_eq!(bmc.get_power_state().await.unwrap(), PowerState::Cycling);
        clock.advance(Duration::seconds(2));
        assert_eq!(bmc.get_power_state().await.unwrap(), PowerState::On);
        assert_eq!(bmc.get_boot_device().await.unwrap().device, "cdrom");
    }

    #[tokio::test]
    async fn offline_server_rejects_boot_device_change_without_mutation() {
        let (_clock, registry, id) = setup();
        let mut bmc = open(&registry, id).await;

        bmc.set_power_state(PowerAction::Off).await.unwrap();
        let before = registry.snapshot(id).unwrap();

        assert_eq!(
            bmc.set_boot_device("pxe", false, true).await,
            Err(BmcError::Offline)
        );
        assert_eq!(registry.snapshot(id).unwrap(), before);
        assert!(!bmc.host_booted().await.unwrap());
    }

    #[tokio::test]
    async fn reset_bios_restores_defaults_and_cycles() {
        let (clock, registry, id) = setup();
        let mut bmc = open(&registry, id).await;

        bmc.set_boot_device("pxe", true, true).await.unwrap();
        bmc.reset_bios_config().await.unwrap();
        assert_eq!(bmc.get_power_state().await.unwrap(), PowerState::Cycling);

        clock.advance(Duration::seconds(CYCLE_DURATION_SECS + 1));
        assert_eq!(
            bmc.get_boot_device().await.unwrap(),
            BootDevice::new("disk", true, false)
        );
    }

    #[tokio::test]
    async fn soft_powers_off() {
        let (_clock, registry, id) = setup();
        let mut bmc = open(&registry, id).await;
        bmc.set_power_state(PowerAction::Soft).await.unwrap();
        assert_eq!(bmc.get_power_state().await.unwrap(), PowerState::Off);
        bmc.set_power_state(PowerAction::On).await.unwrap();
        assert!(bmc.host_booted().await.unwrap());
    }

    #[tokio::test]
    async fn unknown_asset_is_rejected() {
        let registry = Arc::new(DryRunRegistry::new(Arc::new(ManualClock::default())));
        let id = Uuid::new_v4();
        let mut bmc = DryRunBmc::new(registry, id);
        assert_eq!(bmc.open().await, Err(BmcError::UnknownAsset(id.to_string())));
    }

    #[tokio::test]
    async fn session_lifecycle_is_enforced() {
        let (_clock, registry, id) = setup();
        let mut bmc = DryRunBmc::new(registry, id);

        assert_eq!(bmc.get_power_state().await, Err(BmcError::NotOpen));
        bmc.open().await.unwrap();
        bmc.close().await.unwrap();
        assert_eq!(bmc.get_power_state().await, Err(BmcError::Closed));
        assert_eq!(bmc.close().await, Err(BmcError::Closed));
        assert_eq!(bmc.open().await, Err(BmcError::Closed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sessions_keep_the_record_consistent() {
        const DEVICES: [&str; 3] = ["pxe", "cdrom", "bios"];
        let (clock, registry, id) = setup();

        let mut workers = tokio::task::JoinSet::new();
        for n in 0..16usize {
            let registry = registry.clone();
            let clock = clock.clone();
            workers.spawn(async move {
                let device = DEVICES[n % DEVICES.len()];
                let mut bmc = open(&registry, id).await;
                let mut boot_writes = 0usize;
                let mut observed = Vec::new();
                for round in 0..8 {
                    match bmc.set_boot_device(device, round % 2 == 0, false).await {
                        Ok(()) => boot_writes += 1,
                        Err(e) => assert_eq!(e, BmcError::Offline),
                    }
                    observed.push(bmc.get_power_state().await.unwrap());
                    bmc.set_power_state(PowerAction::Cycle).await.unwrap();
                    observed.push(bmc.get_power_state().await.unwrap());
                    if round % 3 == 0 {
                        clock.advance(Duration::seconds(CYCLE_DURATION_SECS + 1));
                    }
                    tokio::task::yield_now().await;
                }
                bmc.close().await.unwrap();
                (boot_writes, observed)
            });
        }

        let mut boot_writes = 0;
        while let Some(joined) = workers.join_next().await {
            let (writes, observed) = joined.unwrap();
            boot_writes += writes;
            for state in observed {
                assert!(
                    matches!(state, PowerState::On | PowerState::Cycling),
                    "unexpected power state {state}"
                );
            }
        }
        // the first locked operation on the record is always a boot write
        // against a powered-on host
        assert!(boot_writes >= 1);

        let known = |d: &str| d == DEFAULT_BOOT_DEVICE || DEVICES.contains(&d);
        let snap = registry.snapshot(id).unwrap();
        assert!(known(&snap.previous_boot_device), "{snap:?}");
        assert!(known(&snap.boot_device), "{snap:?}");
        assert!(matches!(snap.power_state, PowerState::On | PowerState::Cycling));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn factory_registers_lazily_and_shares_state() {
        let clock = Arc::new(ManualClock::default());
        let factory = DryRunFactory::new(Arc::new(DryRunRegistry::new(clock)));
        let asset = Asset::new(Uuid::new_v4());
        assert!(factory.registry().is_empty());

        let mut first = factory.session_for(&asset).unwrap();
        first.open().await.unwrap();
        first.set_power_state(PowerAction::Off).await.unwrap();
        first.close().await.unwrap();

        let mut second = factory.session_for(&asset).unwrap();
        second.open().await.unwrap();
        assert_eq!(second.get_power_state().await.unwrap(), PowerState::Off);
        assert_eq!(factory.registry().len(), 1);
    }
}
