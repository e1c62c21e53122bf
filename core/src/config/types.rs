use serde::{Deserialize, Serialize};

use crate::error::WorkerError;
use crate::model::Asset;
use crate::runner::PublishPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Facility this worker serves. Required.
    #[serde(default)]
    pub facility_code: String,

    /// Upper bound on tasks running at once. `0` is treated as `1`.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Use the in-memory BMC simulator instead of real controllers.
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub bmc: BmcConfig,

    #[serde(default)]
    pub inventory: InventoryConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,
}

fn default_concurrency() -> usize {
    1
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            facility_code: String::new(),
            concurrency: default_concurrency(),
            dry_run: false,
            logging: LoggingConfig::default(),
            bmc: BmcConfig::default(),
            inventory: InventoryConfig::default(),
            fetch: FetchConfig::default(),
            publish: PublishConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Coerces out-of-range knobs and rejects what cannot be coerced.
    pub fn normalize(&mut self) -> Result<(), WorkerError> {
        if self.facility_code.trim().is_empty() {
            return Err(WorkerError::Config("facility_code is required".into()));
        }
        if self.concurrency == 0 {
            self.concurrency = 1;
        }
        if self.publish.terminal_attempts == 0 {
            self.publish.terminal_attempts = 1;
        }
        if let InventoryProvider::FleetDb(ref fleetdb) = self.inventory.provider {
            if fleetdb.endpoint.trim().is_empty() {
                return Err(WorkerError::Config("inventory.endpoint is required".into()));
            }
        }
        if self.publish.sink.trim().is_empty() {
            return Err(WorkerError::Config("publish.sink must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "bioscfg.runner=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BmcConfig {
    #[serde(default = "default_bmc_timeout_ms")]
    pub timeout_ms: u64,

    /// Accept self-signed controller certificates.
    #[serde(default = "default_insecure_tls")]
    pub insecure_tls: bool,

    #[serde(default = "default_bmc_scheme")]
    pub scheme: String,
}

fn default_bmc_timeout_ms() -> u64 {
    30_000
}

fn default_insecure_tls() -> bool {
    true
}

fn default_bmc_scheme() -> String {
    "https".to_string()
}

impl Default for BmcConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_bmc_timeout_ms(),
            insecure_tls: default_insecure_tls(),
            scheme: default_bmc_scheme(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(flatten)]
    pub provider: InventoryProvider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider")]
pub enum InventoryProvider {
    #[serde(rename = "fleetdb")]
    FleetDb(FleetDbConfig),
    #[serde(rename = "static")]
    Static(StaticInventoryConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetDbConfig {
    #[serde(default = "default_fleetdb_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_inventory_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_fleetdb_endpoint() -> String {
    "http://localhost:8000".to_string()
}

fn default_inventory_timeout_ms() -> u64 {
    10_000
}

impl Default for FleetDbConfig {
    fn default() -> Self {
        Self {
            endpoint: default_fleetdb_endpoint(),
            token: String::new(),
            timeout_ms: default_inventory_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticInventoryConfig {
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            provider: InventoryProvider::FleetDb(FleetDbConfig::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_fetch_max_bytes")]
    pub max_bytes: usize,
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

fn default_fetch_max_bytes() -> usize {
    1024 * 1024
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_fetch_timeout_ms(),
            max_bytes: default_fetch_max_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// `log`, `stdout:` or a file path for JSON lines.
    #[serde(default = "default_publish_sink")]
    pub sink: String,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_terminal_attempts")]
    pub terminal_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_publish_sink() -> String {
    "stdout:".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_terminal_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            sink: default_publish_sink(),
            channel_capacity: default_channel_capacity(),
            terminal_attempts: default_terminal_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl PublishConfig {
    pub fn policy(&self) -> PublishPolicy {
        PublishPolicy::new(self.terminal_attempts, self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_redeliver_attempts")]
    pub redeliver_attempts: u32,
    #[serde(default = "default_redeliver_delay_ms")]
    pub redeliver_delay_ms: u64,
}

fn default_redeliver_attempts() -> u32 {
    3
}

fn default_redeliver_delay_ms() -> u64 {
    2_000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            redeliver_attempts: default_redeliver_attempts(),
            redeliver_delay_ms: default_redeliver_delay_ms(),
        }
    }
}
