use std::path::{Path, PathBuf};

use super::types::{AppConfig, InventoryProvider};

/// Get the default bioscfg data directory: ~/.bioscfg
pub fn get_bioscfg_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".bioscfg"))
}

pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))?;
    let cfg = toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("parse {}: {e}", path.display()))?;
    Ok(cfg)
}

/// Loads `explicit` if given, else `~/.bioscfg/config.toml`, else
/// `./config.toml`, else defaults. Environment overrides are applied last.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    load_with(explicit, get_bioscfg_data_dir)
}

/// The data dir is resolved only when a path under it is actually needed.
fn load_with(
    explicit: Option<&Path>,
    data_dir: impl Fn() -> anyhow::Result<PathBuf>,
) -> anyhow::Result<AppConfig> {
    let local_config = Path::new("config.toml");

    let mut cfg = if let Some(path) = explicit {
        load_from_path(path)?
    } else {
        let home_config = data_dir().ok().map(|dir| dir.join("config.toml"));
        match home_config {
            Some(home_config) if home_config.exists() => load_from_path(&home_config)?,
            _ if local_config.exists() => load_from_path(local_config)?,
            _ => AppConfig::default(),
        }
    };

    if cfg.logging.file
        && cfg
            .logging
            .directory
            .as_ref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    {
        let logs_dir = data_dir()?.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        cfg.logging.directory = Some(logs_dir.to_string_lossy().to_string());
    }

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    Ok(cfg)
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    load(None)
}

/// Applies `BIOSCFG_*` overrides. Blank values are ignored.
pub fn apply_env_overrides(cfg: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("BIOSCFG_FACILITY_CODE") {
        cfg.facility_code = v;
    }
    if let Some(v) = get("BIOSCFG_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = get("BIOSCFG_CONCURRENCY") {
        match v.trim().parse::<usize>() {
            Ok(n) => cfg.concurrency = n,
            Err(_) => tracing::warn!(value = %v, "ignoring invalid BIOSCFG_CONCURRENCY"),
        }
    }
    if let Some(v) = get("BIOSCFG_DRY_RUN") {
        cfg.dry_run = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
    }

    if let InventoryProvider::FleetDb(ref mut fleetdb) = cfg.inventory.provider {
        if let Some(v) = get("BIOSCFG_FLEETDB_ENDPOINT") {
            fleetdb.endpoint = v;
        }
        if let Some(v) = get("BIOSCFG_FLEETDB_TOKEN") {
            fleetdb.token = v;
        }
    }
}
